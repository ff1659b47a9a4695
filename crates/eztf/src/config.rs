//! configuration document
//!
//! A [Document] is one YAML (or JSON) file with
//! - the global `variable` section
//! - the `eztf` orchestration section ([Orchestration])
//! - any number of named ranges, each a list of items
//!
//! Ranges are kept as loosely typed [Value]s, the resource constructors decide what they need from them.
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Document {
    variable: IndexMap<String, Value>,
    eztf: Orchestration,
    ranges: IndexMap<String, Value>,
    source: Option<PathBuf>,
}

/// The `eztf` section
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Orchestration {
    /// sub-stack name to ordered `{range: kind}` maps
    pub stacks: IndexMap<String, Vec<IndexMap<String, String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tf_stacks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub tf_vars: IndexMap<String, IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub tf_any_module: IndexMap<String, AnyModule>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub tf_any_resource: IndexMap<String, AnyType>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub tf_any_data: IndexMap<String, AnyType>,
}

/// Module details for a range of kind `any_module`
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AnyModule {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Resource or data source type for a range of kind `any_resource`/`any_data`
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AnyType {
    pub name: String,
}

/// A range bound to a resource kind inside a sub-stack
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Binding {
    pub range: String,
    pub kind: String,
}

impl Document {
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, LoadError> {
        let serde_yaml::Value::Mapping(mapping) = value else {
            return Err(LoadError::NotAMapping);
        };

        let mut document = Document::default();
        for (key, value) in mapping {
            let serde_yaml::Value::String(key) = key else {
                return Err(LoadError::InvalidKey(format!("{key:?}")));
            };

            match key.as_str() {
                "variable" | "eztf" if value.is_null() => {}
                "variable" => {
                    let Value::Object(variable) = Value::from(value) else {
                        return Err(LoadError::InvalidSection("variable"));
                    };
                    document.variable = variable;
                }
                "eztf" => {
                    document.eztf =
                        serde_yaml::from_value(value).map_err(LoadError::Orchestration)?;
                }
                _ => {
                    document.ranges.insert(key, Value::from(value));
                }
            }
        }

        Ok(document)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, LoadError> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let value: serde_yaml::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Load a config file, `.json` files are read as JSON, anything else as YAML
    pub fn load_file(file_path: &Path) -> Result<Self, LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading config");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let is_json = file_path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let mut document = if is_json {
            Self::from_json_str(&file_contents)?
        } else {
            Self::from_yaml_str(&file_contents)?
        };

        document.source = Some(file_path);
        Ok(document)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.variable
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variable.get(name)
    }

    pub fn domain(&self) -> Option<String> {
        self.variable
            .get("domain")
            .and_then(Value::as_plain_string)
            .filter(|domain| !domain.is_empty())
    }

    pub fn orchestration(&self) -> &Orchestration {
        &self.eztf
    }

    pub fn range(&self, name: &str) -> Option<&Value> {
        self.ranges.get(name)
    }

    /// Items of a range, empty if it does not exist or is not a list
    pub fn range_items(&self, name: &str) -> &[Value] {
        self.ranges
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn ranges(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.ranges.iter()
    }

    pub fn stacks(&self) -> impl Iterator<Item = &String> {
        self.eztf.stacks.keys()
    }

    /// Bindings of a sub-stack in config order
    ///
    /// An entry with several keys yields one binding per key.
    pub fn bindings(&self, stack: &str) -> Vec<Binding> {
        self.eztf
            .stacks
            .get(stack)
            .into_iter()
            .flatten()
            .flat_map(|entry| {
                entry
                    .iter()
                    .map(|(range, kind)| Binding::new(range.clone(), kind.clone()))
            })
            .collect()
    }

    /// Record the variable values of a generated sub-stack
    pub fn set_tf_vars(&mut self, stack: &str, tf_vars: IndexMap<String, Value>) {
        self.eztf.tf_vars.insert(stack.to_string(), tf_vars);
    }

    pub fn set_tf_stacks(&mut self, tf_stacks: Vec<String>) {
        self.eztf.tf_stacks = Some(tf_stacks);
    }

    /// Serialize back to YAML, keys in their original order
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        let mut mapping = serde_yaml::Mapping::new();
        mapping.insert("variable".into(), serde_yaml::to_value(&self.variable)?);
        mapping.insert("eztf".into(), serde_yaml::to_value(&self.eztf)?);
        for (name, range) in &self.ranges {
            mapping.insert(name.as_str().into(), serde_yaml::to_value(range)?);
        }
        serde_yaml::to_string(&mapping)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse yaml file")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Unable to parse json file")]
    JsonParseFailed(#[from] serde_json::Error),
    #[error("Config must be a mapping at the top level")]
    NotAMapping,
    #[error("Top level keys must be strings, found {0}")]
    InvalidKey(String),
    #[error("Section `{0}` must be a mapping")]
    InvalidSection(&'static str),
    #[error("Invalid `eztf` section")]
    Orchestration(#[source] serde_yaml::Error),
}

/// Utility macro to create a [Document] from inline YAML
///
/// ```
/// # use eztf::config_document;
/// let document = config_document!(r#"
/// variable:
///   domain: acme.com
/// eztf:
///   stacks:
///     network:
///       - nets: network
/// nets:
///   - network_name: vpc1
///     project_id: proj-a
/// "#);
/// assert_eq!(document.domain().as_deref(), Some("acme.com"));
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use eztf::config_document;
/// config_document!("- not a mapping");
/// ```
#[macro_export]
macro_rules! config_document {
    { $expr:expr } => {
        $crate::config::Document::from_yaml_str($expr).expect("document must parse")
    };
}
