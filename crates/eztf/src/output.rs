//! output writer
//!
//! Layout of a generated repository:
//!
//! ```text
//! <out>/gcp-<domain>-<config name>/
//!   README.md            stacks in the order they have to be applied
//!   script_env           setup values as shell exports
//!   eztf-config.yaml     the input config with `tf_stacks` and `tf_vars` filled in
//!   <sub-stack>/
//!     <section>.tf
//!     terraform.tfvars
//!     <files of yaml, json and anyfile ranges>
//! ```
use crate::config::Document;
use crate::generate::{GeneratedStack, Generation};
use crate::util::clean_res_id;
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_NAME: &str = "ezytf";
const FILENAME_KEY: &str = "eztf_filename";
const CONFIG_FILE: &str = "eztf-config.yaml";

/// Variables exported by `script_env`, in this order
const SETUP_VARIABLES: &[&str] = &[
    "organization_id",
    "setup_project_id",
    "setup_iam_resource",
    "setup_iam_resource_id",
    "setup_service_account_name",
    "setup_service_account",
    "setup_gcs",
    "setup_gcs_location",
    "GOOGLE_IMPERSONATE_SERVICE_ACCOUNT",
    "USER_PROJECT_OVERRIDE",
    "GOOGLE_BILLING_PROJECT",
    "GOOGLE_PROJECT",
    "setup_apis",
    "setup_roles",
];

#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("`variable.domain` is required to name the repository")]
    MissingDomain,
    #[error("Unable to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to serialize {}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Unable to serialize {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unable to render {}", path.display())]
    Hcl {
        path: PathBuf,
        #[source]
        source: hcl::Error,
    },
}

/// Kind of a file producing range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Yaml,
    Json,
    Any,
}

impl FileKind {
    fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "yaml" => Some(FileKind::Yaml),
            "json" => Some(FileKind::Json),
            "anyfile" => Some(FileKind::Any),
            _ => None,
        }
    }
}

/// `gcp-<domain>-<eztf_config_name>`
pub fn repo_name(document: &Document) -> Result<String, OutputError> {
    let domain = document.domain().ok_or(OutputError::MissingDomain)?;
    let config_name = document
        .variable("eztf_config_name")
        .and_then(Value::as_plain_string)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
    Ok(format!("gcp-{}-{config_name}", clean_res_id(&domain)))
}

/// Write a generated repository below `out_dir`, returns the repository folder
pub fn write_repo(generation: &Generation, out_dir: &Path) -> Result<PathBuf, OutputError> {
    let name = repo_name(&generation.document)?;
    let repo = out_dir.join(&name);

    for stack in &generation.stacks {
        write_stack(&repo, stack)?;
    }
    write_files(&repo, &generation.document)?;

    let order: Vec<(&str, &str)> = generation
        .stacks
        .iter()
        .map(|stack| (stack.sub_stack(), stack.name.as_str()))
        .collect();
    write(&repo.join("README.md"), &readme(&name, &order))?;
    write(
        &repo.join("script_env"),
        &script_env(generation.document.variables(), !generation.stacks.is_empty()),
    )?;

    let config_path = repo.join(CONFIG_FILE);
    let config = generation
        .document
        .to_yaml_string()
        .map_err(|source| OutputError::Yaml {
            path: config_path.clone(),
            source,
        })?;
    write(&config_path, &config)?;

    Ok(repo)
}

fn write_stack(repo: &Path, stack: &GeneratedStack) -> Result<(), OutputError> {
    let folder = repo.join(stack.sub_stack());
    for (file_name, content) in &stack.files {
        write(&folder.join(file_name), content)?;
    }

    let tf_vars = stack.stack.tf_vars();
    if !tf_vars.is_empty() {
        let path = folder.join("terraform.tfvars");
        let content = render_tf_vars(tf_vars).map_err(|source| OutputError::Hcl {
            path: path.clone(),
            source,
        })?;
        write(&path, &content)?;
    }
    Ok(())
}

/// `name = value` per variable
pub fn render_tf_vars(tf_vars: &IndexMap<String, Value>) -> Result<String, hcl::Error> {
    let body = tf_vars
        .iter()
        .fold(hcl::Body::builder(), |builder, (name, value)| {
            builder.add_attribute(hcl::Attribute::new(
                hcl::Identifier::sanitized(name),
                value.clone().into_expression(),
            ))
        })
        .build();
    hcl::to_string(&body)
}

/// Files of the `yaml`, `json` and `anyfile` ranges of every sub-stack, Terraform or not
fn write_files(repo: &Path, document: &Document) -> Result<(), OutputError> {
    for sub_stack in document.stacks() {
        for binding in document.bindings(sub_stack) {
            let Some(kind) = FileKind::from_kind(&binding.kind) else {
                continue;
            };
            let folder = repo.join(sub_stack);
            for (index, item) in document.range_items(&binding.range).iter().enumerate() {
                write_file(&folder, &binding.range, index, item, kind)?;
            }
        }
    }
    Ok(())
}

/// Name of a generated file, `eztf_filename` or `<range>-<index>`, yaml and json get their extension
fn file_name(range: &str, index: usize, item: &Value, kind: FileKind) -> String {
    let name = item
        .get_str(FILENAME_KEY)
        .unwrap_or_else(|| format!("{range}-{index}"));
    let extension = match kind {
        FileKind::Yaml => ".yaml",
        FileKind::Json => ".json",
        FileKind::Any => return name,
    };
    if name.ends_with(extension) {
        name
    } else {
        format!("{name}{extension}")
    }
}

fn write_file(
    folder: &Path,
    range: &str,
    index: usize,
    item: &Value,
    kind: FileKind,
) -> Result<(), OutputError> {
    let path = folder.join(file_name(range, index, item, kind));
    let mut content = item.clone();
    content.remove(FILENAME_KEY);

    let rendered = match kind {
        FileKind::Yaml => serde_yaml::to_string(&content).map_err(|source| OutputError::Yaml {
            path: path.clone(),
            source,
        })?,
        FileKind::Json => {
            serde_json::to_string_pretty(&content).map_err(|source| OutputError::Json {
                path: path.clone(),
                source,
            })?
        }
        FileKind::Any => content.get_str("content").unwrap_or_default(),
    };
    write(&path, &rendered)
}

/// Root readme listing the stacks in apply order
pub fn readme(repo: &str, order: &[(&str, &str)]) -> String {
    let mut readme = format!("# {repo}\n\nGenerated Terraform stacks. Apply them in this order:\n\n");
    for (position, (sub_stack, name)) in order.iter().enumerate() {
        readme.push_str(&format!("{}. `{sub_stack}` ({name})\n", position + 1));
    }
    if order.is_empty() {
        readme.push_str("_no terraform stacks_\n");
    }
    readme
}

/// Setup variables as `export name='value'` lines
///
/// The setup service account defaults to `<setup_service_account_name>@<setup_project_id>.iam.gserviceaccount.com`.
/// When there is Terraform code the Google provider environment is derived from the setup values.
pub fn script_env(variables: &IndexMap<String, Value>, has_terraform: bool) -> String {
    let mut env: IndexMap<&str, String> = IndexMap::new();
    for name in SETUP_VARIABLES {
        if let Some(value) = variables.get(*name) {
            env.insert(*name, shell_value(value));
        }
    }

    let project_id = env
        .get("setup_project_id")
        .cloned()
        .unwrap_or_else(|| "$project_id".to_string());
    env.insert("setup_project_id", project_id.clone());

    let has_account = env
        .get("setup_service_account")
        .is_some_and(|account| !account.is_empty());
    if !has_account {
        if let Some(account_name) = env.get("setup_service_account_name").cloned() {
            env.insert(
                "setup_service_account",
                format!("{account_name}@{project_id}.iam.gserviceaccount.com"),
            );
        }
    }

    if has_terraform {
        if let Some(account) = env.get("setup_service_account").cloned() {
            env.insert("GOOGLE_IMPERSONATE_SERVICE_ACCOUNT", account);
        }
        env.insert("USER_PROJECT_OVERRIDE", "true".to_string());
        env.insert("GOOGLE_BILLING_PROJECT", project_id.clone());
        env.insert("GOOGLE_PROJECT", project_id);
    }

    for list in ["setup_apis", "setup_roles"] {
        env.entry(list).or_default();
    }

    SETUP_VARIABLES
        .iter()
        .filter_map(|name| env.get(name).map(|value| format!("export {name}={}\n", shell_quote(value))))
        .collect()
}

/// Lists are space separated
fn shell_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Single quoted unless it is a `$variable`
fn shell_quote(value: &str) -> String {
    if value.starts_with('$') {
        return format!("\"{value}\"");
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn write(path: &Path, content: &str) -> Result<(), OutputError> {
    let io_error = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, content).map_err(io_error)?;
    tracing::info!(path=%path.display(), "written");
    Ok(())
}
