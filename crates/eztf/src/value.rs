//! value representation
//!
//! Configuration ranges are loosely typed: whatever YAML (or JSON) shape the user wrote is kept as is and handed to
//! the resource constructors. Constructors rewrite fields in place, replacing logical names with references to
//! generated blocks, so the model carries two extra variants on top of the YAML data types:
//!
//! - `Ref`: an attribute of an emitted block, e.g. `module.nw_vpc1.network_self_link`
//! - `Template`: a string interpolation of literals and refs, e.g. `"projects/${module.prj_a.project_number}"`
//!
//! Object keys are strings and order-preserving, YAML tags are dropped.
use crate::address::Address;
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Deserialize, Deserializer, Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Ref(Address),
    Template(Vec<Fragment>),
}

/// Piece of a [Value::Template]
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Literal(String),
    Ref(Address),
}

impl Value {
    /// Empty object
    pub fn object() -> Self {
        Value::Object(IndexMap::new())
    }

    /// Concatenate values into a single string value
    ///
    /// Stays a plain [Value::String] as long as no part is a reference.
    pub fn template<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        fn push_literal(fragments: &mut Vec<Fragment>, literal: String) {
            if literal.is_empty() {
                return;
            }
            if let Some(Fragment::Literal(last)) = fragments.last_mut() {
                last.push_str(&literal);
            } else {
                fragments.push(Fragment::Literal(literal));
            }
        }

        let mut fragments: Vec<Fragment> = vec![];
        for part in parts {
            match part.into() {
                Value::Ref(address) => fragments.push(Fragment::Ref(address)),
                Value::Template(inner) => {
                    for fragment in inner {
                        match fragment {
                            Fragment::Literal(literal) => push_literal(&mut fragments, literal),
                            reference => fragments.push(reference),
                        }
                    }
                }
                Value::Null => {}
                other => push_literal(&mut fragments, other.to_string()),
            }
        }

        if fragments.iter().all(|f| matches!(f, Fragment::Literal(_))) {
            let literal = fragments
                .into_iter()
                .map(|f| match f {
                    Fragment::Literal(literal) => literal,
                    Fragment::Ref(_) => unreachable!(),
                })
                .collect::<String>();
            return Value::String(literal);
        }

        Value::Template(fragments)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(object) => object.get(key),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Value::Object(object) => object.get_mut(key),
            _ => None,
        }
    }

    /// String content of a scalar field, numbers are rendered
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_plain_string)
    }

    /// Insert into an object, returns the previous value
    ///
    /// Non-object values are left untouched.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        match self {
            Value::Object(object) => object.insert(key.into(), value.into()),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match self {
            Value::Object(object) => object.shift_remove(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Scalars as string: strings, numbers and booleans
    pub fn as_plain_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Items of an array field, empty when missing or not an array
    pub fn items(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Plain strings of an array field, non-scalar entries are skipped
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.items(key)
            .iter()
            .filter_map(Value::as_plain_string)
            .collect()
    }

    /// Whether a config value counts as "set"
    ///
    /// Null, `false`, zero, empty strings and empty collections are not.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Decimal(d) => *d != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Ref(_) | Value::Template(_) => true,
        }
    }

    /// Field that is present and truthy
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Ref(_) | Value::Template(_))
    }

    /// Convert into an HCL expression for emission
    pub fn into_expression(self) -> hcl::Expression {
        use hcl::Expression;

        match self {
            Value::Null => Expression::Null,
            Value::Boolean(b) => Expression::Bool(b),
            Value::Integer(i) => Expression::Number(hcl::Number::from(i)),
            Value::Decimal(d) => hcl::Number::from_f64(d)
                .map(Expression::Number)
                .unwrap_or(Expression::Null),
            Value::String(s) => Expression::String(s),
            Value::Array(array) => {
                Expression::Array(array.into_iter().map(Value::into_expression).collect())
            }
            Value::Object(object) => {
                let mut hcl_object = hcl::Object::<hcl::ObjectKey, Expression>::new();
                for (key, value) in object {
                    hcl_object.insert(object_key(key), value.into_expression());
                }
                Expression::Object(hcl_object)
            }
            Value::Ref(address) => address.to_expression(),
            Value::Template(fragments) => {
                let mut template = String::new();
                for fragment in fragments {
                    match fragment {
                        Fragment::Literal(literal) => template.push_str(&escape_template(&literal)),
                        Fragment::Ref(address) => {
                            template.push_str("${");
                            template.push_str(&address.to_string());
                            template.push('}');
                        }
                    }
                }
                Expression::TemplateExpr(Box::new(hcl::TemplateExpr::QuotedString(template)))
            }
        }
    }
}

/// Keys holding a rendered reference, like `"serviceAccount:${module.sa.email}"`, stay templates
fn object_key(key: String) -> hcl::ObjectKey {
    if crate::util::is_identifier(&key) {
        hcl::ObjectKey::Identifier(hcl::Identifier::unchecked(key.as_str()))
    } else if key.contains("${") {
        let template = hcl::TemplateExpr::QuotedString(key);
        hcl::ObjectKey::Expression(hcl::Expression::TemplateExpr(Box::new(template)))
    } else {
        hcl::ObjectKey::Expression(hcl::Expression::String(key))
    }
}

/// Escape a literal for use inside a quoted template
fn escape_template(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    let mut chars = literal.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                escaped.push(c);
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Ref(address) => write!(f, "${{{address}}}"),
            Value::Template(fragments) => {
                for fragment in fragments {
                    match fragment {
                        Fragment::Literal(literal) => f.write_str(literal)?,
                        Fragment::Ref(address) => write!(f, "${{{address}}}")?,
                    }
                }
                Ok(())
            }
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Value::Ref(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<IndexMap<K, V>> for Value {
    fn from(value: IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => b.into(),
            Yaml::Number(num) => {
                if let Some(int) = num.as_i64() {
                    return Value::Integer(int);
                }
                Value::Decimal(num.as_f64().unwrap_or(f64::NAN))
            }
            Yaml::String(s) => s.into(),
            Yaml::Sequence(seq) => seq.into(),
            Yaml::Mapping(mapping) => Value::Object(
                mapping
                    .into_iter()
                    .map(|(k, v)| (mapping_key(k), v.into()))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => tagged.value.into(),
        }
    }
}

fn mapping_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => Value::from(other).to_string(),
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_yaml::Value::deserialize(deserializer).map(Value::from)
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Ref(_) | Value::Template(_) => serializer.serialize_str(&self.to_string()),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}
