//! code emission backend
//!
//! The stack builder never writes Terraform itself. It describes each block as a [Construct] and hands it to a
//! [Backend], getting a [Handle] back that can be stored in the registry and projected into references.
mod hcl_backend;
pub use hcl_backend::{EmittedConstruct, HclBackend, RenderError};

use crate::address::Handle;
use crate::value::Value;
use indexmap::IndexMap;

pub trait Backend {
    /// Start a new output section, following blocks land in it
    fn begin_section(&mut self, name: &str);

    /// Declare an input variable
    fn declare_variable(&mut self, name: &str, description: &str) -> Handle;

    /// Emit a block
    fn construct(&mut self, construct: Construct) -> Handle;
}

/// What kind of block a [Construct] becomes
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `resource "<type>" "<id>"`
    Resource(String),
    /// `data "<type>" "<id>"`
    Data(String),
    /// `module "<id>"`
    Module {
        source: String,
        version: Option<String>,
    },
    /// an entry of `locals`
    Local,
    /// `provider "<name>"`
    Provider(String),
    /// `backend "<type>"` inside `terraform`
    StateBackend(String),
}

/// Block to emit
#[derive(Debug, Clone, PartialEq)]
pub struct Construct {
    pub target: Target,
    pub id: String,
    pub fields: IndexMap<String, Value>,
    /// field names rendered as nested blocks instead of attributes, at any depth
    pub block_keys: Vec<String>,
    /// labeled blocks appended after the fields, e.g. `provisioner "local-exec"`
    pub blocks: Vec<NestedBlock>,
}

#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct NestedBlock {
    pub identifier: String,
    pub labels: Vec<String>,
    pub fields: IndexMap<String, Value>,
}

impl Construct {
    fn new(target: Target, id: &str) -> Self {
        Self {
            target,
            id: crate::util::block_id(id),
            fields: IndexMap::new(),
            block_keys: vec![],
            blocks: vec![],
        }
    }

    pub fn resource(resource_type: &str, id: &str) -> Self {
        Self::new(Target::Resource(resource_type.to_string()), id)
    }

    pub fn data(data_type: &str, id: &str) -> Self {
        Self::new(Target::Data(data_type.to_string()), id)
    }

    pub fn module(id: &str, source: &str, version: Option<&str>) -> Self {
        let target = Target::Module {
            source: source.to_string(),
            version: version.map(str::to_string),
        };
        Self::new(target, id)
    }

    pub fn local(name: &str, value: impl Into<Value>) -> Self {
        Self::new(Target::Local, name).field("value", value)
    }

    pub fn provider(name: &str) -> Self {
        Self::new(Target::Provider(name.to_string()), name)
    }

    pub fn state_backend(backend_type: &str) -> Self {
        Self::new(Target::StateBackend(backend_type.to_string()), backend_type)
    }

    /// Use the entries of an object value as fields, other values are ignored
    pub fn fields(mut self, value: Value) -> Self {
        if let Value::Object(object) = value {
            self.fields.extend(object);
        }
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn as_blocks(mut self, keys: &[&str]) -> Self {
        self.block_keys.extend(keys.iter().map(|key| key.to_string()));
        self
    }

    pub fn with_block(mut self, block: NestedBlock) -> Self {
        self.blocks.push(block);
        self
    }
}
