use super::{Backend, Construct, NestedBlock, Target};
use crate::address::{Address, Handle};
use crate::value::Value;
use hcl::{Attribute, Block, Body, Identifier, Structure};
use indexmap::IndexMap;

const FIRST_SECTION: &str = "backend";
const VARIABLES_SECTION: &str = "variables";

/// Backend collecting hcl structures per section
///
/// Variables always go to the `variables` section, no matter which section is open.
#[derive(Debug)]
pub struct HclBackend {
    sections: IndexMap<String, Vec<Structure>>,
    current: String,
    emitted: Vec<EmittedConstruct>,
    variables: IndexMap<String, String>,
}

/// A construct and the section it was emitted to
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedConstruct {
    pub section: String,
    pub construct: Construct,
    pub handle: Handle,
}

impl Default for HclBackend {
    fn default() -> Self {
        let mut sections = IndexMap::new();
        sections.insert(FIRST_SECTION.to_string(), vec![]);
        Self {
            sections,
            current: FIRST_SECTION.to_string(),
            emitted: vec![],
            variables: IndexMap::new(),
        }
    }
}

impl HclBackend {
    pub fn constructs(&self) -> &[EmittedConstruct] {
        &self.emitted
    }

    pub fn find(&self, id: &str) -> Option<&EmittedConstruct> {
        self.emitted.iter().find(|e| e.construct.id == id)
    }

    /// Emission order of a construct
    pub fn position(&self, id: &str) -> Option<usize> {
        self.emitted.iter().position(|e| e.construct.id == id)
    }

    /// Declared variables and their descriptions
    pub fn declared_variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    pub fn section_names(&self) -> impl Iterator<Item = &String> {
        self.sections.keys()
    }

    /// Body of every non-empty section
    pub fn bodies(&self) -> IndexMap<String, Body> {
        self.sections
            .iter()
            .filter(|(_, structures)| !structures.is_empty())
            .map(|(name, structures)| (name.clone(), to_body(structures)))
            .collect()
    }

    /// Render every non-empty section as `<section>.tf`
    pub fn render(&self) -> Result<IndexMap<String, String>, RenderError> {
        let mut files = IndexMap::new();
        for (section, body) in self.bodies() {
            let rendered = hcl::to_string(&body).map_err(|source| RenderError {
                section: section.clone(),
                source,
            })?;
            files.insert(format!("{section}.tf"), rendered);
        }
        Ok(files)
    }

    fn push(&mut self, section: &str, structure: Structure) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .push(structure);
    }
}

impl Backend for HclBackend {
    fn begin_section(&mut self, name: &str) {
        tracing::trace!(section = name, "begin section");
        self.sections.entry(name.to_string()).or_default();
        self.current = name.to_string();
    }

    fn declare_variable(&mut self, name: &str, description: &str) -> Handle {
        let block = Block::builder(ident("variable"))
            .add_label(name)
            .add_attribute(Attribute::new(ident("description"), description))
            .build();
        self.push(VARIABLES_SECTION, block.into());
        self.variables
            .insert(name.to_string(), description.to_string());

        Handle::new(Address::variable(name))
    }

    fn construct(&mut self, construct: Construct) -> Handle {
        let handle = Handle::new(address_of(&construct));
        tracing::debug!(address=%handle.address(), section=%self.current, "construct");

        let section = self.current.clone();
        self.push(&section, structure_of(&construct));
        self.emitted.push(EmittedConstruct {
            section,
            construct,
            handle: handle.clone(),
        });
        handle
    }
}

fn address_of(construct: &Construct) -> Address {
    match &construct.target {
        Target::Resource(resource_type) => Address::resource(resource_type, &construct.id),
        Target::Data(data_type) => Address::data(data_type, &construct.id),
        Target::Module { .. } => Address::module(&construct.id),
        Target::Local => Address::local(&construct.id),
        Target::Provider(name) => Address::new(name.as_str()),
        Target::StateBackend(_) => Address::new("terraform"),
    }
}

fn structure_of(construct: &Construct) -> Structure {
    let keys = &construct.block_keys;
    match &construct.target {
        Target::Local => {
            let value = construct.fields.get("value").cloned().unwrap_or_default();
            Block::builder(ident("locals"))
                .add_attribute(Attribute::new(
                    ident(&construct.id),
                    value.into_expression(),
                ))
                .build()
                .into()
        }
        Target::StateBackend(backend_type) => {
            let backend = Block::builder(ident("backend")).add_label(backend_type.as_str());
            let backend = add_fields(backend, &construct.fields, keys).build();
            Block::builder(ident("terraform")).add_block(backend).build().into()
        }
        Target::Resource(resource_type) | Target::Data(resource_type) => {
            let identifier = match construct.target {
                Target::Data(_) => "data",
                _ => "resource",
            };
            let block = Block::builder(ident(identifier))
                .add_label(resource_type.as_str())
                .add_label(construct.id.as_str());
            finish(block, construct)
        }
        Target::Module { source, version } => {
            let mut block = Block::builder(ident("module"))
                .add_label(construct.id.as_str())
                .add_attribute(Attribute::new(ident("source"), source.as_str()));
            if let Some(version) = version {
                block = block.add_attribute(Attribute::new(ident("version"), version.as_str()));
            }
            finish(block, construct)
        }
        Target::Provider(name) => {
            let block = Block::builder(ident("provider")).add_label(name.as_str());
            finish(block, construct)
        }
    }
}

fn finish(block: hcl::structure::BlockBuilder, construct: &Construct) -> Structure {
    let mut block = add_fields(block, &construct.fields, &construct.block_keys);
    for nested in &construct.blocks {
        block = block.add_block(nested_block(nested, &construct.block_keys));
    }
    block.build().into()
}

fn nested_block(nested: &NestedBlock, keys: &[String]) -> Block {
    let mut block = Block::builder(ident(&nested.identifier));
    for label in &nested.labels {
        block = block.add_label(label.as_str());
    }
    add_fields(block, &nested.fields, keys).build()
}

/// Fields as attributes, keys listed in `keys` as (repeated) blocks
///
/// Null fields are skipped.
fn add_fields(
    mut block: hcl::structure::BlockBuilder,
    fields: &IndexMap<String, Value>,
    keys: &[String],
) -> hcl::structure::BlockBuilder {
    for (key, value) in fields {
        if value == &Value::Null {
            continue;
        }

        if keys.contains(key) {
            match value {
                Value::Object(object) => {
                    let nested = NestedBlock::new(key.clone(), vec![], object.clone());
                    block = block.add_block(nested_block(&nested, keys));
                    continue;
                }
                Value::Array(items) if items.iter().all(|item| item.as_object().is_some()) => {
                    for object in items.iter().filter_map(Value::as_object) {
                        let nested = NestedBlock::new(key.clone(), vec![], object.clone());
                        block = block.add_block(nested_block(&nested, keys));
                    }
                    continue;
                }
                _ => {}
            }
        }

        block = block.add_attribute(Attribute::new(
            ident(key),
            value.clone().into_expression(),
        ));
    }
    block
}

fn ident(name: &str) -> Identifier {
    Identifier::sanitized(name)
}

fn to_body(structures: &[Structure]) -> Body {
    structures
        .iter()
        .cloned()
        .fold(Body::builder(), |builder, structure| match structure {
            Structure::Attribute(attribute) => builder.add_attribute(attribute),
            Structure::Block(block) => builder.add_block(block),
        })
        .build()
}

#[derive(thiserror::Error, Debug)]
#[error("Unable to render section `{section}`")]
pub struct RenderError {
    pub section: String,
    #[source]
    pub source: hcl::Error,
}
