//! stack orchestrator
//!
//! A sub-stack is built in a fixed sequence of phases:
//!
//! 1. `Init`: provider and state backend, the `variables` section is opened
//! 2. `VarsDeclared`: ranges bound as `variable`/`tf_vars` are declared
//! 3. `PrepassDone`: buckets exist, accumulators are filled and required variables are declared for every bound kind
//! 4. `ResourcesBuilt`: every bound range is built in config order
//!
//! A binding sees the registrations of every binding before it and none of the ones after it. Anything that must be
//! known earlier has to come from an accumulator.
use crate::accumulate::Accumulators;
use crate::address::Handle;
use crate::backend::{Backend, Construct};
use crate::catalog::ResourceKind;
use crate::config::{Binding, Document};
use crate::registry::{Bucket, NameRegistry, RegistryError};
use crate::resolve::Resolver;
use crate::value::Value;
use crate::variables::Variables;
use indexmap::IndexMap;

const VARIABLES_SECTION: &str = "variables";
const ORGANIZATION_DATA: &str = "google_organization";

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("range `{range}`: required key `{key}` is missing")]
    MissingField { range: String, key: String },
    #[error("range `{range}`: key `{key}` {problem}")]
    InvalidField {
        range: String,
        key: String,
        problem: String,
    },
    #[error("Registration failed")]
    Registry(#[from] RegistryError),
}

/// Scalar value of a key that identifies an item
pub(crate) fn required(item: &Value, range: &str, key: &str) -> Result<String, BuildError> {
    item.get_str(key).ok_or_else(|| BuildError::MissingField {
        range: range.to_string(),
        key: key.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    VarsDeclared,
    PrepassDone,
    ResourcesBuilt,
    Done,
}

/// Everything a resource constructor works with while a sub-stack is built
pub struct StackContext<'a> {
    name: &'a str,
    document: &'a Document,
    phase: Phase,
    pub registry: NameRegistry,
    pub accumulators: Accumulators,
    pub variables: Variables,
    backend: &'a mut dyn Backend,
}

impl<'a> StackContext<'a> {
    pub fn new(name: &'a str, document: &'a Document, backend: &'a mut dyn Backend) -> Self {
        Self {
            name,
            document,
            phase: Phase::Init,
            registry: NameRegistry::default(),
            accumulators: Accumulators::default(),
            variables: Variables::new(document.variables().clone()),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, phase: Phase) {
        tracing::debug!(stack = self.name, from=?self.phase, to=?phase, "phase");
        self.phase = phase;
    }

    pub fn resolver(&mut self) -> Resolver<'_> {
        Resolver::new(
            &self.registry,
            &self.accumulators,
            &mut self.variables,
            &mut *self.backend,
        )
    }

    pub fn reference(&mut self, kind: &str, name: &str) -> Value {
        self.resolver().reference(kind, name)
    }

    pub fn reference_or(&mut self, kind: &str, name: &str, default: impl Into<Value>) -> Value {
        self.resolver().reference_or(kind, name, default.into())
    }

    pub fn references(&mut self, kind: &str, names: &[Value]) -> Value {
        self.resolver().references(kind, names)
    }

    pub fn principal(&mut self, principal: &str) -> Value {
        self.resolver().principal(principal)
    }

    pub fn fabric_iam(&mut self, value: &mut Value) {
        self.resolver().fabric_iam(value)
    }

    /// Resolve a scalar field in place, absent fields are left alone
    pub fn resolve_field(&mut self, item: &mut Value, key: &str, kind: &str) {
        if let Some(name) = item.get_str(key) {
            let resolved = self.reference(kind, &name);
            item.insert(key, resolved);
        }
    }

    /// Resolve every element of a list field in place
    pub fn resolve_list(&mut self, item: &mut Value, key: &str, kind: &str) {
        let resolved = match item.get(key).and_then(Value::as_array) {
            Some(names) => self.references(kind, names),
            None => return,
        };
        item.insert(key, resolved);
    }

    /// Resolve the `network`, `subnetwork` and `subnetwork_project` keys of each network interface
    pub fn resolve_interfaces(&mut self, item: &mut Value, key: &str) {
        let Some(interfaces) = item.get_mut(key).and_then(Value::as_array_mut) else {
            return;
        };
        for interface in interfaces {
            self.resolve_field(interface, "network", "network");
            self.resolve_field(interface, "subnetwork", "subnet");
            self.resolve_field(interface, "subnetwork_project", "project");
        }
    }

    pub fn construct(&mut self, construct: Construct) -> Handle {
        self.backend.construct(construct)
    }

    pub fn register(
        &mut self,
        bucket: Bucket,
        name: impl Into<String>,
        handle: Handle,
    ) -> Result<(), BuildError> {
        Ok(self.registry.register(bucket, name, handle)?)
    }

    /// Open a section named after a range, unless the range does not exist
    pub fn section(&mut self, name: &str, force: bool) {
        if force || self.document.range(name).is_some() {
            self.backend.begin_section(name);
        }
    }

    pub fn ensure_variables(&mut self, names: &[&str]) {
        self.variables.ensure(&mut *self.backend, names);
    }

    /// `var.<name>`, declared on first use
    pub fn variable(&mut self, name: &str) -> Value {
        self.ensure_variables(&[name]);
        match self.variables.get(name) {
            Some(handle) => handle.value(),
            None => crate::address::Address::variable(name).into(),
        }
    }

    /// The `google_organization` data source, emitted once per stack
    pub fn ensure_org_data(&mut self) -> Result<Handle, BuildError> {
        let bucket = Bucket::Data(ORGANIZATION_DATA.to_string());
        if let Some(handle) = self.registry.lookup(&bucket, "org") {
            return Ok(handle.clone());
        }

        let organization = self.reference("organization", "/");
        let handle = self.construct(
            Construct::data(ORGANIZATION_DATA, "org").field("organization", organization),
        );
        self.registry.ensure_bucket(&bucket);
        self.register(bucket, "org", handle.clone())?;
        Ok(handle)
    }

    /// Items of a range, cloned so they can be rewritten
    pub fn items(&self, range: &str) -> Vec<Value> {
        self.document.range_items(range).to_vec()
    }

    pub fn range_value(&self, range: &str) -> Option<Value> {
        self.document.range(range).cloned()
    }

    fn init(&mut self) {
        let project = self
            .document
            .variable("setup_project_id")
            .cloned()
            .unwrap_or_default();
        self.construct(Construct::provider("google").field("project", project));

        let bucket = self
            .document
            .variable("setup_gcs")
            .filter(|bucket| bucket.is_truthy())
            .cloned();
        if let Some(bucket) = bucket {
            self.construct(
                Construct::state_backend("gcs")
                    .field("bucket", bucket)
                    .field("prefix", format!("terraform-{}-state", self.name)),
            );
        }

        self.section(VARIABLES_SECTION, true);
    }

    fn declare_variable_ranges(&mut self, bindings: &[Binding]) {
        let document = self.document;
        for binding in bindings {
            if !matches!(binding.kind.as_str(), "variable" | "tf_vars") {
                continue;
            }
            let Some(Value::Object(values)) = document.range(&binding.range) else {
                continue;
            };

            self.variables.provide(values);
            let declared = values
                .iter()
                .filter(|(name, _)| !crate::util::is_internal_variable(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            self.variables.declare(&mut *self.backend, declared);
        }
    }

    fn finish(self) -> Stack {
        Stack {
            name: self.name.to_string(),
            registry: self.registry,
            accumulators: self.accumulators,
            variables: self.variables,
        }
    }
}

/// Result of building a sub-stack
#[derive(Debug)]
pub struct Stack {
    pub name: String,
    pub registry: NameRegistry,
    pub accumulators: Accumulators,
    pub variables: Variables,
}

impl Stack {
    /// Bound value of every declared variable, the content of `terraform.tfvars`
    pub fn tf_vars(&self) -> &IndexMap<String, Value> {
        self.variables.tf_vars()
    }
}

/// Bindings of a sub-stack that have a constructor, unknown kinds are skipped
pub fn constructor_bindings(document: &Document, sub_stack: &str) -> Vec<(Binding, ResourceKind)> {
    document
        .bindings(sub_stack)
        .into_iter()
        .filter_map(|binding| match binding.kind.parse::<ResourceKind>() {
            Ok(kind) => Some((binding, kind)),
            Err(_) => {
                tracing::trace!(range=%binding.range, kind=%binding.kind, "no constructor");
                None
            }
        })
        .collect()
}

/// Build one sub-stack into `backend`
pub fn build_stack(
    document: &Document,
    sub_stack: &str,
    backend: &mut dyn Backend,
) -> Result<Stack, BuildError> {
    tracing::info!(stack = sub_stack, "building stack");
    let bindings = document.bindings(sub_stack);
    let kinds = constructor_bindings(document, sub_stack);

    let mut ctx = StackContext::new(sub_stack, document, backend);
    ctx.init();

    ctx.declare_variable_ranges(&bindings);
    ctx.advance(Phase::VarsDeclared);

    for (binding, kind) in &kinds {
        if let Some(bucket) = kind.bucket() {
            ctx.registry.ensure_bucket(&bucket);
        }
        for accumulator in kind.accumulators() {
            accumulator.scan(
                &mut ctx.accumulators,
                &binding.range,
                document.range_items(&binding.range),
            )?;
        }
        ctx.ensure_variables(kind.required_variables());
    }
    ctx.advance(Phase::PrepassDone);

    for (binding, kind) in &kinds {
        tracing::debug!(range=%binding.range, ?kind, "building range");
        ctx.section(&binding.range, false);
        kind.build(&mut ctx, &binding.range)?;
    }
    ctx.advance(Phase::ResourcesBuilt);

    ctx.advance(Phase::Done);
    Ok(ctx.finish())
}
