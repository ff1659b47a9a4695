//! variable materializer
//!
//! Terraform variables are declared lazily, the first time anything needs them. Each declaration records the value
//! the variable is bound to in the stack's `terraform.tfvars`.
use crate::address::Handle;
use crate::backend::Backend;
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct Variables {
    provided: IndexMap<String, Value>,
    declared: IndexMap<String, Handle>,
    bound: IndexMap<String, Value>,
}

impl Variables {
    pub fn new(provided: IndexMap<String, Value>) -> Self {
        Self {
            provided,
            ..Default::default()
        }
    }

    /// Merge values into the provided set, later values win
    pub fn provide(&mut self, values: &IndexMap<String, Value>) {
        for (name, value) in values {
            self.provided.insert(name.clone(), value.clone());
        }
    }

    pub fn provided(&self, name: &str) -> Option<&Value> {
        self.provided.get(name)
    }

    /// Declare each variable unless declared already, bound to its provided value or `""`
    pub fn ensure(&mut self, backend: &mut dyn Backend, names: &[&str]) {
        for name in names {
            let value = self
                .provided
                .get(*name)
                .cloned()
                .unwrap_or_else(|| Value::from(""));
            self.declare_one(backend, name, value);
        }
    }

    /// Declare each variable unless declared already, bound to the given value
    pub fn declare(&mut self, backend: &mut dyn Backend, values: IndexMap<String, Value>) {
        for (name, value) in values {
            self.declare_one(backend, &name, value);
        }
    }

    fn declare_one(&mut self, backend: &mut dyn Backend, name: &str, value: Value) {
        if self.declared.contains_key(name) {
            return;
        }

        tracing::trace!(name, "declaring variable");
        let handle = backend.declare_variable(name, &crate::util::description(name));
        self.declared.insert(name.to_string(), handle);
        self.bound.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Handle> {
        self.declared.get(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    pub fn declared(&self) -> impl Iterator<Item = &String> {
        self.declared.keys()
    }

    /// Bound value of every declared variable
    pub fn tf_vars(&self) -> &IndexMap<String, Value> {
        &self.bound
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::HclBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn ensure_is_idempotent() {
        let mut backend = HclBackend::default();
        let mut provided = IndexMap::new();
        provided.insert("organization_id".to_string(), Value::from("123"));
        let mut variables = Variables::new(provided);

        variables.ensure(&mut backend, &["organization_id", "billing_id"]);
        variables.ensure(&mut backend, &["billing_id", "organization_id"]);

        let declared: Vec<_> = backend.declared_variables().keys().cloned().collect();
        assert_eq!(declared, vec!["organization_id", "billing_id"]);
        assert_eq!(
            backend.declared_variables()["billing_id"],
            "billing id".to_string()
        );
        assert_eq!(variables.tf_vars()["organization_id"], Value::from("123"));
        assert_eq!(variables.tf_vars()["billing_id"], Value::from(""));
        assert_eq!(
            variables.get("billing_id").unwrap().value().to_string(),
            "${var.billing_id}"
        );
    }

    #[test]
    fn first_declaration_wins() {
        let mut backend = HclBackend::default();
        let mut variables = Variables::default();

        let mut first = IndexMap::new();
        first.insert("region".to_string(), Value::from("us-central1"));
        variables.declare(&mut backend, first);
        let mut second = IndexMap::new();
        second.insert("region".to_string(), Value::from("europe-west1"));
        variables.declare(&mut backend, second);

        assert_eq!(variables.tf_vars()["region"], Value::from("us-central1"));
        assert_eq!(backend.declared_variables().len(), 1);
    }
}
