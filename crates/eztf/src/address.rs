//! Terraform addresses and handles
//!
//! An [Address] is a traversal rooted at a variable, like `module.nw_vpc1.network_self_link` or
//! `module.nw_vpc1.subnets["us-central1/sub1"].self_link`. A [Handle] is what the backend returns for an emitted
//! block: the address of the block itself, from which output attributes are projected.
use crate::value::Value;
use hcl::{Expression, Traversal, TraversalOperator};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    root: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Attr(String),
    Key(String),
}

impl Address {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            steps: vec![],
        }
    }

    /// `var.<name>`
    pub fn variable(name: &str) -> Self {
        Self::new("var").attr(name)
    }

    /// `module.<id>`
    pub fn module(id: &str) -> Self {
        Self::new("module").attr(id)
    }

    /// `<type>.<id>`
    pub fn resource(resource_type: &str, id: &str) -> Self {
        Self::new(resource_type).attr(id)
    }

    /// `data.<type>.<id>`
    pub fn data(data_type: &str, id: &str) -> Self {
        Self::new("data").attr(data_type).attr(id)
    }

    /// `local.<name>`
    pub fn local(name: &str) -> Self {
        Self::new("local").attr(name)
    }

    /// `each.value`
    pub fn each_value() -> Self {
        Self::new("each").attr("value")
    }

    pub fn attr(mut self, name: &str) -> Self {
        self.steps.push(Step::Attr(name.to_string()));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps.push(Step::Key(key.to_string()));
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn to_expression(&self) -> Expression {
        let root = Expression::Variable(hcl::Variable::unchecked(self.root.as_str()));
        if self.steps.is_empty() {
            return root;
        }

        let operators: Vec<TraversalOperator> = self
            .steps
            .iter()
            .map(|step| match step {
                Step::Attr(name) => {
                    TraversalOperator::GetAttr(hcl::Identifier::unchecked(name.as_str()))
                }
                Step::Key(key) => TraversalOperator::Index(Expression::String(key.clone())),
            })
            .collect();

        Expression::Traversal(Box::new(Traversal::new(root, operators)))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.root)?;
        for step in &self.steps {
            match step {
                Step::Attr(name) => write!(f, ".{name}")?,
                Step::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

/// Opaque reference to an emitted block
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct Handle {
    address: Address,
}

impl Handle {
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The block itself, e.g. `var.organization_id`
    pub fn value(&self) -> Value {
        Value::Ref(self.address.clone())
    }

    /// A named output attribute of the block
    pub fn output(&self, name: &str) -> Value {
        Value::Ref(self.address.clone().attr(name))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display() {
        let address = Address::module("nw_vpc1")
            .attr("subnets")
            .key("us-central1/sub1")
            .attr("self_link");
        assert_eq!(
            address.to_string(),
            r#"module.nw_vpc1.subnets["us-central1/sub1"].self_link"#
        );
        assert_eq!(
            Address::data("google_organization", "org").to_string(),
            "data.google_organization.org"
        );
    }

    #[test]
    fn handle_outputs() {
        let handle = Handle::new(Address::resource("google_folder", "fldr_a"));
        assert_eq!(
            handle.output("name"),
            Value::Ref(Address::resource("google_folder", "fldr_a").attr("name"))
        );
    }

    #[test]
    fn expression() {
        let expected = Traversal::new(
            Expression::Variable(hcl::Variable::unchecked("var")),
            vec![TraversalOperator::GetAttr(hcl::Identifier::unchecked(
                "billing_id",
            ))],
        );
        assert_eq!(
            Address::variable("billing_id").to_expression(),
            Expression::Traversal(Box::new(expected))
        );
    }
}
