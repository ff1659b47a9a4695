//! reference resolver
//!
//! Turns `(kind, logical name)` into the value to embed in a generated block. Depending on what is known about the
//! name in the current sub-stack that is
//! - an output attribute of a registered block, e.g. `module.nw_vpc1.network_self_link`
//! - a variable, which is declared on first use, e.g. `var.organization_id`
//! - the name itself (or a supplied default) when nothing is known about it
//!
//! Resolution never fails. A name that is not registered is assumed to be something that exists outside of the
//! generated code and is passed through verbatim.
use crate::accumulate::Accumulators;
use crate::address::Address;
use crate::backend::Backend;
use crate::registry::{Bucket, NameRegistry};
use crate::value::Value;
use crate::variables::Variables;

/// Type of resource hierarchy node a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Organization,
    Folder,
    Project,
}

impl NodeKind {
    /// Reference kind used to resolve a node of this type
    pub fn as_kind(self) -> &'static str {
        match self {
            NodeKind::Organization => "organization",
            NodeKind::Folder => "folder",
            NodeKind::Project => "project",
        }
    }
}

/// `""`, `/` and `organizations/..` are the organization, other paths starting with `/` and `folders/..` are folders,
/// anything else is a project.
pub fn which_node(node: &str) -> NodeKind {
    if node.is_empty() || node == "/" || node.starts_with("organizations/") {
        return NodeKind::Organization;
    }
    if node.starts_with('/') || node.starts_with("folders/") {
        return NodeKind::Folder;
    }
    NodeKind::Project
}

/// Subnet path split into project, region and name
///
/// Accepts `projects/P/regions/R/subnetworks/S` anywhere in the path (so full self links too), `P/R/S` and `R/S`.
fn parse_subnet(path: &str) -> (Option<&str>, Option<&str>, Option<&str>) {
    if let Some(start) = path.find("projects/") {
        let rest = &path[start + "projects/".len()..];
        if let Some((project, rest)) = rest.split_once("/regions/") {
            if let Some((region, subnet)) = rest.split_once("/subnetworks/") {
                return (Some(project), Some(region), Some(subnet));
            }
        }
    }

    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        [project, region, subnet] => (Some(*project), Some(*region), Some(*subnet)),
        [region, subnet] => (None, Some(*region), Some(*subnet)),
        _ => (None, None, None),
    }
}

/// Registered bucket and output attribute for kinds that resolve by plain lookup
fn view(kind: &str) -> Option<(Bucket, &'static str)> {
    let view = match kind {
        "user" => (Bucket::Users, "primary_email"),
        "group" => (Bucket::Groups, "id"),
        "group_name" => (Bucket::Groups, "name"),
        "service_account" | "serviceaccount" => (Bucket::ServiceAccount, "email"),
        "network" => (Bucket::Network, "network_self_link"),
        "network_name" => (Bucket::Network, "network_name"),
        "network_id" => (Bucket::Network, "network_id"),
        "project" => (Bucket::Projects, "project_id"),
        "project_number" => (Bucket::Projects, "project_number"),
        "folder" => (Bucket::Folders, "name"),
        "folder_id" => (Bucket::Folders, "folder_id"),
        "external_vpn_gateway" => (Bucket::ExternalVpnGateway, "self_link"),
        "sc_policy" => (Bucket::ScPolicy, "name"),
        "sc_access_level_name" => (Bucket::ScAccessLevel, "name"),
        "custom_org_policy" => (Bucket::CustomOrgPolicy, "name"),
        "log_destination" => (Bucket::LogDestination, "destination_uri"),
        "vm_template" => (Bucket::VmTemplate, "self_link_unique"),
        "disk" => (Bucket::Disk, "self_link"),
        "bq_dataset" => (Bucket::BqDataset, "dataset_id"),
        "bq_table" => (Bucket::BqTable, "table_id"),
        "bq_routine" => (Bucket::BqRoutine, "routine_id"),
        "wif_pool" => (Bucket::WorkforcePool, "workforce_pool_id"),
        "wi_pool" => (Bucket::WorkloadPool, "workload_identity_pool_id"),
        _ => return None,
    };
    Some(view)
}

pub struct Resolver<'a> {
    registry: &'a NameRegistry,
    accumulators: &'a Accumulators,
    variables: &'a mut Variables,
    backend: &'a mut dyn Backend,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a NameRegistry,
        accumulators: &'a Accumulators,
        variables: &'a mut Variables,
        backend: &'a mut dyn Backend,
    ) -> Self {
        Self {
            registry,
            accumulators,
            variables,
            backend,
        }
    }

    /// Resolve `name`, falling back to the name itself
    pub fn reference(&mut self, kind: &str, name: &str) -> Value {
        self.reference_or(kind, name, Value::from(name))
    }

    /// Resolve `name`, falling back to `default`
    pub fn reference_or(&mut self, kind: &str, name: &str, default: Value) -> Value {
        let resolved = self.resolve(kind, name).unwrap_or(default);
        tracing::trace!(kind, name, %resolved, "resolved");
        resolved
    }

    /// Resolve each plain string of a list, other elements are kept
    pub fn references(&mut self, kind: &str, names: &[Value]) -> Value {
        let resolved = names
            .iter()
            .map(|name| match name.as_plain_string() {
                Some(name) => self.reference(kind, &name),
                None => name.clone(),
            })
            .collect::<Vec<_>>();
        Value::Array(resolved)
    }

    /// Resolve the id part of a `TYPE:id` principal, using the lower-cased type as kind
    ///
    /// Principals without a type are kept as is.
    pub fn principal(&mut self, principal: &str) -> Value {
        let Some((principal_type, id)) = principal.split_once(':') else {
            return Value::from(principal);
        };

        let resolved = self.reference(&principal_type.to_lowercase(), id);
        Value::template([Value::from(format!("{principal_type}:")), resolved])
    }

    /// Rewrite the principals of the IAM shapes used by fabric modules
    ///
    /// - `iam`: role to principal list
    /// - `iam_bindings`, `iam_bindings_additive`: binding name to `{ member | members, role }`
    /// - `iam_by_principals`, `iam_by_principals_additive`: principal to role list
    pub fn fabric_iam(&mut self, value: &mut Value) {
        for key in ["iam_bindings_additive", "iam_bindings"] {
            let Some(bindings) = value.get_mut(key).and_then(Value::as_object_mut) else {
                continue;
            };
            for binding in bindings.values_mut() {
                if let Some(member) = binding.get_str("member") {
                    let member = self.principal(&member);
                    binding.insert("member", member);
                }
                if let Some(members) = binding.get("members").and_then(Value::as_array) {
                    let members = self.principals(members);
                    binding.insert("members", members);
                }
            }
        }

        if let Some(iam) = value.get_mut("iam").and_then(Value::as_object_mut) {
            for principals in iam.values_mut() {
                if let Some(list) = principals.as_array() {
                    *principals = self.principals(list);
                }
            }
        }

        for key in ["iam_by_principals", "iam_by_principals_additive"] {
            let Some(by_principal) = value.get(key).and_then(Value::as_object) else {
                continue;
            };
            let rewritten = by_principal
                .iter()
                .map(|(principal, roles)| (self.principal(principal).to_string(), roles.clone()))
                .collect::<indexmap::IndexMap<_, _>>();
            if !rewritten.is_empty() {
                value.insert(key, Value::Object(rewritten));
            }
        }
    }

    fn principals(&mut self, principals: &[Value]) -> Value {
        let resolved = principals
            .iter()
            .map(|principal| match principal.as_str() {
                Some(principal) => self.principal(principal),
                None => principal.clone(),
            })
            .collect::<Vec<_>>();
        Value::Array(resolved)
    }

    fn resolve(&mut self, kind: &str, name: &str) -> Option<Value> {
        match kind {
            "billing" | "billing_account" if name.is_empty() => Some(self.variable("billing_id")),
            "customer_id" if name.is_empty() => {
                let organization = Bucket::Data("google_organization".into());
                match self.registry.lookup(&organization, "org") {
                    Some(handle) => Some(handle.output("directory_customer_id")),
                    None => Some(self.variable("customer_id")),
                }
            }
            "organization" => Some(self.variable("organization_id")),
            "projects/number" => self
                .lookup(&Bucket::Projects, name, "project_number")
                .map(|number| Value::template([Value::from("projects/"), number])),
            "subnet" => self.subnet(name),
            "vpn_ha" if self.accumulators.vpn_ha.contains(name) => {
                let id = crate::util::block_id(&format!("vpn_ha_{name}"));
                Some(Address::module(&id).attr("self_link").into())
            }
            _ => {
                let (bucket, output) = view(kind)?;
                self.lookup(&bucket, name, output)
            }
        }
    }

    fn lookup(&self, bucket: &Bucket, name: &str, output: &str) -> Option<Value> {
        self.registry
            .lookup(bucket, name)
            .map(|handle| handle.output(output))
    }

    fn variable(&mut self, name: &str) -> Value {
        self.variables.ensure(&mut *self.backend, &[name]);
        self.variables
            .get(name)
            .map(|handle| handle.value())
            .unwrap_or_else(|| Address::variable(name).into())
    }

    fn subnet(&mut self, path: &str) -> Option<Value> {
        let (project, region, subnet) = parse_subnet(path);
        let (Some(region), Some(subnet)) = (region, subnet) else {
            return None;
        };

        let region_subnet = format!("{region}/{subnet}");
        if let Some(network) = self.accumulators.subnets.get(&region_subnet) {
            let id = crate::util::block_id(&format!("nw_{network}"));
            let address = Address::module(&id)
                .attr("subnets")
                .key(&region_subnet)
                .attr("self_link");
            return Some(address.into());
        }

        let project = match project {
            Some(project) => Value::from(project),
            None => self.variable("nw_project_id"),
        };
        Some(Value::template([
            Value::from("projects/"),
            project,
            Value::from(format!("/regions/{region}/subnetworks/{subnet}")),
        ]))
    }
}
