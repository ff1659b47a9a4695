//! name registry
//!
//! Maps `(bucket, logical name)` to the [Handle] of the block generated for it. Registration happens once per entity,
//! lookups are how the resolver finds out whether an entity exists in the current sub-stack.
use crate::address::Handle;
use indexmap::IndexMap;

/// Namespace of logical names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    Users,
    Groups,
    ServiceAccount,
    WorkforcePool,
    WorkforcePoolProvider,
    WorkloadPool,
    WorkloadPoolProvider,
    Folders,
    Projects,
    FabricOrganization,
    Iam,
    ProjectApi,
    Network,
    Firewall,
    FirewallPolicy,
    Peering,
    Router,
    Vpn,
    VpnHa,
    ExternalVpnGateway,
    Logging,
    LogSink,
    LogDestination,
    Monitoring,
    OrgPolicy,
    CustomOrgPolicy,
    ScPolicy,
    ScAccessLevel,
    ScPerimeter,
    Kms,
    Gcs,
    Pubsub,
    BqDataset,
    BqTable,
    BqRoutine,
    Cloudsql,
    Gke,
    Vm,
    Disk,
    VmTemplate,
    VmFromTemplate,
    Mig,
    Umig,
    Parallelstore,
    Module,
    Null,
    Locals,
    /// data sources of the given type
    Data(String),
    /// plain resources of the given type
    Resource(String),
    /// fabric modules of the given kind that nothing refers to by name, registered to reject duplicates
    Fabric(String),
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Bucket::Users => "users",
            Bucket::Groups => "groups",
            Bucket::ServiceAccount => "service_account",
            Bucket::WorkforcePool => "wif_pool",
            Bucket::WorkforcePoolProvider => "wif_pool_provider",
            Bucket::WorkloadPool => "wi_pool",
            Bucket::WorkloadPoolProvider => "wi_pool_provider",
            Bucket::Folders => "folders",
            Bucket::Projects => "projects",
            Bucket::FabricOrganization => "fabric_org",
            Bucket::Iam => "iam",
            Bucket::ProjectApi => "project_api",
            Bucket::Network => "network",
            Bucket::Firewall => "firewall",
            Bucket::FirewallPolicy => "firewall_policy",
            Bucket::Peering => "peering",
            Bucket::Router => "router",
            Bucket::Vpn => "vpn",
            Bucket::VpnHa => "vpn_ha",
            Bucket::ExternalVpnGateway => "external_vpn_gateway",
            Bucket::Logging => "logging",
            Bucket::LogSink => "logsink",
            Bucket::LogDestination => "log_destination",
            Bucket::Monitoring => "monitoring",
            Bucket::OrgPolicy => "org_policy",
            Bucket::CustomOrgPolicy => "custom_org_policy",
            Bucket::ScPolicy => "sc_policy",
            Bucket::ScAccessLevel => "sc_access_level",
            Bucket::ScPerimeter => "sc_perimeter",
            Bucket::Kms => "kms",
            Bucket::Gcs => "gcs",
            Bucket::Pubsub => "pubsub",
            Bucket::BqDataset => "bq_dataset",
            Bucket::BqTable => "bq_table",
            Bucket::BqRoutine => "bq_routine",
            Bucket::Cloudsql => "cloudsql",
            Bucket::Gke => "gke",
            Bucket::Vm => "vm",
            Bucket::Disk => "disk",
            Bucket::VmTemplate => "vm_template",
            Bucket::VmFromTemplate => "vm_from_template",
            Bucket::Mig => "mig",
            Bucket::Umig => "umig",
            Bucket::Parallelstore => "parallelstore",
            Bucket::Module => "module",
            Bucket::Null => "null",
            Bucket::Locals => "locals",
            Bucket::Data(data_type) => return write!(f, "data.{data_type}"),
            Bucket::Resource(resource_type) => return write!(f, "resource.{resource_type}"),
            Bucket::Fabric(kind) => return write!(f, "fabric.{kind}"),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
pub struct NameRegistry {
    buckets: IndexMap<Bucket, IndexMap<String, Handle>>,
}

impl NameRegistry {
    /// Create an empty bucket unless it exists already
    pub fn ensure_bucket(&mut self, bucket: &Bucket) {
        if !self.buckets.contains_key(bucket) {
            tracing::trace!(%bucket, "bucket created");
            self.buckets.insert(bucket.clone(), IndexMap::new());
        }
    }

    /// Register a handle, names can only be registered once per bucket
    pub fn register(
        &mut self,
        bucket: Bucket,
        name: impl Into<String>,
        handle: Handle,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let entries = self.buckets.entry(bucket.clone()).or_default();
        if entries.contains_key(&name) {
            return Err(RegistryError::Duplicate { bucket, name });
        }

        tracing::trace!(%bucket, name, address=%handle.address(), "registered");
        entries.insert(name, handle);
        Ok(())
    }

    pub fn lookup(&self, bucket: &Bucket, name: &str) -> Option<&Handle> {
        self.buckets.get(bucket).and_then(|entries| entries.get(name))
    }

    pub fn contains(&self, bucket: &Bucket, name: &str) -> bool {
        self.lookup(bucket, name).is_some()
    }

    pub fn has_bucket(&self, bucket: &Bucket) -> bool {
        self.buckets.contains_key(bucket)
    }

    /// Names of a bucket in registration order
    pub fn keys(&self, bucket: &Bucket) -> impl Iterator<Item = &String> {
        self.buckets.get(bucket).into_iter().flat_map(IndexMap::keys)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&Bucket, &IndexMap<String, Handle>)> {
        self.buckets.iter()
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("`{name}` is already registered in `{bucket}`")]
    Duplicate { bucket: Bucket, name: String },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::address::Address;
    use pretty_assertions::assert_eq;

    #[test]
    fn register_and_lookup() {
        let mut registry = NameRegistry::default();
        let handle = Handle::new(Address::module("nw_vpc1"));
        registry
            .register(Bucket::Network, "vpc1", handle.clone())
            .unwrap();

        assert_eq!(registry.lookup(&Bucket::Network, "vpc1"), Some(&handle));
        assert!(!registry.contains(&Bucket::Network, "vpc2"));
        assert!(!registry.contains(&Bucket::Projects, "vpc1"));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = NameRegistry::default();
        let handle = Handle::new(Address::module("prj_a"));
        registry
            .register(Bucket::Projects, "a", handle.clone())
            .unwrap();

        assert_eq!(
            registry.register(Bucket::Projects, "a", handle),
            Err(RegistryError::Duplicate {
                bucket: Bucket::Projects,
                name: "a".into()
            })
        );
    }

    #[test]
    fn keys_in_registration_order() {
        let mut registry = NameRegistry::default();
        registry.ensure_bucket(&Bucket::Folders);
        assert!(registry.has_bucket(&Bucket::Folders));
        assert_eq!(registry.keys(&Bucket::Folders).count(), 0);

        for name in ["/b", "/a", "/b/c"] {
            let address = Address::resource("google_folder", name);
            registry
                .register(Bucket::Folders, name, Handle::new(address))
                .unwrap();
        }
        let keys: Vec<_> = registry.keys(&Bucket::Folders).cloned().collect();
        assert_eq!(keys, vec!["/b", "/a", "/b/c"]);
    }

    #[test]
    fn typed_buckets_display() {
        assert_eq!(
            Bucket::Data("google_organization".into()).to_string(),
            "data.google_organization"
        );
        assert_eq!(Bucket::LogDestination.to_string(), "log_destination");
        assert_eq!(Bucket::Fabric("dns".into()).to_string(), "fabric.dns");
    }
}
