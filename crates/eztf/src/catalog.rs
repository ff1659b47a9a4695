//! resource kinds
//!
//! Every kind string a stack entry may bind a range to, together with what the stack builder needs to know about it
//! before and while building: the bucket its names land in, the accumulators it feeds, the variables it always uses
//! and the constructor itself.
use crate::accumulate::Accumulator;
use crate::registry::Bucket;
use crate::resources::compute::{self, GkeFlavor};
use crate::resources::data::{self, SqlEngine};
use crate::resources::logging::{self, LogDestinationType};
use crate::resources::{
    certificates, generic, hierarchy, iam, identity, network, network_services, policy, vpn,
};
use crate::stack::{BuildError, StackContext};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Users,
    Groups,
    FabricGroups,
    Folders,
    Projects,
    FabricFolders,
    FabricProjects,
    FabricOrganizations,
    Iam,
    ServiceAccount,
    FabricServiceAccount,
    ProjectApi,
    WorkforcePool,
    WorkforcePoolProvider,
    WorkloadPool,
    WorkloadPoolProvider,
    Network,
    Firewall,
    FirewallPolicyNetwork,
    FirewallPolicyHierarchical,
    FabricNetwork,
    FabricVpcFirewall,
    FabricFirewallPolicy,
    FabricSecureWebProxy,
    FabricDns,
    FabricDnsPolicy,
    FabricAddress,
    FabricNat,
    Peering,
    Router,
    Vpn,
    VpnHa,
    FabricVpnHa,
    ExternalVpnGateway,
    Logging,
    LogSink,
    LogDestination(LogDestinationType),
    FabricLogBucket,
    Monitoring,
    OrgPolicy,
    CustomOrgPolicy,
    ScPolicy,
    ScAccessLevel,
    ScPerimeter,
    ScPerimeterBridge,
    Kms,
    FabricKms,
    FabricCertificateAuthority,
    FabricCertificateManager,
    Gcs,
    FabricGcs,
    Pubsub,
    BqDataset,
    BqTable,
    BqRoutine,
    CloudSql(SqlEngine),
    Gke(GkeFlavor),
    Vm,
    FabricVm,
    Disk,
    VmTemplate,
    VmFromTemplate,
    Mig,
    Umig,
    Parallelstore,
    AnyModule,
    AnyResource,
    AnyData,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown resource kind `{0}`")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        use ResourceKind::*;

        let kind = match kind {
            "users" => Users,
            "groups" => Groups,
            "ff_groups" => FabricGroups,
            "folders" => Folders,
            "projects" => Projects,
            "ff_folders" => FabricFolders,
            "ff_projects" => FabricProjects,
            "ff_orgs" => FabricOrganizations,
            "iam" => Iam,
            "service_account" => ServiceAccount,
            "ff_iam_sa" => FabricServiceAccount,
            "project_api" => ProjectApi,
            "wif_pool" => WorkforcePool,
            "wif_pool_provider" => WorkforcePoolProvider,
            "wi_pool" => WorkloadPool,
            "wi_pool_provider" => WorkloadPoolProvider,
            "network" => Network,
            "firewall" => Firewall,
            "firewall_policy_nw" => FirewallPolicyNetwork,
            "firewall_policy_rh" => FirewallPolicyHierarchical,
            "ff_network" => FabricNetwork,
            "ff_vpc_firewall" => FabricVpcFirewall,
            "ff_firewall_policy" => FabricFirewallPolicy,
            "ff_swp" => FabricSecureWebProxy,
            "ff_dns" => FabricDns,
            "ff_dnspo" => FabricDnsPolicy,
            "ff_addr" => FabricAddress,
            "ff_nat" => FabricNat,
            "peering" => Peering,
            "router" => Router,
            "vpn" => Vpn,
            "vpn_ha" => VpnHa,
            "ff_vpn_ha" => FabricVpnHa,
            "external_vpn_gateway" => ExternalVpnGateway,
            "logging" => Logging,
            "logsink" => LogSink,
            "logpubsub" | "logstorage" | "logbucket" | "logbigquery" | "logproject" => {
                match LogDestinationType::from_key(kind) {
                    Some(destination) => LogDestination(destination),
                    None => return Err(UnknownKind(kind.to_string())),
                }
            }
            "ff_logbucket" => FabricLogBucket,
            "monitoring" => Monitoring,
            "org_policy" | "org_node_policy" => OrgPolicy,
            "custom_org_policy" => CustomOrgPolicy,
            "sc_policy" => ScPolicy,
            "sc_access_level" => ScAccessLevel,
            "sc_perimeter" => ScPerimeter,
            "sc_perimeter_bridge" => ScPerimeterBridge,
            "kms" => Kms,
            "ff_kms" => FabricKms,
            "ff_cas" => FabricCertificateAuthority,
            "ff_cm" => FabricCertificateManager,
            "gcs" => Gcs,
            "ff_gcs" => FabricGcs,
            "pubsub" => Pubsub,
            "bq_dataset" => BqDataset,
            "bq_table" => BqTable,
            "bq_routine" => BqRoutine,
            "cloudsql" | "pgsql" => CloudSql(SqlEngine::Postgres),
            "mysql" => CloudSql(SqlEngine::MySql),
            "mssql" => CloudSql(SqlEngine::SqlServer),
            "gke" => Gke(GkeFlavor::Standard),
            "gke_private" => Gke(GkeFlavor::Private),
            "gke_autopilot" => Gke(GkeFlavor::Autopilot),
            "gke_autopilot_private" => Gke(GkeFlavor::AutopilotPrivate),
            "vm" => Vm,
            "ff_vm" => FabricVm,
            "disk" => Disk,
            "vm_template" => VmTemplate,
            "vm_from_template" => VmFromTemplate,
            "mig" => Mig,
            "umig" => Umig,
            "parallelstore" => Parallelstore,
            "any_module" | "mod" => AnyModule,
            "any_resource" | "res" => AnyResource,
            "any_data" | "data" => AnyData,
            _ => return Err(UnknownKind(kind.to_string())),
        };
        Ok(kind)
    }
}

impl ResourceKind {
    /// Variables declared for the kind before anything is built
    pub fn required_variables(self) -> &'static [&'static str] {
        use ResourceKind::*;

        match self {
            Users => &["organization_id", "setup_service_account"],
            Iam
            | Folders
            | FirewallPolicyNetwork
            | FirewallPolicyHierarchical
            | OrgPolicy
            | CustomOrgPolicy
            | Logging
            | LogSink
            | ScPolicy => &["organization_id"],
            Projects => &["organization_id", "billing_id", "project_suffix"],
            _ => &[],
        }
    }

    /// Accumulators filled from the kind's range during the prepass
    pub fn accumulators(self) -> &'static [Accumulator] {
        match self {
            ResourceKind::Network => &[Accumulator::Subnets],
            ResourceKind::LogSink => &[Accumulator::LogDestinations],
            ResourceKind::VpnHa | ResourceKind::FabricVpnHa => &[Accumulator::VpnHa],
            _ => &[],
        }
    }

    /// Bucket the kind registers its names in
    ///
    /// `None` for arbitrary resources and data sources, their bucket depends on the configured type.
    pub fn bucket(self) -> Option<Bucket> {
        use ResourceKind::*;

        let bucket = match self {
            Users => Bucket::Users,
            Groups | FabricGroups => Bucket::Groups,
            Folders => Bucket::Folders,
            Projects | FabricProjects => Bucket::Projects,
            FabricFolders => Bucket::Folders,
            FabricOrganizations => Bucket::FabricOrganization,
            Iam => Bucket::Iam,
            ServiceAccount | FabricServiceAccount => Bucket::ServiceAccount,
            ProjectApi => Bucket::ProjectApi,
            WorkforcePool => Bucket::WorkforcePool,
            WorkforcePoolProvider => Bucket::WorkforcePoolProvider,
            WorkloadPool => Bucket::WorkloadPool,
            WorkloadPoolProvider => Bucket::WorkloadPoolProvider,
            Network => Bucket::Network,
            Firewall => Bucket::Firewall,
            FirewallPolicyNetwork | FirewallPolicyHierarchical => Bucket::FirewallPolicy,
            FabricNetwork => Bucket::Fabric("network".to_string()),
            FabricVpcFirewall => Bucket::Fabric("vpc_firewall".to_string()),
            FabricFirewallPolicy => Bucket::Fabric("firewall_policy".to_string()),
            FabricSecureWebProxy => Bucket::Fabric("swp".to_string()),
            FabricDns => Bucket::Fabric("dns".to_string()),
            FabricDnsPolicy => Bucket::Fabric("dnspo".to_string()),
            FabricAddress => Bucket::Fabric("addr".to_string()),
            FabricNat => Bucket::Fabric("nat".to_string()),
            Peering => Bucket::Peering,
            Router => Bucket::Router,
            Vpn => Bucket::Vpn,
            VpnHa | FabricVpnHa => Bucket::VpnHa,
            ExternalVpnGateway => Bucket::ExternalVpnGateway,
            Logging => Bucket::Logging,
            LogSink => Bucket::LogSink,
            LogDestination(_) => Bucket::LogDestination,
            FabricLogBucket => Bucket::Fabric("logbucket".to_string()),
            Monitoring => Bucket::Monitoring,
            OrgPolicy => Bucket::OrgPolicy,
            CustomOrgPolicy => Bucket::CustomOrgPolicy,
            ScPolicy => Bucket::ScPolicy,
            ScAccessLevel => Bucket::ScAccessLevel,
            ScPerimeter | ScPerimeterBridge => Bucket::ScPerimeter,
            Kms | FabricKms => Bucket::Kms,
            FabricCertificateAuthority => Bucket::Fabric("cas".to_string()),
            FabricCertificateManager => Bucket::Fabric("cm".to_string()),
            Gcs | FabricGcs => Bucket::Gcs,
            Pubsub => Bucket::Pubsub,
            BqDataset => Bucket::BqDataset,
            BqTable => Bucket::BqTable,
            BqRoutine => Bucket::BqRoutine,
            CloudSql(_) => Bucket::Cloudsql,
            Gke(_) => Bucket::Gke,
            Vm | FabricVm => Bucket::Vm,
            Disk => Bucket::Disk,
            VmTemplate => Bucket::VmTemplate,
            VmFromTemplate => Bucket::VmFromTemplate,
            Mig => Bucket::Mig,
            Umig => Bucket::Umig,
            Parallelstore => Bucket::Parallelstore,
            AnyModule => Bucket::Module,
            AnyResource | AnyData => return None,
        };
        Some(bucket)
    }

    /// Build the items of `range`
    pub fn build(self, ctx: &mut StackContext, range: &str) -> Result<(), BuildError> {
        use ResourceKind::*;

        match self {
            Users => identity::users(ctx, range),
            Groups => identity::groups(ctx, range),
            FabricGroups => identity::fabric_groups(ctx, range),
            Folders => hierarchy::folders(ctx, range),
            Projects => hierarchy::projects(ctx, range),
            FabricFolders => hierarchy::fabric_folders(ctx, range),
            FabricProjects => hierarchy::fabric_projects(ctx, range),
            FabricOrganizations => hierarchy::fabric_organizations(ctx, range),
            Iam => iam::iam(ctx, range),
            ServiceAccount => identity::service_accounts(ctx, range),
            FabricServiceAccount => identity::fabric_service_accounts(ctx, range),
            ProjectApi => hierarchy::project_services(ctx, range),
            WorkforcePool => identity::workforce_pools(ctx, range),
            WorkforcePoolProvider => identity::workforce_pool_providers(ctx, range),
            WorkloadPool => identity::workload_pools(ctx, range),
            WorkloadPoolProvider => identity::workload_pool_providers(ctx, range),
            Network => network::networks(ctx, range),
            Firewall => network::firewalls(ctx, range),
            FirewallPolicyNetwork => network::network_policies(ctx, range),
            FirewallPolicyHierarchical => network::hierarchical_policies(ctx, range),
            FabricNetwork => network::fabric_networks(ctx, range),
            FabricVpcFirewall => network::fabric_vpc_firewalls(ctx, range),
            FabricFirewallPolicy => network::fabric_firewall_policies(ctx, range),
            FabricSecureWebProxy => network_services::secure_web_proxies(ctx, range),
            FabricDns => network_services::dns_zones(ctx, range),
            FabricDnsPolicy => network_services::dns_policies(ctx, range),
            FabricAddress => network_services::addresses(ctx, range),
            FabricNat => network_services::nats(ctx, range),
            Peering => network::peerings(ctx, range),
            Router => network::routers(ctx, range),
            Vpn => vpn::vpns(ctx, range),
            VpnHa => vpn::vpn_ha(ctx, range),
            FabricVpnHa => vpn::fabric_vpn_ha(ctx, range),
            ExternalVpnGateway => vpn::external_vpn_gateways(ctx, range),
            Logging => logging::centralized_logging(ctx, range),
            LogSink => logging::log_sinks(ctx, range),
            LogDestination(destination) => logging::log_destinations(ctx, range, destination),
            FabricLogBucket => logging::fabric_log_buckets(ctx, range),
            Monitoring => logging::monitoring(ctx, range),
            OrgPolicy => policy::org_policies(ctx, range),
            CustomOrgPolicy => policy::custom_org_policies(ctx, range),
            ScPolicy => policy::access_policies(ctx, range),
            ScAccessLevel => policy::access_levels(ctx, range),
            ScPerimeter => policy::perimeters(ctx, range),
            ScPerimeterBridge => policy::perimeter_bridges(ctx, range),
            Kms => data::kms(ctx, range),
            FabricKms => data::fabric_kms(ctx, range),
            FabricCertificateAuthority => certificates::certificate_authorities(ctx, range),
            FabricCertificateManager => certificates::certificate_managers(ctx, range),
            Gcs => data::buckets(ctx, range),
            FabricGcs => data::fabric_buckets(ctx, range),
            Pubsub => data::pubsub(ctx, range),
            BqDataset => data::bigquery_datasets(ctx, range),
            BqTable => data::bigquery_tables(ctx, range),
            BqRoutine => data::bigquery_routines(ctx, range),
            CloudSql(engine) => data::cloudsql(ctx, range, engine),
            Gke(flavor) => compute::clusters(ctx, range, flavor),
            Vm => compute::instances(ctx, range),
            FabricVm => compute::fabric_instances(ctx, range),
            Disk => compute::disks(ctx, range),
            VmTemplate => compute::instance_templates(ctx, range),
            VmFromTemplate => compute::instances_from_template(ctx, range),
            Mig => compute::managed_groups(ctx, range),
            Umig => compute::unmanaged_groups(ctx, range),
            Parallelstore => data::parallelstores(ctx, range),
            AnyModule => generic::modules(ctx, range),
            AnyResource => generic::resources(ctx, range),
            AnyData => generic::data_sources(ctx, range),
        }
    }
}
