//! VPC networks, routers, firewalls and peerings
//!
//! Networks built with the fabric `net-vpc` module land in their own bucket: `network` references only ever point at
//! networks of the `network` kind.
use super::{fabric_module, parent, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, StackContext};
use crate::util::short_region;
use crate::value::Value;

const NETWORK_MODULE: &str = "terraform-google-modules/network/google";
const FIREWALL_RULES: &str = "terraform-google-modules/network/google//modules/firewall-rules";
const HIERARCHICAL_POLICY: &str =
    "terraform-google-modules/network/google//modules/hierarchical-firewall-policy";
const NETWORK_POLICY: &str =
    "terraform-google-modules/network/google//modules/network-firewall-policy";
const PEERING_MODULE: &str = "terraform-google-modules/network/google//modules/network-peering";
const NETWORK_VERSION: &str = "~> 9.0";
const ROUTER_MODULE: &str = "terraform-google-modules/cloud-router/google";
const ROUTER_VERSION: &str = "~> 6.0";

/// Networks, followed by the routers of the `router_<range>` range
pub fn networks(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut network in ctx.items(range) {
        let name = required(&network, range, "network_name")?;
        ctx.resolve_field(&mut network, "project_id", "project");

        let handle = ctx.construct(
            Construct::module(&format!("nw_{name}"), NETWORK_MODULE, Some(NETWORK_VERSION))
                .fields(network),
        );
        ctx.register(Bucket::Network, name, handle)?;
    }

    let routers_range = format!("router_{range}");
    ctx.section(&routers_range, false);
    routers(ctx, &routers_range)
}

/// Cloud routers with their NATs, named after network and region
pub fn routers(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut router in ctx.items(range) {
        let network = required(&router, range, "network")?;
        let region = required(&router, range, "region")?;
        let network_region = format!("{network}-{}", short_region(&region));

        router.insert("name", format!("cr-{network_region}"));
        if let Some(nats) = router.get_mut("nats").and_then(Value::as_array_mut) {
            for nat in nats {
                nat.insert("name", format!("nat-{network_region}"));
                if let Some(subnetworks) = nat.get_mut("subnetworks").and_then(Value::as_array_mut) {
                    for subnetwork in subnetworks {
                        ctx.resolve_field(subnetwork, "name", "subnet");
                    }
                }
            }
        }
        ctx.resolve_field(&mut router, "project", "project");
        ctx.resolve_field(&mut router, "network", "network");

        let handle = ctx.construct(
            Construct::module(
                &format!("cr_{network_region}"),
                ROUTER_MODULE,
                Some(ROUTER_VERSION),
            )
            .fields(router),
        );
        ctx.register(Bucket::Router, format!("cr-{network_region}"), handle)?;
    }
    Ok(())
}

/// Firewall rules, one module per network
///
/// Nothing refers to a firewall by name, the registration only rejects a second item for the same network.
pub fn firewalls(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut firewall in ctx.items(range) {
        let network = required(&firewall, range, "network_name")?;
        ctx.resolve_field(&mut firewall, "project_id", "project");
        ctx.resolve_field(&mut firewall, "network_name", "network");

        let handle = ctx.construct(
            Construct::module(&format!("fw_{network}"), FIREWALL_RULES, Some(NETWORK_VERSION))
                .fields(firewall),
        );
        ctx.register(Bucket::Firewall, network, handle)?;
    }
    Ok(())
}

fn resolve_rule_service_accounts(ctx: &mut StackContext, policy: &mut Value) {
    let Some(rules) = policy.get_mut("rules").and_then(Value::as_array_mut) else {
        return;
    };
    for rule in rules {
        ctx.resolve_list(rule, "target_service_accounts", "service_account");
    }
}

/// Hierarchical firewall policies attached to the organization or folders
pub fn hierarchical_policies(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut policy in ctx.items(range) {
        let name = required(&policy, range, "policy_name")?;
        let node = required(&policy, range, "parent_node")?;
        let parent_node = parent(ctx, &node);
        policy.insert("parent_node", parent_node);

        if policy.has("target_org") {
            let org = ctx.reference("organization", "/");
            policy.insert("target_org", org);
        }
        let folders = policy.items("target_folders").to_vec();
        let folders = ctx.references("folder_id", &folders);
        policy.insert("target_folders", folders);
        resolve_rule_service_accounts(ctx, &mut policy);

        let handle = ctx.construct(
            Construct::module(
                &format!("fprh_{name}"),
                HIERARCHICAL_POLICY,
                Some(NETWORK_VERSION),
            )
            .fields(policy),
        );
        ctx.register(Bucket::FirewallPolicy, name, handle)?;
    }
    Ok(())
}

/// Global network firewall policies attached to VPCs
pub fn network_policies(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut policy in ctx.items(range) {
        let name = required(&policy, range, "policy_name")?;
        ctx.resolve_field(&mut policy, "project_id", "project");
        let networks = policy.items("target_vpcs").to_vec();
        let networks = ctx.references("network_id", &networks);
        policy.insert("target_vpcs", networks);
        resolve_rule_service_accounts(ctx, &mut policy);

        let handle = ctx.construct(
            Construct::module(&format!("fpnw_{name}"), NETWORK_POLICY, Some(NETWORK_VERSION))
                .fields(policy),
        );
        ctx.register(Bucket::FirewallPolicy, name, handle)?;
    }
    Ok(())
}

/// Network peerings
///
/// Peerings of the same range are chained, each one waits for the previous one to complete.
pub fn peerings(ctx: &mut StackContext, range: &str) -> BuildResult {
    let mut depends_on: Vec<Value> = vec![];
    for mut pair in ctx.items(range) {
        let local = required(&pair, range, "local_network")?;
        let peer = required(&pair, range, "peer_network")?;
        let id = format!("peer_{local}_{peer}");

        if !pair.has("prefix") {
            pair.insert("prefix", "peer");
        }
        ctx.resolve_field(&mut pair, "local_network", "network");
        ctx.resolve_field(&mut pair, "peer_network", "network");
        pair.insert("module_depends_on", depends_on);

        let handle = ctx.construct(
            Construct::module(&id, PEERING_MODULE, Some(NETWORK_VERSION)).fields(pair),
        );
        depends_on = vec![handle.output("complete")];
        ctx.register(Bucket::Peering, id, handle)?;
    }
    Ok(())
}

/// VPCs through the fabric `net-vpc` module, every kind of subnet carries its own IAM
pub fn fabric_networks(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut vpc in ctx.items(range) {
        let name = required(&vpc, range, "name")?;
        ctx.resolve_field(&mut vpc, "project_id", "project");
        for key in ["subnets", "subnets_proxy_only", "subnets_psc"] {
            if let Some(subnets) = vpc.get_mut(key).and_then(Value::as_array_mut) {
                for subnet in subnets {
                    ctx.fabric_iam(subnet);
                }
            }
        }

        let handle = ctx.construct(
            Construct::module(&format!("net_{name}"), &fabric_module("net-vpc"), None).fields(vpc),
        );
        ctx.register(Bucket::Fabric("network".to_string()), name, handle)?;
    }
    Ok(())
}

/// Rules of one VPC through the fabric `net-vpc-firewall` module
pub fn fabric_vpc_firewalls(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut firewall in ctx.items(range) {
        let network = required(&firewall, range, "network")?;
        ctx.resolve_field(&mut firewall, "project_id", "project");
        ctx.resolve_field(&mut firewall, "network", "network_name");

        let handle = ctx.construct(
            Construct::module(
                &format!("vpcfw_{network}"),
                &fabric_module("net-vpc-firewall"),
                None,
            )
            .fields(firewall),
        );
        ctx.register(Bucket::Fabric("vpc_firewall".to_string()), network, handle)?;
    }
    Ok(())
}

/// Hierarchical or network firewall policies through the fabric `net-firewall-policy` module
///
/// `parent_id` is a hierarchy node, a project for network policies.
pub fn fabric_firewall_policies(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut policy in ctx.items(range) {
        let name = required(&policy, range, "name")?;
        let node = required(&policy, range, "parent_id")?;
        let parent_id = parent(ctx, &node);
        policy.insert("parent_id", parent_id);

        let handle = ctx.construct(
            Construct::module(
                &format!("fwpo_{name}"),
                &fabric_module("net-firewall-policy"),
                None,
            )
            .fields(policy),
        );
        ctx.register(Bucket::Fabric("firewall_policy".to_string()), name, handle)?;
    }
    Ok(())
}
