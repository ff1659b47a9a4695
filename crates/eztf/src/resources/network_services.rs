//! DNS, secure web proxies, reserved addresses and Cloud NAT through fabric modules
use super::{fabric_module, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, StackContext};
use crate::value::Value;

/// Address maps of the `net-address` module, each entry may sit in a network or subnet
const ADDRESS_MAPS: &[&str] = &[
    "external_addresses",
    "internal_addresses",
    "global_addresses",
    "ipsec_interconnect_addresses",
    "network_attachments",
    "psa_addresses",
    "psc_addresses",
];

/// Build one fabric module per item, `prepare` resolves the item's references
fn fabric_items(
    ctx: &mut StackContext,
    range: &str,
    kind: &str,
    module: &str,
    prepare: fn(&mut StackContext, &mut Value),
) -> BuildResult {
    for mut item in ctx.items(range) {
        let name = required(&item, range, "name")?;
        ctx.resolve_field(&mut item, "project_id", "project");
        prepare(ctx, &mut item);

        let handle = ctx.construct(
            Construct::module(&format!("{kind}_{name}"), &fabric_module(module), None).fields(item),
        );
        ctx.register(Bucket::Fabric(kind.to_string()), name, handle)?;
    }
    Ok(())
}

/// Secure web proxies
pub fn secure_web_proxies(ctx: &mut StackContext, range: &str) -> BuildResult {
    fabric_items(ctx, range, "swp", "net-swp", |ctx, swp| {
        ctx.resolve_field(swp, "network", "network");
        ctx.resolve_field(swp, "subnetwork", "subnet");
        if let Some(attachment) = swp.get_mut("service_attachment") {
            ctx.resolve_list(attachment, "nat_subnets", "subnet");
        }
    })
}

/// Cloud DNS zones, client and peer networks of private zones are resolved
pub fn dns_zones(ctx: &mut StackContext, range: &str) -> BuildResult {
    fabric_items(ctx, range, "dns", "dns", |ctx, zone| {
        if let Some(config) = zone.get_mut("zone_config") {
            for key in ["forwarding", "peering", "private"] {
                if let Some(zone_type) = config.get_mut(key) {
                    ctx.resolve_list(zone_type, "client_networks", "network");
                }
            }
            if let Some(peering) = config.get_mut("peering") {
                ctx.resolve_field(peering, "peer_network", "network");
            }
        }
        ctx.fabric_iam(zone);
    })
}

/// DNS response policies, `networks` maps a key to the network the policy is attached to
pub fn dns_policies(ctx: &mut StackContext, range: &str) -> BuildResult {
    fabric_items(ctx, range, "dnspo", "dns-response-policy", |ctx, policy| {
        if let Some(networks) = policy.get_mut("networks").and_then(Value::as_object_mut) {
            for network in networks.values_mut() {
                if let Some(name) = network.as_plain_string() {
                    *network = ctx.reference("network", &name);
                }
            }
        }
    })
}

/// Reserved addresses, grouped by address type and keyed by address name
pub fn addresses(ctx: &mut StackContext, range: &str) -> BuildResult {
    fabric_items(ctx, range, "addr", "net-address", |ctx, group| {
        for key in ADDRESS_MAPS {
            let Some(addresses) = group.get_mut(key).and_then(Value::as_object_mut) else {
                continue;
            };
            for address in addresses.values_mut() {
                ctx.resolve_field(address, "network", "network");
                ctx.resolve_field(address, "subnetwork", "subnet");
                ctx.resolve_field(address, "subnet_self_link", "subnet");
            }
        }
    })
}

/// Cloud NAT gateways with their own router
pub fn nats(ctx: &mut StackContext, range: &str) -> BuildResult {
    fabric_items(ctx, range, "nat", "net-cloudnat", |ctx, nat| {
        ctx.resolve_field(nat, "router_network", "network");
        let subnetworks = nat
            .get_mut("config_source_subnetworks")
            .and_then(|config| config.get_mut("subnetworks"))
            .and_then(Value::as_array_mut);
        for subnetwork in subnetworks.into_iter().flatten() {
            ctx.resolve_field(subnetwork, "self_link", "subnet");
        }
    })
}

#[cfg(test)]
mod test {
    use crate::config_document;
    use crate::registry::Bucket;
    use crate::resources::test::{build, field};
    use pretty_assertions::assert_eq;

    #[test]
    fn proxies_and_nats_use_networks_and_subnets() {
        let document = config_document! {r#"
        eztf:
          stacks:
            net:
              - nets: network
              - proxies: ff_swp
              - nats: ff_nat
        nets:
          - network_name: vpc1
            project_id: host
            subnets:
              - subnet_name: sub1
                subnet_region: europe-west1
              - subnet_name: psc
                subnet_region: europe-west1
        proxies:
          - name: egress
            project_id: host
            region: europe-west1
            network: vpc1
            subnetwork: europe-west1/sub1
            certificates: [projects/host/locations/europe-west1/certificates/swp]
            service_attachment:
              nat_subnets: [europe-west1/psc]
        nats:
          - name: egress
            project_id: host
            region: europe-west1
            router_network: vpc1
            config_source_subnetworks:
              all: false
              subnetworks:
                - self_link: europe-west1/sub1
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "swp_egress", "network"),
            "${module.nw_vpc1.network_self_link}"
        );
        assert_eq!(
            field(&backend, "swp_egress", "subnetwork"),
            r#"${module.nw_vpc1.subnets["europe-west1/sub1"].self_link}"#
        );
        assert_eq!(
            field(&backend, "swp_egress", "service_attachment"),
            r#"{"nat_subnets":["${module.nw_vpc1.subnets[\"europe-west1/psc\"].self_link}"]}"#
        );
        assert_eq!(
            field(&backend, "nat_egress", "router_network"),
            "${module.nw_vpc1.network_self_link}"
        );
        let nat = &backend.find("nat_egress").unwrap().construct;
        assert_eq!(
            nat.fields["config_source_subnetworks"].items("subnetworks")[0]
                .get("self_link")
                .map(ToString::to_string),
            Some(r#"${module.nw_vpc1.subnets["europe-west1/sub1"].self_link}"#.to_string())
        );
        assert!(stack
            .registry
            .contains(&Bucket::Fabric("swp".to_string()), "egress"));
        assert!(stack
            .registry
            .contains(&Bucket::Fabric("nat".to_string()), "egress"));
    }

    #[test]
    fn dns_zones_and_policies_attach_to_networks() {
        let document = config_document! {r#"
        eztf:
          stacks:
            dns:
              - nets: network
              - zones: ff_dns
              - policies: ff_dnspo
        nets:
          - network_name: vpc1
            project_id: host
          - network_name: hub
            project_id: host
        zones:
          - name: internal
            project_id: host
            zone_config:
              domain: internal.acme.com.
              private:
                client_networks: [vpc1, projects/other/global/networks/shared]
          - name: to-hub
            project_id: host
            zone_config:
              domain: acme.com.
              peering:
                client_networks: [vpc1]
                peer_network: hub
            iam:
              roles/dns.reader: [user:jane@acme.com]
        policies:
          - name: block
            project_id: host
            networks:
              vpc1: vpc1
        "#};

        let (_, backend) = build(&document);

        let private = &backend.find("dns_internal").unwrap().construct.fields["zone_config"];
        assert_eq!(
            private.get("private").unwrap().get("client_networks").unwrap().to_string(),
            r#"["${module.nw_vpc1.network_self_link}","projects/other/global/networks/shared"]"#
        );
        let peering = &backend.find("dns_to-hub").unwrap().construct.fields["zone_config"];
        assert_eq!(
            peering.get("peering").unwrap().get("peer_network").unwrap().to_string(),
            "${module.nw_hub.network_self_link}"
        );
        assert_eq!(
            field(&backend, "dnspo_block", "networks"),
            r#"{"vpc1":"${module.nw_vpc1.network_self_link}"}"#
        );
    }

    #[test]
    fn addresses_resolve_per_entry() {
        let document = config_document! {r#"
        eztf:
          stacks:
            net:
              - nets: network
              - addrs: ff_addr
        nets:
          - network_name: vpc1
            project_id: host
            subnets:
              - subnet_name: sub1
                subnet_region: europe-west1
        addrs:
          - name: app
            project_id: host
            internal_addresses:
              ilb:
                region: europe-west1
                subnetwork: europe-west1/sub1
            psa_addresses:
              services:
                address: 10.10.0.0
                network: vpc1
                prefix_length: 16
        "#};

        let (_, backend) = build(&document);

        let internal = &backend.find("addr_app").unwrap().construct.fields["internal_addresses"];
        assert_eq!(
            internal.get("ilb").unwrap().get("subnetwork").unwrap().to_string(),
            r#"${module.nw_vpc1.subnets["europe-west1/sub1"].self_link}"#
        );
        let psa = &backend.find("addr_app").unwrap().construct.fields["psa_addresses"];
        assert_eq!(
            psa.get("services").unwrap().get("network").unwrap().to_string(),
            "${module.nw_vpc1.network_self_link}"
        );
        assert_eq!(field(&backend, "addr_app", "project_id"), "host");
    }
}
