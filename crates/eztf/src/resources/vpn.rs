//! classic and HA VPN gateways
use super::{fabric_module, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, StackContext};
use crate::value::Value;

const VPN_MODULE: &str = "terraform-google-modules/vpn/google";
const VPN_HA_MODULE: &str = "terraform-google-modules/vpn/google//modules/vpn_ha";
const VPN_VERSION: &str = "~> 4.0";

pub fn vpns(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut vpn in ctx.items(range) {
        let name = required(&vpn, range, "gateway_name")?;
        ctx.resolve_field(&mut vpn, "network", "network");
        ctx.resolve_field(&mut vpn, "project_id", "project");

        let handle = ctx.construct(
            Construct::module(&format!("vpn_{name}"), VPN_MODULE, Some(VPN_VERSION)).fields(vpn),
        );
        ctx.register(Bucket::Vpn, name, handle)?;
    }
    Ok(())
}

/// External peer gateways, either a range of their own or the `external_vpn_gateway_<range>` range of HA VPNs
pub fn external_vpn_gateways(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut gateway in ctx.items(range) {
        let name = required(&gateway, range, "name")?;
        ctx.resolve_field(&mut gateway, "project", "project");

        let handle = ctx.construct(
            Construct::resource(
                "google_compute_external_vpn_gateway",
                &format!("ext_vpn_gtw_{name}"),
            )
            .fields(gateway)
            .as_blocks(&["interface"]),
        );
        ctx.register(Bucket::ExternalVpnGateway, name, handle)?;
    }
    Ok(())
}

/// HA VPN gateways and their external peers
///
/// Gateways of one range may peer with each other, names are known from the prepass.
pub fn vpn_ha(ctx: &mut StackContext, range: &str) -> BuildResult {
    external_vpn_gateways(ctx, &format!("external_vpn_gateway_{range}"))?;

    for mut vpn in ctx.items(range) {
        let name = required(&vpn, range, "name")?;
        ctx.resolve_field(&mut vpn, "network", "network");
        ctx.resolve_field(&mut vpn, "project_id", "project");
        ctx.resolve_field(&mut vpn, "peer_gcp_gateway", "vpn_ha");

        if !vpn.has("peer_external_gateway") {
            if let Some(tunnels) = vpn.get_mut("tunnels").and_then(Value::as_object_mut) {
                for tunnel in tunnels.values_mut() {
                    ctx.resolve_field(
                        tunnel,
                        "peer_external_gateway_self_link",
                        "external_vpn_gateway",
                    );
                }
            }
        }

        let handle = ctx.construct(
            Construct::module(&format!("vpn_ha_{name}"), VPN_HA_MODULE, Some(VPN_VERSION))
                .fields(vpn),
        );
        ctx.register(Bucket::VpnHa, name, handle)?;
    }
    Ok(())
}

/// HA VPN gateways through the fabric `net-vpn-ha` module
///
/// `peer_gateways.<name>.gcp` names another HA gateway, fabric and module ones share the same names.
pub fn fabric_vpn_ha(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut vpn in ctx.items(range) {
        let name = required(&vpn, range, "name")?;
        ctx.resolve_field(&mut vpn, "project_id", "project");
        ctx.resolve_field(&mut vpn, "network", "network");
        if let Some(peers) = vpn.get_mut("peer_gateways").and_then(Value::as_object_mut) {
            for peer in peers.values_mut() {
                ctx.resolve_field(peer, "gcp", "vpn_ha");
            }
        }

        let handle = ctx.construct(
            Construct::module(&format!("vpn_ha_{name}"), &fabric_module("net-vpn-ha"), None)
                .fields(vpn),
        );
        ctx.register(Bucket::VpnHa, name, handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::config_document;
    use crate::registry::Bucket;
    use crate::resources::test::{build, field};
    use pretty_assertions::assert_eq;

    #[test]
    fn gateways_peer_forward() {
        let document = config_document! {r#"
        eztf:
          stacks:
            net:
              - nets: network
              - gws: vpn_ha
        nets:
          - network_name: vpc1
            project_id: host
          - network_name: vpc2
            project_id: host
        external_vpn_gateway_gws:
          - name: onprem
            project: host
            redundancy_type: SINGLE_IP_INTERNALLY_REDUNDANT
            interface:
              - id: 0
                ip_address: 8.8.8.8
        gws:
          - name: ha1
            network: vpc1
            peer_gcp_gateway: ha2
          - name: ha2
            network: vpc2
            peer_gcp_gateway: ha1
          - name: ha3
            network: vpc2
            tunnels:
              remote-0:
                peer_external_gateway_self_link: onprem
        "#};

        let (_, backend) = build(&document);

        assert_eq!(
            field(&backend, "vpn_ha_ha1", "peer_gcp_gateway"),
            "${module.vpn_ha_ha2.self_link}"
        );
        assert_eq!(
            field(&backend, "vpn_ha_ha2", "peer_gcp_gateway"),
            "${module.vpn_ha_ha1.self_link}"
        );
        assert_eq!(
            field(&backend, "vpn_ha_ha1", "network"),
            "${module.nw_vpc1.network_self_link}"
        );
        let tunnels = &backend.find("vpn_ha_ha3").unwrap().construct.fields["tunnels"];
        assert_eq!(
            tunnels
                .get("remote-0")
                .and_then(|tunnel| tunnel.get("peer_external_gateway_self_link"))
                .map(ToString::to_string),
            Some("${google_compute_external_vpn_gateway.ext_vpn_gtw_onprem.self_link}".to_string())
        );
        assert!(backend.position("ext_vpn_gtw_onprem") < backend.position("vpn_ha_ha1"));
    }

    #[test]
    fn standalone_external_gateways() {
        let document = config_document! {r#"
        eztf:
          stacks:
            net:
              - prjs: projects
              - peers: external_vpn_gateway
              - gws: vpn_ha
        prjs:
          - name: host
        peers:
          - name: onprem
            project: host
            redundancy_type: TWO_IPS_REDUNDANCY
            interface:
              - id: 0
                ip_address: 8.8.8.8
              - id: 1
                ip_address: 8.8.4.4
        gws:
          - name: ha1
            network: vpc1
            tunnels:
              remote-0:
                peer_external_gateway_self_link: onprem
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "ext_vpn_gtw_onprem", "project"),
            "${module.prj_host.project_id}"
        );
        assert_eq!(
            backend.find("ext_vpn_gtw_onprem").unwrap().construct.block_keys,
            vec!["interface".to_string()]
        );
        assert!(stack.registry.contains(&Bucket::ExternalVpnGateway, "onprem"));

        let tunnels = &backend.find("vpn_ha_ha1").unwrap().construct.fields["tunnels"];
        assert_eq!(
            tunnels
                .get("remote-0")
                .and_then(|tunnel| tunnel.get("peer_external_gateway_self_link"))
                .map(ToString::to_string),
            Some("${google_compute_external_vpn_gateway.ext_vpn_gtw_onprem.self_link}".to_string())
        );
    }

    #[test]
    fn fabric_gateways_peer_forward() {
        let document = config_document! {r#"
        eztf:
          stacks:
            net:
              - nets: network
              - gws: ff_vpn_ha
        nets:
          - network_name: hub
            project_id: host
          - network_name: spoke
            project_id: host
        gws:
          - name: hub
            project_id: host
            region: europe-west1
            network: hub
            peer_gateways:
              default:
                gcp: spoke
          - name: spoke
            project_id: host
            region: europe-west1
            network: spoke
            peer_gateways:
              default:
                gcp: hub
              onprem:
                external:
                  redundancy_type: SINGLE_IP_INTERNALLY_REDUNDANT
                  interfaces: [8.8.8.8]
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "vpn_ha_hub", "network"),
            "${module.nw_hub.network_self_link}"
        );
        assert_eq!(
            field(&backend, "vpn_ha_hub", "peer_gateways"),
            r#"{"default":{"gcp":"${module.vpn_ha_spoke.self_link}"}}"#
        );
        let peers = &backend.find("vpn_ha_spoke").unwrap().construct.fields["peer_gateways"];
        assert_eq!(
            peers.get("default").unwrap().get("gcp").unwrap().to_string(),
            "${module.vpn_ha_hub.self_link}"
        );
        assert!(peers.get("onprem").unwrap().has("external"));
        assert!(stack.registry.contains(&Bucket::VpnHa, "spoke"));
    }
}
