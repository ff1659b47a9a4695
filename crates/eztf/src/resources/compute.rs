//! instances, disks, templates, instance groups and GKE clusters
use super::{fabric_module, resolve_each, resolve_nested, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, StackContext};
use crate::value::Value;

const VM_MODULES: &str = "terraform-google-modules/vm/google//modules";
const VM_VERSION: &str = "~> 11.0";
const GKE_MODULE: &str = "terraform-google-modules/kubernetes-engine/google";
const GKE_VERSION: &str = "~> 33.0";

/// Variant of the kubernetes-engine module a cluster is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GkeFlavor {
    Standard,
    Private,
    Autopilot,
    AutopilotPrivate,
}

impl GkeFlavor {
    fn prefix(self) -> &'static str {
        match self {
            GkeFlavor::Standard => "gke",
            GkeFlavor::Private => "gke_pvt",
            GkeFlavor::Autopilot => "gke_ap",
            GkeFlavor::AutopilotPrivate => "gke_ap_pvt",
        }
    }

    fn source(self) -> String {
        match self {
            GkeFlavor::Standard => GKE_MODULE.to_string(),
            GkeFlavor::Private => format!("{GKE_MODULE}//modules/private-cluster"),
            GkeFlavor::Autopilot => format!("{GKE_MODULE}//modules/beta-autopilot-public-cluster"),
            GkeFlavor::AutopilotPrivate => {
                format!("{GKE_MODULE}//modules/beta-autopilot-private-cluster")
            }
        }
    }
}

fn vm_module(name: &str) -> String {
    format!("{VM_MODULES}/{name}")
}

/// `network`, `subnetwork` and `subnetwork_project` at the top level of a module item
fn resolve_network(ctx: &mut StackContext, item: &mut Value) {
    ctx.resolve_field(item, "network", "network");
    ctx.resolve_field(item, "subnetwork", "subnet");
    ctx.resolve_field(item, "subnetwork_project", "project");
}

pub fn instances(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut vm in ctx.items(range) {
        let name = required(&vm, range, "name")?;
        ctx.resolve_field(&mut vm, "project", "project");
        resolve_nested(ctx, &mut vm, "service_account", "email", "service_account");
        resolve_each(ctx, &mut vm, "attached_disk", "source", "disk");
        ctx.resolve_interfaces(&mut vm, "network_interface");

        let handle = ctx.construct(
            Construct::resource("google_compute_instance", &format!("vm_{name}"))
                .fields(vm)
                .as_blocks(&[
                    "boot_disk",
                    "initialize_params",
                    "network_interface",
                    "access_config",
                    "alias_ip_range",
                    "ipv6_access_config",
                    "scratch_disk",
                    "attached_disk",
                    "guest_accelerator",
                    "service_account",
                    "scheduling",
                    "node_affinities",
                    "shielded_instance_config",
                    "confidential_instance_config",
                ]),
        );
        ctx.register(Bucket::Vm, name, handle)?;
    }
    Ok(())
}

/// Instances through the fabric `compute-vm` module
pub fn fabric_instances(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut vm in ctx.items(range) {
        let name = required(&vm, range, "name")?;
        ctx.resolve_field(&mut vm, "project_id", "project");
        resolve_nested(ctx, &mut vm, "service_account", "email", "service_account");
        resolve_each(ctx, &mut vm, "network_interfaces", "network", "network");
        resolve_each(ctx, &mut vm, "network_interfaces", "subnetwork", "subnet");
        ctx.fabric_iam(&mut vm);

        let handle = ctx.construct(
            Construct::module(&format!("vm_{name}"), &fabric_module("compute-vm"), None).fields(vm),
        );
        ctx.register(Bucket::Vm, name, handle)?;
    }
    Ok(())
}

pub fn disks(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut disk in ctx.items(range) {
        let name = required(&disk, range, "name")?;
        ctx.resolve_field(&mut disk, "project", "project");

        let handle = ctx.construct(
            Construct::resource("google_compute_disk", &format!("disk_{name}"))
                .fields(disk)
                .as_blocks(&["guest_os_features", "disk_encryption_key"]),
        );
        ctx.register(Bucket::Disk, name, handle)?;
    }
    Ok(())
}

/// Instance templates, registered by their name prefix
pub fn instance_templates(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut template in ctx.items(range) {
        let name = required(&template, range, "name_prefix")?;
        ctx.resolve_field(&mut template, "project_id", "project");
        resolve_nested(ctx, &mut template, "service_account", "email", "service_account");
        resolve_network(ctx, &mut template);

        let handle = ctx.construct(
            Construct::module(
                &format!("vm_tmpl_{name}"),
                &vm_module("instance_template"),
                Some(VM_VERSION),
            )
            .fields(template),
        );
        ctx.register(Bucket::VmTemplate, name, handle)?;
    }
    Ok(())
}

pub fn instances_from_template(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut instance in ctx.items(range) {
        let name = required(&instance, range, "hostname")?;
        required(&instance, range, "instance_template")?;
        ctx.resolve_field(&mut instance, "project_id", "project");
        resolve_network(ctx, &mut instance);
        ctx.resolve_field(&mut instance, "instance_template", "vm_template");

        let handle = ctx.construct(
            Construct::module(
                &format!("vmft_{name}"),
                &vm_module("compute_instance"),
                Some(VM_VERSION),
            )
            .fields(instance),
        );
        ctx.register(Bucket::VmFromTemplate, name, handle)?;
    }
    Ok(())
}

/// Managed instance groups
pub fn managed_groups(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut mig in ctx.items(range) {
        let name = required(&mig, range, "mig_name")?;
        required(&mig, range, "instance_template")?;
        ctx.resolve_field(&mut mig, "project_id", "project");
        ctx.resolve_field(&mut mig, "instance_template", "vm_template");

        let handle = ctx.construct(
            Construct::module(&format!("mig_{name}"), &vm_module("mig"), Some(VM_VERSION))
                .fields(mig),
        );
        ctx.register(Bucket::Mig, name, handle)?;
    }
    Ok(())
}

/// Unmanaged instance groups
pub fn unmanaged_groups(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut umig in ctx.items(range) {
        let name = required(&umig, range, "hostname")?;
        required(&umig, range, "instance_template")?;
        ctx.resolve_field(&mut umig, "project_id", "project");
        resolve_network(ctx, &mut umig);
        ctx.resolve_field(&mut umig, "instance_template", "vm_template");

        let handle = ctx.construct(
            Construct::module(&format!("umig_{name}"), &vm_module("umig"), Some(VM_VERSION))
                .fields(umig),
        );
        ctx.register(Bucket::Umig, name, handle)?;
    }
    Ok(())
}

/// Clusters, the network is passed by name rather than by link
pub fn clusters(ctx: &mut StackContext, range: &str, flavor: GkeFlavor) -> BuildResult {
    for mut cluster in ctx.items(range) {
        let name = required(&cluster, range, "name")?;
        let id = format!("{}_{name}", flavor.prefix());
        ctx.resolve_field(&mut cluster, "project_id", "project");
        ctx.resolve_field(&mut cluster, "network", "network_name");
        ctx.resolve_field(&mut cluster, "network_project_id", "project");

        let handle = ctx.construct(
            Construct::module(&id, &flavor.source(), Some(GKE_VERSION)).fields(cluster),
        );
        ctx.register(Bucket::Gke, id, handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::backend::Target;
    use crate::config_document;
    use crate::resources::test::{build, field};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn instances_resolve_disks_accounts_and_interfaces() {
        let document = config_document! {r#"
        eztf:
          stacks:
            compute:
              - nets: network
              - sas: service_account
              - disks: disk
              - vms: vm
        nets:
          - network_name: vpc1
            project_id: app
            subnets:
              - subnet_name: sub1
                subnet_region: europe-west1
                subnet_ip: 10.0.0.0/24
        sas:
          - account_id: runner
            project: app
        disks:
          - name: data
            project: app
            zone: europe-west1-b
            guest_os_features:
              - type: UEFI_COMPATIBLE
        vms:
          - name: web
            project: app
            machine_type: e2-small
            service_account:
              email: runner@app.iam.gserviceaccount.com
              scopes: [cloud-platform]
            attached_disk:
              - source: data
            network_interface:
              - network: vpc1
                subnetwork: europe-west1/sub1
        "#};

        let (_, backend) = build(&document);

        let vm = &backend.find("vm_web").unwrap().construct.fields;
        assert_eq!(
            vm["service_account"].get("email").map(ToString::to_string),
            Some("${google_service_account.sa_runner_app.email}".to_string())
        );
        assert_eq!(
            vm["attached_disk"].as_array().unwrap()[0]
                .get("source")
                .map(ToString::to_string),
            Some("${google_compute_disk.disk_data.self_link}".to_string())
        );
        let interface = &vm["network_interface"].as_array().unwrap()[0];
        assert_eq!(
            interface.get("network").map(ToString::to_string),
            Some("${module.nw_vpc1.network_self_link}".to_string())
        );
        assert_eq!(
            interface.get("subnetwork").map(ToString::to_string),
            Some(r#"${module.nw_vpc1.subnets["europe-west1/sub1"].self_link}"#.to_string())
        );
    }

    #[test]
    fn groups_and_instances_use_the_template() {
        let document = config_document! {r#"
        eztf:
          stacks:
            compute:
              - tmpls: vm_template
              - migs: mig
              - umigs: umig
              - hosts: vm_from_template
        tmpls:
          - name_prefix: web
            project_id: app
            network: vpc1
        migs:
          - mig_name: web
            project_id: app
            instance_template: web
        umigs:
          - hostname: legacy
            project_id: app
            instance_template: web
        hosts:
          - hostname: bastion
            instance_template: web
            subnetwork: p1/europe-west1/sub1
        "#};

        let (stack, backend) = build(&document);

        let template = "${module.vm_tmpl_web.self_link_unique}";
        assert_eq!(field(&backend, "mig_web", "instance_template"), template);
        assert_eq!(field(&backend, "umig_legacy", "instance_template"), template);
        assert_eq!(field(&backend, "vmft_bastion", "instance_template"), template);
        assert_eq!(
            backend.find("vmft_bastion").unwrap().construct.fields["subnetwork"],
            Value::from("projects/p1/regions/europe-west1/subnetworks/sub1")
        );
        assert!(stack
            .registry
            .contains(&crate::registry::Bucket::VmTemplate, "web"));
    }

    #[test]
    fn cluster_ids_follow_the_flavor() {
        let document = config_document! {r#"
        eztf:
          stacks:
            gke:
              - nets: network
              - std: gke
              - ap: gke_autopilot_private
        nets:
          - network_name: vpc1
            project_id: app
        std:
          - name: one
            project_id: app
            network: vpc1
        ap:
          - name: two
            project_id: app
            network: vpc1
            network_project_id: host
        "#};

        let (_, backend) = build(&document);

        assert_eq!(
            field(&backend, "gke_one", "network"),
            "${module.nw_vpc1.network_name}"
        );
        assert_eq!(field(&backend, "gke_ap_pvt_two", "network_project_id"), "host");
        let Target::Module { source, .. } = &backend.find("gke_ap_pvt_two").unwrap().construct.target
        else {
            panic!("cluster is not a module");
        };
        assert_eq!(
            source,
            "terraform-google-modules/kubernetes-engine/google//modules/beta-autopilot-private-cluster"
        );
    }

    #[test]
    fn fabric_instances_in_subnets() {
        let document = config_document! {r#"
        eztf:
          stacks:
            app:
              - nets: network
              - sas: service_account
              - vms: ff_vm
        nets:
          - network_name: vpc1
            project_id: app
            subnets:
              - subnet_name: sub1
                subnet_region: europe-west1
        sas:
          - account_id: vm
            project: app
        vms:
          - name: bastion
            project_id: app
            zone: europe-west1-b
            network_interfaces:
              - network: vpc1
                subnetwork: europe-west1/sub1
            service_account:
              email: vm@app.iam.gserviceaccount.com
            iam:
              roles/compute.osLogin: [group:ops@acme.com]
        "#};

        let (_, backend) = build(&document);

        let vm = &backend.find("vm_bastion").unwrap().construct;
        assert!(matches!(vm.target, Target::Module { .. }));
        let interface = &vm.fields["network_interfaces"].as_array().unwrap()[0];
        assert_eq!(
            interface.get("network").map(ToString::to_string),
            Some("${module.nw_vpc1.network_self_link}".to_string())
        );
        assert_eq!(
            interface.get("subnetwork").map(ToString::to_string),
            Some(r#"${module.nw_vpc1.subnets["europe-west1/sub1"].self_link}"#.to_string())
        );
        assert_eq!(
            field(&backend, "vm_bastion", "service_account"),
            r#"{"email":"${google_service_account.sa_vm_app.email}"}"#
        );
    }
}
