//! folders, projects and the organization
use super::{fabric_iam_with_tags, fabric_module, organization, parent, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::resolve::{which_node, NodeKind};
use crate::stack::{required, BuildError, StackContext};
use crate::util::clean_tf_folder;
use crate::value::Value;
use std::collections::VecDeque;

const PROJECT_FACTORY: &str = "terraform-google-modules/project-factory/google";
const PROJECT_SERVICES: &str = "terraform-google-modules/project-factory/google//modules/project_services";
const PROJECT_FACTORY_VERSION: &str = "~> 17.0";
const SERVICE_PROJECTS_SECTION: &str = "svcprojects";

/// A folder found while walking the folder tree
#[derive(Debug, Clone, PartialEq, Eq)]
struct FolderPath {
    parent: String,
    path: String,
    name: String,
}

/// Walk a folder tree breadth first
///
/// Paths are slash joined names starting at the organization, `{a: {b: {}}}` yields `/a` and `/a/b`. A key of the
/// form `folders/<id>` is an existing folder: it is not created, its children use it as parent.
fn folder_paths(tree: &Value) -> Vec<FolderPath> {
    let mut folders = vec![];
    let mut queue = VecDeque::from([(String::new(), tree)]);
    while let Some((path, node)) = queue.pop_front() {
        let Some(children) = node.as_object() else {
            continue;
        };
        for (name, sub_folders) in children {
            let child_path = if name.starts_with("folders/") {
                name.clone()
            } else {
                let child_path = format!("{path}/{name}");
                folders.push(FolderPath {
                    parent: path.clone(),
                    path: child_path.clone(),
                    name: name.clone(),
                });
                child_path
            };
            queue.push_back((child_path, sub_folders));
        }
    }
    folders
}

pub fn folders(ctx: &mut StackContext, range: &str) -> BuildResult {
    let Some(tree) = ctx.range_value(range) else {
        return Ok(());
    };
    if !matches!(tree, Value::Object(_) | Value::Null) {
        return Err(BuildError::InvalidField {
            range: range.to_string(),
            key: range.to_string(),
            problem: "must be a mapping of folder names".to_string(),
        });
    }

    for folder in folder_paths(&tree) {
        let parent = match which_node(&folder.parent) {
            NodeKind::Folder => ctx.reference("folder", &folder.parent),
            _ => organization(ctx),
        };
        let handle = ctx.construct(
            Construct::resource(
                "google_folder",
                &format!("fldr_{}", clean_tf_folder(&folder.path)),
            )
            .field("display_name", folder.name)
            .field("parent", parent),
        );
        ctx.register(Bucket::Folders, folder.path, handle)?;
    }
    Ok(())
}

pub fn fabric_folders(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut folder in ctx.items(range) {
        let node = folder.get_str("parent").unwrap_or_default();
        let name = match folder.get_str("name") {
            Some(name) => name,
            None => required(&folder, range, "id")?,
        };
        let resolved = parent(ctx, &node);
        folder.insert("parent", resolved);
        ctx.fabric_iam(&mut folder);

        ctx.construct(
            Construct::module(
                &format!("fldr_{}", clean_tf_folder(&format!("{node}/{name}"))),
                &fabric_module("folder"),
                None,
            )
            .fields(folder),
        );
    }
    Ok(())
}

/// Projects through the project factory
///
/// Shared VPC service projects are built after every host project, in their own section.
pub fn projects(ctx: &mut StackContext, range: &str) -> BuildResult {
    let (service_projects, hosts): (Vec<_>, Vec<_>) = ctx
        .items(range)
        .into_iter()
        .partition(|project| project.has("svpc_host_project_id"));

    for project in hosts {
        build_project(ctx, range, project)?;
    }
    if !service_projects.is_empty() {
        ctx.section(SERVICE_PROJECTS_SECTION, true);
    }
    for project in service_projects {
        build_project(ctx, range, project)?;
    }
    Ok(())
}

fn build_project(ctx: &mut StackContext, range: &str, mut project: Value) -> BuildResult {
    let name = required(&project, range, "name")?;

    let org_id = ctx.reference("organization", "/");
    project.insert("org_id", org_id);
    let billing = project.get_str("billing_account").unwrap_or_default();
    let billing = ctx.reference("billing", &billing);
    project.insert("billing_account", billing);
    let suffix = ctx.variable("project_suffix");
    project.insert("name", Value::template([Value::from(name.as_str()), suffix]));

    if let Some(folder) = project.get_str("folder_id") {
        if which_node(&folder) == NodeKind::Folder {
            let folder = ctx.reference("folder", &folder);
            project.insert("folder_id", folder);
        }
    }
    ctx.resolve_field(&mut project, "svpc_host_project_id", "project");
    if let Some(group) = project.get_str("group_name") {
        let domain = project.get_str("domain").unwrap_or_default();
        let group_name = ctx.reference_or("group_name", &format!("{group}@{domain}"), group);
        project.insert("group_name", group_name);
    }
    ctx.resolve_list(&mut project, "shared_vpc_subnets", "subnet");

    let handle = ctx.construct(
        Construct::module(
            &format!("prj_{name}"),
            PROJECT_FACTORY,
            Some(PROJECT_FACTORY_VERSION),
        )
        .fields(project),
    );
    ctx.register(Bucket::Projects, name, handle)
}

pub fn fabric_projects(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut project in ctx.items(range) {
        let name = required(&project, range, "name")?;
        let id = format!("{}{name}", project.get_str("prefix").unwrap_or_default());

        let billing = project.get_str("billing_account").unwrap_or_default();
        let billing = ctx.reference("billing", &billing);
        project.insert("billing_account", billing);
        if let Some(node) = project.get_str("parent") {
            let resolved = parent(ctx, &node);
            project.insert("parent", resolved);
        }

        if let Some(host) = project.get_mut("shared_vpc_host_config") {
            if host.get("enabled") == Some(&Value::Boolean(true)) {
                ctx.resolve_list(host, "service_projects", "project");
            }
        }
        fabric_iam_with_tags(ctx, &mut project, &["tags", "network_tags"]);
        ctx.resolve_list(&mut project, "shared_vpc_subnets", "subnet");

        let handle = ctx.construct(
            Construct::module(&format!("prj_{id}"), &fabric_module("project"), None).fields(project),
        );
        ctx.register(Bucket::Projects, id, handle)?;
    }
    Ok(())
}

pub fn fabric_organizations(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut org in ctx.items(range) {
        let id = org
            .get_str("organization_id")
            .unwrap_or_else(|| "org".to_string());
        let organization_id = organization(ctx);
        org.insert("organization_id", organization_id);
        fabric_iam_with_tags(ctx, &mut org, &["tags"]);

        let handle = ctx.construct(
            Construct::module(&format!("org_{id}"), &fabric_module("organization"), None)
                .fields(org),
        );
        ctx.register(Bucket::FabricOrganization, id, handle)?;
    }
    Ok(())
}

/// Enabled APIs of a project
pub fn project_services(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut services in ctx.items(range) {
        let project = required(&services, range, "project_id")?;
        ctx.resolve_field(&mut services, "project_id", "project");

        let handle = ctx.construct(
            Construct::module(
                &format!("api_prj_{project}"),
                PROJECT_SERVICES,
                Some(PROJECT_FACTORY_VERSION),
            )
            .fields(services),
        );
        ctx.register(Bucket::ProjectApi, project, handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config_document;
    use crate::resources::test::{build, field};
    use pretty_assertions::assert_eq;

    #[test]
    fn folder_tree_is_walked_breadth_first() {
        let tree: Value = serde_yaml::from_str(
            r#"
            a:
              b:
                c: {}
            d:
            folders/42:
              e: {}
            "#,
        )
        .unwrap();

        let paths: Vec<_> = folder_paths(&tree)
            .into_iter()
            .map(|folder| (folder.parent, folder.path))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("".to_string(), "/a".to_string()),
                ("".to_string(), "/d".to_string()),
                ("/a".to_string(), "/a/b".to_string()),
                ("folders/42".to_string(), "folders/42/e".to_string()),
                ("/a/b".to_string(), "/a/b/c".to_string()),
            ]
        );
    }

    #[test]
    fn folders_reference_their_parents() {
        let document = config_document! {r#"
        eztf:
          stacks:
            org:
              - fldrs: folders
        fldrs:
          a:
            b: {}
          folders/42:
            e: {}
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "fldr_a", "parent"),
            "organizations/${var.organization_id}"
        );
        assert_eq!(
            field(&backend, "fldr_a__b", "parent"),
            "${google_folder.fldr_a.name}"
        );
        assert_eq!(field(&backend, "fldr_a__b", "display_name"), "b");
        assert_eq!(
            field(&backend, "fldr_folders__42__e", "parent"),
            "folders/42"
        );
        let registered: Vec<_> = stack.registry.keys(&Bucket::Folders).cloned().collect();
        assert_eq!(registered, vec!["/a", "/a/b", "folders/42/e"]);
    }

    #[test]
    fn service_projects_follow_their_hosts() {
        let document = config_document! {r#"
        variable:
          billing_id: 0000-1111
        eztf:
          stacks:
            org:
              - fldrs: folders
              - prjs: projects
        fldrs:
          prod: {}
        prjs:
          - name: app
            svpc_host_project_id: host
            folder_id: /prod
          - name: host
            billing_account: 2222-3333
            group_name: admins
            domain: acme.com
        "#};

        let (stack, backend) = build(&document);

        let host = backend.find("prj_host").unwrap();
        let app = backend.find("prj_app").unwrap();
        assert_eq!(host.section, "prjs");
        assert_eq!(app.section, "svcprojects");
        assert!(backend.position("prj_host") < backend.position("prj_app"));

        assert_eq!(
            field(&backend, "prj_app", "svpc_host_project_id"),
            "${module.prj_host.project_id}"
        );
        assert_eq!(
            field(&backend, "prj_app", "folder_id"),
            "${google_folder.fldr_prod.name}"
        );
        assert_eq!(
            field(&backend, "prj_app", "billing_account"),
            "${var.billing_id}"
        );
        assert_eq!(field(&backend, "prj_host", "billing_account"), "2222-3333");
        assert_eq!(field(&backend, "prj_host", "group_name"), "admins");
        assert_eq!(
            field(&backend, "prj_host", "name"),
            "host${var.project_suffix}"
        );
        assert_eq!(stack.tf_vars()["billing_id"], Value::from("0000-1111"));
        assert_eq!(stack.tf_vars()["project_suffix"], Value::from(""));
    }

    #[test]
    fn fabric_projects_resolve_parents_and_service_projects() {
        let document = config_document! {r#"
        eztf:
          stacks:
            org:
              - fldrs: folders
              - prjs: ff_projects
        fldrs:
          prod: {}
        prjs:
          - name: app
            prefix: acme-
          - name: net
            prefix: acme-
            parent: /prod
            shared_vpc_host_config:
              enabled: true
              service_projects: [acme-app]
        "#};

        let (stack, backend) = build(&document);

        assert!(stack.registry.contains(&Bucket::Projects, "acme-net"));
        assert_eq!(
            field(&backend, "prj_acme-net", "parent"),
            "${google_folder.fldr_prod.name}"
        );
        let host = &backend.find("prj_acme-net").unwrap().construct.fields["shared_vpc_host_config"];
        assert_eq!(
            host.items("service_projects")[0].to_string(),
            "${module.prj_acme-app.project_id}"
        );
    }
}
