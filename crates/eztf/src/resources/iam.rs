//! IAM role grants on organization, folders and projects
//!
//! The range maps a hierarchy node to principals and their roles:
//!
//! ```yaml
//! iam:
//!   /: { "group:admins@acme.com": [roles/resourcemanager.organizationAdmin] }
//!   /prod: { "group:ops@acme.com": [roles/viewer] }
//!   app-project: { "serviceAccount:ci@tooling.iam.gserviceaccount.com": [roles/editor] }
//! ```
//!
//! Each principal of a node becomes one `*_iam_member` resource iterating over its roles. Grants are registered under
//! their address only so that granting the same principal on the same node twice in a stack is rejected.
use super::BuildResult;
use crate::address::Address;
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::resolve::{which_node, NodeKind};
use crate::stack::{BuildError, StackContext};
use crate::util::{clean_principal_id, clean_tf_folder};
use crate::value::Value;
use indexmap::IndexMap;

pub fn iam(ctx: &mut StackContext, range: &str) -> BuildResult {
    let Some(nodes) = ctx.range_value(range) else {
        return Ok(());
    };
    let Value::Object(nodes) = nodes else {
        return Err(invalid(range, range, "must map nodes to principals"));
    };

    for (node, principals) in nodes {
        let Value::Object(principals) = principals else {
            return Err(invalid(range, &node, "must map principals to roles"));
        };
        for (principal, roles) in principals {
            grant(ctx, &node, &principal, &roles)?;
        }
    }
    Ok(())
}

fn invalid(range: &str, key: &str, problem: &str) -> BuildError {
    BuildError::InvalidField {
        range: range.to_string(),
        key: key.to_string(),
        problem: problem.to_string(),
    }
}

/// `for_each` over roles, keyed by the role itself
fn role_set(roles: &Value) -> Value {
    let roles: IndexMap<String, Value> = match roles {
        Value::Array(roles) => roles
            .iter()
            .filter_map(Value::as_plain_string)
            .map(|role| (role.clone(), Value::from(role)))
            .collect(),
        other => other
            .as_plain_string()
            .map(|role| (role.clone(), Value::from(role)))
            .into_iter()
            .collect(),
    };
    Value::Object(roles)
}

fn grant(ctx: &mut StackContext, node: &str, principal: &str, roles: &Value) -> BuildResult {
    let principal_id = clean_principal_id(principal);
    let member = ctx.principal(principal);

    let construct = match which_node(node) {
        NodeKind::Project => {
            let project = ctx.reference("project", node);
            Construct::resource(
                "google_project_iam_member",
                &format!("prj_iam_{node}_{principal_id}"),
            )
            .field("project", project)
        }
        NodeKind::Folder => {
            let folder = ctx.reference("folder", node);
            Construct::resource(
                "google_folder_iam_member",
                &format!("fldr_iam_{}_{principal_id}", clean_tf_folder(node)),
            )
            .field("folder", folder)
        }
        NodeKind::Organization => {
            let org_id = ctx.reference("organization", "/");
            Construct::resource(
                "google_organization_iam_member",
                &format!("org_iam_{principal_id}"),
            )
            .field("org_id", org_id)
        }
    };

    let handle = ctx.construct(
        construct
            .field("for_each", role_set(roles))
            .field("role", Address::each_value())
            .field("member", member),
    );
    ctx.register(Bucket::Iam, handle.address().to_string(), handle)
}
