//! organization policies and VPC service controls
use super::{organization, BuildResult};
use crate::backend::{Construct, NestedBlock};
use crate::registry::Bucket;
use crate::stack::{required, StackContext};
use crate::util::clean_tf_folder;
use crate::value::Value;
use indexmap::IndexMap;

const ORG_POLICY_MODULE: &str = "terraform-google-modules/org-policy/google//modules/org_policy_v2";
const ORG_POLICY_VERSION: &str = "~> 5.3";
const VPC_SC: &str = "terraform-google-modules/vpc-service-controls/google";
const VPC_SC_VERSION: &str = "~> 6.0";

/// Constraint whose allowed domains always include the organization's own customer id
const ALLOWED_MEMBER_DOMAINS: &str = "iam.allowedPolicyMemberDomains";
const WAIT_FOR_MEMBERS: &str = "wait_for_members";

fn vpc_sc_module(name: &str) -> String {
    format!("{VPC_SC}//modules/{name}")
}

pub fn org_policies(ctx: &mut StackContext, range: &str) -> BuildResult {
    let org = ctx.ensure_org_data()?;
    for mut policy in ctx.items(range) {
        let constraint = required(&policy, range, "constraint")?;
        if constraint == ALLOWED_MEMBER_DOMAINS {
            allow_own_domain(ctx, &mut policy, org.output("directory_customer_id"));
        }
        build_org_policy(ctx, range, policy)?;
    }
    Ok(())
}

/// Append the organization's customer id to the allowed domains of the first rule
fn allow_own_domain(ctx: &mut StackContext, policy: &mut Value, customer_id: Value) {
    let Some(rule) = policy
        .get_mut("rules")
        .and_then(Value::as_array_mut)
        .and_then(|rules| rules.first_mut())
    else {
        return;
    };

    let mut allow = rule.items("allow").to_vec();
    allow.push(customer_id);
    let local = ctx.construct(Construct::local("org_allow_member_domain", allow));
    rule.insert("allow", local.value());
}

fn build_org_policy(ctx: &mut StackContext, range: &str, mut policy: Value) -> BuildResult {
    let constraint = required(&policy, range, "constraint")?;
    let root = required(&policy, range, "policy_root")?;
    let root_id = policy
        .get_str("policy_root_id")
        .unwrap_or_else(|| "org".to_string());

    let resolved_root = ctx.reference(&root, &root_id);
    policy.insert("policy_root_id", resolved_root);
    ctx.resolve_field(&mut policy, "constraint", "custom_org_policy");

    let id = format!(
        "org_policy_{constraint}_{root}_{}",
        clean_tf_folder(&root_id)
    );
    let handle = ctx.construct(
        Construct::module(&id, ORG_POLICY_MODULE, Some(ORG_POLICY_VERSION)).fields(policy),
    );
    ctx.register(Bucket::OrgPolicy, id, handle)
}

/// Custom constraints, each enforced right away at its policy root
pub fn custom_org_policies(ctx: &mut StackContext, range: &str) -> BuildResult {
    ctx.ensure_org_data()?;
    for mut custom in ctx.items(range) {
        let name = required(&custom, range, "name")?;
        let root = required(&custom, range, "policy_root")?;
        let root_id = custom
            .remove("policy_root_id")
            .unwrap_or_else(|| Value::from("org"));
        custom.remove("policy_root");

        let parent = organization(ctx);
        custom.insert("parent", parent);
        let handle = ctx.construct(
            Construct::resource(
                "google_org_policy_custom_constraint",
                &format!("c_org_policy_{name}"),
            )
            .fields(custom),
        );
        ctx.register(Bucket::CustomOrgPolicy, name.as_str(), handle)?;

        let mut rule = Value::object();
        rule.insert("enforcement", true);
        rule.insert("allow", Vec::<Value>::new());
        rule.insert("deny", Vec::<Value>::new());
        rule.insert("conditions", Vec::<Value>::new());
        let mut policy = Value::object();
        policy.insert("constraint", name);
        policy.insert("policy_type", "boolean");
        policy.insert("policy_root", root);
        policy.insert("policy_root_id", root_id);
        policy.insert("rules", vec![rule]);
        build_org_policy(ctx, range, policy)?;
    }
    Ok(())
}

/// Access policies, scoped to projects or folders
pub fn access_policies(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut policy in ctx.items(range) {
        let title = required(&policy, range, "title")?;
        let parent = organization(ctx);
        policy.insert("parent", parent);

        let scopes: Vec<Value> = policy
            .strings("scopes")
            .iter()
            .map(|scope| {
                let number = ctx.reference("projects/number", scope);
                if number.as_str() == Some(scope.as_str()) {
                    ctx.reference("folder", scope)
                } else {
                    number
                }
            })
            .collect();
        if !scopes.is_empty() {
            policy.insert("scopes", scopes);
        }

        let handle = ctx.construct(
            Construct::resource(
                "google_access_context_manager_access_policy",
                &format!("sc_policy_{title}"),
            )
            .fields(policy),
        );
        ctx.register(Bucket::ScPolicy, title, handle)?;
    }
    Ok(())
}

/// Access levels, followed by a delay for their members to propagate
pub fn access_levels(ctx: &mut StackContext, range: &str) -> BuildResult {
    let mut levels = vec![];
    for mut level in ctx.items(range) {
        let name = required(&level, range, "name")?;
        ctx.resolve_field(&mut level, "policy", "sc_policy");

        let handle = ctx.construct(
            Construct::module(
                &format!("sc_access_level_{name}"),
                &vpc_sc_module("access_level"),
                Some(VPC_SC_VERSION),
            )
            .fields(level),
        );
        levels.push(handle.value());
        ctx.register(Bucket::ScAccessLevel, name, handle)?;
    }

    ctx.construct(Construct::provider("null"));
    let mut provisioner = IndexMap::new();
    provisioner.insert("command".to_string(), Value::from("sleep 60"));
    let wait = ctx.construct(
        Construct::resource("null_resource", WAIT_FOR_MEMBERS)
            .field("depends_on", levels)
            .with_block(NestedBlock::new(
                "provisioner".to_string(),
                vec!["local-exec".to_string()],
                provisioner,
            )),
    );
    ctx.register(Bucket::Null, WAIT_FOR_MEMBERS, wait)
}

/// `regular perimeter <name>`, tied to the access level delay when there is one
fn perimeter_description(ctx: &StackContext, name: &str) -> Value {
    let description = format!("regular perimeter {name}");
    match ctx.registry.lookup(&Bucket::Null, WAIT_FOR_MEMBERS) {
        Some(wait) => Value::template([Value::from(format!("{description} ")), wait.output("id")]),
        None => Value::from(description),
    }
}

fn resolve_path(ctx: &mut StackContext, value: &mut Value, path: &[&str], kind: &str) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = value;
    for key in parents {
        match current.get_mut(key) {
            Some(next) => current = next,
            None => return,
        }
    }
    ctx.resolve_list(current, last, kind);
}

pub fn perimeters(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut perimeter in ctx.items(range) {
        let name = required(&perimeter, range, "perimeter_name")?;
        ctx.resolve_field(&mut perimeter, "policy", "sc_policy");
        let description = perimeter_description(ctx, &name);
        perimeter.insert("description", description);
        ctx.resolve_list(&mut perimeter, "access_levels", "sc_access_level_name");

        for key in ["ingress_policies", "egress_policies"] {
            let Some(policies) = perimeter.get_mut(key).and_then(Value::as_array_mut) else {
                continue;
            };
            for policy in policies {
                if key == "ingress_policies" {
                    resolve_path(ctx, policy, &["from", "sources", "resources"], "projects/number");
                    resolve_path(
                        ctx,
                        policy,
                        &["from", "sources", "access_levels"],
                        "sc_access_level_name",
                    );
                }
                resolve_path(ctx, policy, &["to", "resources"], "projects/number");
            }
        }

        let handle = ctx.construct(
            Construct::module(
                &format!("sc_perimeter_{name}"),
                &vpc_sc_module("regular_service_perimeter"),
                Some(VPC_SC_VERSION),
            )
            .fields(perimeter),
        );
        ctx.register(Bucket::ScPerimeter, name, handle)?;
    }
    Ok(())
}

pub fn perimeter_bridges(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut bridge in ctx.items(range) {
        let name = required(&bridge, range, "perimeter_name")?;
        let description = perimeter_description(ctx, &name);
        bridge.insert("description", description);
        ctx.resolve_field(&mut bridge, "policy", "sc_policy");

        let handle = ctx.construct(
            Construct::module(
                &format!("sc_bridge_{name}"),
                &vpc_sc_module("bridge_service_perimeter"),
                Some(VPC_SC_VERSION),
            )
            .fields(bridge),
        );
        ctx.register(Bucket::ScPerimeter, format!("bridge/{name}"), handle)?;
    }
    Ok(())
}
