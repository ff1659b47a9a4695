//! users, groups, service accounts and identity pools
use super::{fabric_module, organization, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, StackContext};
use crate::value::Value;
use indexmap::IndexSet;

const GROUP_MODULE: &str = "terraform-google-modules/group/google";
const GROUP_VERSION: &str = "~> 0.7";

const ACCESS_TOKEN_SCOPES: &[&str] = &[
    "userinfo-email",
    "cloud-platform",
    "https://www.googleapis.com/auth/admin.directory.user",
];

/// Fabric service account role maps and the kind their keys resolve with
const SERVICE_ACCOUNT_ROLE_MAPS: &[(&str, &str)] = &[
    ("iam_billing_roles", "billing"),
    ("iam_folder_roles", "folder"),
    ("iam_organization_roles", "organization"),
    ("iam_project_roles", "project"),
    ("iam_sa_roles", "sa"),
    ("iam_storage_roles", "storage"),
];

/// Google Workspace users
///
/// The workspace provider authenticates with an access token of the setup service account. Every user gets a
/// generated initial password that has to be changed on first login.
pub fn users(ctx: &mut StackContext, range: &str) -> BuildResult {
    ctx.ensure_org_data()?;
    let users = ctx.items(range);
    if users.is_empty() {
        return Ok(());
    }

    let setup_service_account = ctx.variable("setup_service_account");
    let token = ctx.construct(
        Construct::data("google_service_account_access_token", "sa")
            .field("target_service_account", setup_service_account)
            .field("scopes", ACCESS_TOKEN_SCOPES.to_vec()),
    );
    let change_password = ctx.construct(Construct::local("change_password_at_next_login", true));
    let customer_id = ctx.reference("customer_id", "");
    ctx.construct(
        Construct::provider("googleworkspace")
            .field("customer_id", customer_id)
            .field("access_token", token.output("access_token")),
    );

    for mut user in users {
        let email = required(&user, range, "primary_email")?;
        let id = format!("user_{email}");

        let password = ctx.construct(
            Construct::resource("random_password", &id)
                .field("length", 16i64)
                .field("special", true),
        );
        user.insert("password", password.output("result"));
        user.insert("change_password_at_next_login", change_password.value());

        let handle = ctx.construct(
            Construct::resource("googleworkspace_user", &id)
                .fields(user)
                .as_blocks(&["name", "organizations", "phones", "emails", "addresses"]),
        );
        ctx.register(Bucket::Users, email, handle)?;
    }
    Ok(())
}

/// Membership lists without overlap, a user keeps only their highest role
fn dedup_membership(group: &mut Value) {
    let owners: IndexSet<String> = group.strings("owners").into_iter().collect();
    let managers: IndexSet<String> = group
        .strings("managers")
        .into_iter()
        .filter(|manager| !owners.contains(manager))
        .collect();
    let members: IndexSet<String> = group
        .strings("members")
        .into_iter()
        .filter(|member| !owners.contains(member) && !managers.contains(member))
        .collect();

    for (key, list) in [("owners", owners), ("managers", managers), ("members", members)] {
        group.insert(key, list.into_iter().collect::<Vec<_>>());
    }
}

pub fn groups(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut group in ctx.items(range) {
        let id = required(&group, range, "id")?;
        dedup_membership(&mut group);
        for key in ["owners", "managers", "members"] {
            ctx.resolve_list(&mut group, key, "user");
        }

        let handle = ctx.construct(
            Construct::module(&format!("grp_{id}"), GROUP_MODULE, Some(GROUP_VERSION)).fields(group),
        );
        ctx.register(Bucket::Groups, id, handle)?;
    }
    Ok(())
}

/// Groups through the fabric `cloud-identity-group` module
///
/// The module knows managers and members only, a manager listed as member stays a manager. Without a `customer_id`
/// the directory customer of the organization is used.
pub fn fabric_groups(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut group in ctx.items(range) {
        let name = required(&group, range, "name")?;
        let customer_id = group.get_str("customer_id").unwrap_or_default();
        let customer_id = ctx.reference("customer_id", &customer_id);
        group.insert("customer_id", customer_id);

        let managers: IndexSet<String> = group.strings("managers").into_iter().collect();
        if group.has("members") {
            let members: Vec<String> = group
                .strings("members")
                .into_iter()
                .filter(|member| !managers.contains(member))
                .collect();
            group.insert("members", members);
        }
        for key in ["managers", "members"] {
            ctx.resolve_list(&mut group, key, "user");
        }

        let handle = ctx.construct(
            Construct::module(
                &format!("grp_{name}"),
                &fabric_module("cloud-identity-group"),
                None,
            )
            .fields(group),
        );
        ctx.register(Bucket::Groups, name, handle)?;
    }
    Ok(())
}

fn service_account_email(account_id: &str, project: &str) -> String {
    format!("{account_id}@{project}.iam.gserviceaccount.com")
}

pub fn service_accounts(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut account in ctx.items(range) {
        let account_id = required(&account, range, "account_id")?;
        let project = required(&account, range, "project")?;
        ctx.resolve_field(&mut account, "project", "project");

        let handle = ctx.construct(
            Construct::resource(
                "google_service_account",
                &format!("sa_{account_id}_{project}"),
            )
            .fields(account),
        );
        ctx.register(
            Bucket::ServiceAccount,
            service_account_email(&account_id, &project),
            handle,
        )?;
    }
    Ok(())
}

/// Service accounts through the fabric `iam-service-account` module
///
/// Keys of the role maps name the resource the roles are granted on and are resolved as well.
pub fn fabric_service_accounts(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut account in ctx.items(range) {
        let name = required(&account, range, "name")?;
        let project = required(&account, range, "project_id")?;
        ctx.resolve_field(&mut account, "project_id", "project");

        for (key, kind) in SERVICE_ACCOUNT_ROLE_MAPS {
            let Some(roles) = account.get(key).and_then(Value::as_object).cloned() else {
                continue;
            };
            if roles.is_empty() {
                continue;
            }
            let resolved = roles
                .into_iter()
                .map(|(resource, roles)| (ctx.reference(kind, &resource).to_string(), roles))
                .collect::<indexmap::IndexMap<_, _>>();
            account.insert(*key, Value::Object(resolved));
        }
        ctx.fabric_iam(&mut account);

        let handle = ctx.construct(
            Construct::module(
                &format!("sa_{name}_{project}"),
                &fabric_module("iam-service-account"),
                None,
            )
            .fields(account),
        );
        ctx.register(
            Bucket::ServiceAccount,
            service_account_email(&name, &project),
            handle,
        )?;
    }
    Ok(())
}

pub fn workforce_pools(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut pool in ctx.items(range) {
        let name = required(&pool, range, "workforce_pool_id")?;
        if !pool.has("parent") {
            let parent = organization(ctx);
            pool.insert("parent", parent);
        }

        let handle = ctx.construct(
            Construct::resource("google_iam_workforce_pool", &format!("wif_pool_{name}"))
                .fields(pool)
                .as_blocks(&["access_restrictions", "allowed_services"]),
        );
        ctx.register(Bucket::WorkforcePool, name, handle)?;
    }
    Ok(())
}

pub fn workforce_pool_providers(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut provider in ctx.items(range) {
        let name = required(&provider, range, "provider_id")?;
        ctx.resolve_field(&mut provider, "workforce_pool_id", "wif_pool");

        let handle = ctx.construct(
            Construct::resource(
                "google_iam_workforce_pool_provider",
                &format!("wif_pp_{name}"),
            )
            .fields(provider)
            .as_blocks(&["saml", "oidc", "client_secret", "value", "web_sso_config"]),
        );
        ctx.register(Bucket::WorkforcePoolProvider, name, handle)?;
    }
    Ok(())
}

pub fn workload_pools(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut pool in ctx.items(range) {
        let name = required(&pool, range, "workload_identity_pool_id")?;
        ctx.resolve_field(&mut pool, "project", "project");

        let handle = ctx.construct(
            Construct::resource(
                "google_iam_workload_identity_pool",
                &format!("wi_pool_{name}"),
            )
            .fields(pool),
        );
        ctx.register(Bucket::WorkloadPool, name, handle)?;
    }
    Ok(())
}

pub fn workload_pool_providers(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut provider in ctx.items(range) {
        let name = required(&provider, range, "workload_identity_pool_provider_id")?;
        ctx.resolve_field(&mut provider, "workload_identity_pool_id", "wi_pool");
        ctx.resolve_field(&mut provider, "project", "project");

        let handle = ctx.construct(
            Construct::resource(
                "google_iam_workload_identity_pool_provider",
                &format!("wi_pp_{name}"),
            )
            .fields(provider)
            .as_blocks(&[
                "aws",
                "oidc",
                "saml",
                "x509",
                "trust_store",
                "trust_anchors",
                "intermediate_cas",
            ]),
        );
        ctx.register(Bucket::WorkloadPoolProvider, name, handle)?;
    }
    Ok(())
}
