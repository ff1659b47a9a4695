//! certificate authorities and certificate manager
use super::{fabric_module, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, BuildError, StackContext};

/// CA pools through the fabric `certificate-authority-service` module
///
/// A pool is named by `ca_pool_config.name`, or by its `ca_pool_id` when it has no name.
pub fn certificate_authorities(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut cas in ctx.items(range) {
        let pool = cas.get("ca_pool_config");
        let name = pool
            .and_then(|pool| pool.get_str("name"))
            .or_else(|| pool.and_then(|pool| pool.get_str("ca_pool_id")))
            .ok_or_else(|| BuildError::MissingField {
                range: range.to_string(),
                key: "ca_pool_config.ca_pool_id".to_string(),
            })?;
        ctx.resolve_field(&mut cas, "project_id", "project");
        ctx.fabric_iam(&mut cas);

        let handle = ctx.construct(
            Construct::module(
                &format!("cas_{name}"),
                &fabric_module("certificate-authority-service"),
                None,
            )
            .fields(cas),
        );
        ctx.register(Bucket::Fabric("cas".to_string()), name, handle)?;
    }
    Ok(())
}

/// Certificate manager, one module per project
pub fn certificate_managers(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut manager in ctx.items(range) {
        let project = required(&manager, range, "project_id")?;
        ctx.resolve_field(&mut manager, "project_id", "project");

        let handle = ctx.construct(
            Construct::module(
                &format!("cm_{project}"),
                &fabric_module("certificate-manager"),
                None,
            )
            .fields(manager),
        );
        ctx.register(Bucket::Fabric("cm".to_string()), project, handle)?;
    }
    Ok(())
}
