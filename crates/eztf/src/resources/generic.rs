//! arbitrary modules, resources and data sources
//!
//! The module source or the block type comes from the `eztf` section (`tf_any_module`, `tf_any_resource`,
//! `tf_any_data`), keyed by range. Items are passed through as they are, only `project` is resolved for resources.
//! An item may pick its block id with `_eztf_module_id`, `_eztf_resource_id` or `_eztf_data_id`, otherwise its
//! position in the range is used.
use super::BuildResult;
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{BuildError, StackContext};
use crate::value::Value;

const MODULE_ID: &str = "_eztf_module_id";
const RESOURCE_ID: &str = "_eztf_resource_id";
const DATA_ID: &str = "_eztf_data_id";

/// Take the id key out of an item
fn take_id(item: &mut Value, key: &str, index: usize) -> String {
    item.remove(key)
        .and_then(|id| id.as_plain_string())
        .unwrap_or_else(|| index.to_string())
}

/// Block type without its provider prefix, `google_compute_network` is `compute_network`
fn short_type(block_type: &str) -> &str {
    block_type
        .split_once('_')
        .map(|(_, name)| name)
        .unwrap_or(block_type)
}

pub fn modules(ctx: &mut StackContext, range: &str) -> BuildResult {
    let Some(details) = ctx.document().orchestration().tf_any_module.get(range) else {
        return Err(BuildError::InvalidField {
            range: range.to_string(),
            key: "tf_any_module".to_string(),
            problem: "has no module source for this range".to_string(),
        });
    };

    for (index, mut item) in ctx.items(range).into_iter().enumerate() {
        let id = format!("{range}_{}", take_id(&mut item, MODULE_ID, index));
        let handle = ctx.construct(
            Construct::module(&id, &details.source, details.version.as_deref()).fields(item),
        );
        ctx.register(Bucket::Module, id, handle)?;
    }
    Ok(())
}

pub fn resources(ctx: &mut StackContext, range: &str) -> BuildResult {
    let Some(details) = ctx.document().orchestration().tf_any_resource.get(range) else {
        tracing::debug!(range, "no resource type, skipped");
        return Ok(());
    };
    let resource_type = details.name.as_str();

    for (index, mut item) in ctx.items(range).into_iter().enumerate() {
        let id = take_id(&mut item, RESOURCE_ID, index);
        ctx.resolve_field(&mut item, "project", "project");

        let handle = ctx.construct(
            Construct::resource(resource_type, &format!("{}_{id}", short_type(resource_type)))
                .fields(item),
        );
        ctx.register(Bucket::Resource(resource_type.to_string()), id, handle)?;
    }
    Ok(())
}

pub fn data_sources(ctx: &mut StackContext, range: &str) -> BuildResult {
    let Some(details) = ctx.document().orchestration().tf_any_data.get(range) else {
        tracing::debug!(range, "no data source type, skipped");
        return Ok(());
    };
    let data_type = details.name.as_str();

    for (index, mut item) in ctx.items(range).into_iter().enumerate() {
        let id = take_id(&mut item, DATA_ID, index);
        let handle = ctx.construct(
            Construct::data(data_type, &format!("{}_{id}", short_type(data_type))).fields(item),
        );
        ctx.register(Bucket::Data(data_type.to_string()), id, handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::Target;
    use crate::config_document;
    use crate::resources::test::{build, field};
    use pretty_assertions::assert_eq;

    #[test]
    fn short_types() {
        assert_eq!(short_type("google_compute_network"), "compute_network");
        assert_eq!(short_type("random"), "random");
    }

    #[test]
    fn any_blocks() {
        let document = config_document! {r#"
        eztf:
          stacks:
            misc:
              - prjs: projects
              - addrs: res
              - nets: data
              - dns: mod
              - untyped: any_resource
          tf_any_module:
            dns:
              source: terraform-google-modules/cloud-dns/google
              version: "~> 5.0"
          tf_any_resource:
            addrs:
              name: google_compute_address
          tf_any_data:
            nets:
              name: google_compute_network
        prjs:
          - name: app
        addrs:
          - _eztf_resource_id: web
            name: web-ip
            project: app
          - name: db-ip
        nets:
          - _eztf_data_id: default
            name: default
        dns:
          - _eztf_module_id: private
            type: private
        untyped:
          - name: ignored
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "compute_address_web", "project"),
            "${module.prj_app.project_id}"
        );
        assert!(!backend
            .find("compute_address_web")
            .unwrap()
            .construct
            .fields
            .contains_key(RESOURCE_ID));
        assert!(backend.find("compute_address_1").is_some());
        assert_eq!(
            backend.find("compute_network_default").unwrap().construct.target,
            Target::Data("google_compute_network".into())
        );
        assert_eq!(field(&backend, "dns_private", "type"), "private");
        assert!(stack.registry.contains(
            &Bucket::Resource("google_compute_address".into()),
            "web"
        ));
        assert!(stack.registry.contains(&Bucket::Module, "dns_private"));
        assert!(backend.find("0").is_none());
    }

    #[test]
    fn modules_need_a_source() {
        let document = config_document! {r#"
        eztf:
          stacks:
            misc:
              - dns: any_module
        dns:
          - type: private
        "#};

        let mut backend = crate::backend::HclBackend::default();
        let error = crate::stack::build_stack(&document, "misc", &mut backend).unwrap_err();
        assert_eq!(
            error.to_string(),
            "range `dns`: key `tf_any_module` has no module source for this range"
        );
    }
}
