//! resource constructors
//!
//! One function per resource kind. Each reads the items of its range, derives a block id per item, resolves the
//! references it knows about, hands the block to the backend and registers the returned handle.
//!
//! Items are copied out of the document before they are rewritten, the document itself stays untouched.
pub mod certificates;
pub mod compute;
pub mod data;
pub mod generic;
pub mod hierarchy;
pub mod iam;
pub mod identity;
pub mod logging;
pub mod network;
pub mod network_services;
pub mod policy;
pub mod vpn;

use crate::resolve::{which_node, NodeKind};
use crate::stack::{BuildError, StackContext};
use crate::value::Value;

pub(crate) type BuildResult = Result<(), BuildError>;

const FABRIC_MODULES: &str = "github.com/GoogleCloudPlatform/cloud-foundation-fabric//modules";

/// Source of a cloud foundation fabric module
pub(crate) fn fabric_module(name: &str) -> String {
    format!("{FABRIC_MODULES}/{name}")
}

/// `organizations/${var.organization_id}`
pub(crate) fn organization(ctx: &mut StackContext) -> Value {
    let id = ctx.reference("organization", "/");
    Value::template([Value::from("organizations/"), id])
}

/// Hierarchy node a path points at, resolved as parent of a folder or project
pub(crate) fn parent(ctx: &mut StackContext, node: &str) -> Value {
    match which_node(node) {
        NodeKind::Organization => organization(ctx),
        NodeKind::Folder => ctx.reference("folder", node),
        NodeKind::Project => ctx.reference("project", node),
    }
}

/// Rewrite fabric IAM of an item, its tags and their values
pub(crate) fn fabric_iam_with_tags(ctx: &mut StackContext, item: &mut Value, tag_keys: &[&str]) {
    ctx.fabric_iam(item);
    for key in tag_keys {
        let Some(tags) = item.get_mut(key).and_then(Value::as_object_mut) else {
            continue;
        };
        for tag in tags.values_mut() {
            ctx.fabric_iam(tag);
            if let Some(values) = tag.get_mut("values").and_then(Value::as_object_mut) {
                for value in values.values_mut() {
                    ctx.fabric_iam(value);
                }
            }
        }
    }
}

/// Resolve `key` of every object in the list at `list_key`
pub(crate) fn resolve_each(
    ctx: &mut StackContext,
    item: &mut Value,
    list_key: &str,
    key: &str,
    kind: &str,
) {
    let Some(list) = item.get_mut(list_key).and_then(Value::as_array_mut) else {
        return;
    };
    for element in list {
        ctx.resolve_field(element, key, kind);
    }
}

/// Resolve a nested object field, e.g. `service_account.email`
pub(crate) fn resolve_nested(
    ctx: &mut StackContext,
    item: &mut Value,
    object_key: &str,
    key: &str,
    kind: &str,
) {
    if let Some(object) = item.get_mut(object_key) {
        ctx.resolve_field(object, key, kind);
    }
}
