//! reference check
//!
//! Walks every expression of a built stack and reports references to blocks that were never emitted. Unregistered
//! names are passed through verbatim by the resolver, so a dangling reference here means a constructor built an
//! address by hand for something that does not exist in the stack.
use crate::backend::HclBackend;
use crate::util::TraversalExt;
use crate::visit::VisitTraversals;
use hcl::Traversal;
use indexmap::IndexSet;

/// Roots that are never emitted as blocks
const BUILTIN_ROOTS: &[&str] = &["each", "count", "path", "self", "terraform"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DanglingReference {
    pub section: String,
    /// address of the missing block, e.g. `module.nw_vpc9`
    pub block: String,
}

/// Address of the block a traversal points into, `None` for builtins
fn block_of(traversal: &Traversal) -> Option<String> {
    let path = traversal.get_longest_path();
    let root = path.first()?;
    if BUILTIN_ROOTS.contains(&root.as_str()) {
        return None;
    }
    let len = match root.as_str() {
        "data" => 3,
        _ => 2,
    };
    (path.len() >= len).then(|| path[..len].join("."))
}

/// Dangling references of every section, each missing block reported once per section
pub fn dangling_references(backend: &HclBackend) -> Vec<DanglingReference> {
    let mut known: IndexSet<String> = backend
        .constructs()
        .iter()
        .map(|emitted| emitted.handle.address().to_string())
        .collect();
    known.extend(
        backend
            .declared_variables()
            .keys()
            .map(|name| format!("var.{name}")),
    );

    let mut dangling: IndexSet<DanglingReference> = IndexSet::new();
    for (section, body) in backend.bodies() {
        body.visit_traversals(&mut |traversal: &Traversal| {
            let Some(block) = block_of(traversal) else {
                return;
            };
            if !known.contains(&block) {
                dangling.insert(DanglingReference {
                    section: section.clone(),
                    block,
                });
            }
        });
    }

    for reference in &dangling {
        tracing::warn!(section=%reference.section, block=%reference.block, "reference to a block that is not emitted");
    }
    dangling.into_iter().collect()
}
