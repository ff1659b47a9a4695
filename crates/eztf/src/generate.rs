//! generation of all sub-stacks of a document
//!
//! Every Terraform sub-stack is built into its own [HclBackend]. Stacks share nothing, a stack failing stops the run
//! but leaves the stacks before it intact.
use crate::backend::{HclBackend, RenderError};
use crate::check::{dangling_references, DanglingReference};
use crate::config::Document;
use crate::stack::{build_stack, constructor_bindings, BuildError, Stack};
use crate::util::clean_res_id;
use indexmap::IndexMap;

#[derive(thiserror::Error, Debug)]
pub enum GenerateError {
    #[error("`variable.domain` is required to name the stacks")]
    MissingDomain,
    #[error("`{0}` is not a terraform stack")]
    UnknownStack(String),
    #[error("Unable to build stack `{stack}`")]
    Build {
        stack: String,
        #[source]
        source: BuildError,
    },
    #[error("Unable to render stack `{stack}`")]
    Render {
        stack: String,
        #[source]
        source: RenderError,
    },
}

/// A built and rendered sub-stack
#[derive(Debug)]
pub struct GeneratedStack {
    /// physical stack name, `gcp-<domain>-<sub-stack>`
    pub name: String,
    pub stack: Stack,
    /// `<section>.tf` file name to content
    pub files: IndexMap<String, String>,
    pub dangling: Vec<DanglingReference>,
}

impl GeneratedStack {
    pub fn sub_stack(&self) -> &str {
        &self.stack.name
    }
}

/// Output of a generation run
#[derive(Debug)]
pub struct Generation {
    /// the input document with `tf_stacks` and `tf_vars` filled in
    pub document: Document,
    pub stacks: Vec<GeneratedStack>,
}

/// Physical name of a sub-stack
pub fn stack_name(domain: &str, sub_stack: &str) -> String {
    format!("gcp-{}-{sub_stack}", clean_res_id(domain))
}

/// Sub-stacks that produce Terraform code
///
/// `eztf.tf_stacks` when set, otherwise every sub-stack with at least one kind that has a constructor.
pub fn terraform_stacks(document: &Document) -> Vec<String> {
    if let Some(tf_stacks) = &document.orchestration().tf_stacks {
        return tf_stacks.clone();
    }

    document
        .stacks()
        .filter(|sub_stack| !constructor_bindings(document, sub_stack).is_empty())
        .cloned()
        .collect()
}

/// Build and render one sub-stack
pub fn generate_stack(document: &Document, sub_stack: &str) -> Result<GeneratedStack, GenerateError> {
    let domain = document.domain().ok_or(GenerateError::MissingDomain)?;
    let name = stack_name(&domain, sub_stack);

    let mut backend = HclBackend::default();
    let stack =
        build_stack(document, sub_stack, &mut backend).map_err(|source| GenerateError::Build {
            stack: name.clone(),
            source,
        })?;
    let dangling = dangling_references(&backend);
    let files = backend.render().map_err(|source| GenerateError::Render {
        stack: name.clone(),
        source,
    })?;

    tracing::info!(stack=%name, files=files.len(), "generated");
    Ok(GeneratedStack {
        name,
        stack,
        files,
        dangling,
    })
}

/// Generate the Terraform sub-stacks of a document, or only the `selected` ones
pub fn generate(document: &Document, selected: &[String]) -> Result<Generation, GenerateError> {
    let tf_stacks = terraform_stacks(document);
    if let Some(unknown) = selected.iter().find(|stack| !tf_stacks.contains(stack)) {
        return Err(GenerateError::UnknownStack(unknown.clone()));
    }

    let mut updated = document.clone();
    updated.set_tf_stacks(tf_stacks.clone());

    let mut stacks = vec![];
    for sub_stack in &tf_stacks {
        if !selected.is_empty() && !selected.contains(sub_stack) {
            continue;
        }
        let generated = generate_stack(document, sub_stack)?;
        updated.set_tf_vars(sub_stack, generated.stack.tf_vars().clone());
        stacks.push(generated);
    }

    Ok(Generation {
        document: updated,
        stacks,
    })
}
