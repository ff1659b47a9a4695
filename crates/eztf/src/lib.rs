//! # eztf - GCP environments from one config file
//!
//! `eztf` reads a YAML (or JSON) description of a Google Cloud environment and writes a repository of Terraform
//! stacks for it.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `eztf` works internally.
//!
//! ### The config document
//!
//! A config file is one mapping ([config::Document]) with three kinds of top level keys:
//!
//! - `variable`: global values like `domain`, `organization_id` or `setup_project_id`
//! - `eztf`: orchestration, most importantly `stacks`
//! - everything else is a named *range*: a list (sometimes a mapping) of loosely typed items
//!
//! ```yaml
//! variable:
//!   domain: acme.com
//! eztf:
//!   stacks:
//!     net:              # a sub-stack, becomes one folder of terraform code
//!       - prjs: projects  # range `prjs` is built with the `projects` constructor
//!       - nets: network
//! prjs:
//!   - name: host
//! nets:
//!   - network_name: vpc1
//!     project_id: host  # a logical name, not a terraform reference
//! ```
//!
//! Items reference each other by logical name. Turning those names into Terraform references is what most of the code
//! is about.
//!
//! ### Building a sub-stack
//!
//! see [stack::build_stack]
//!
//! Each sub-stack is built on its own, in fixed phases:
//!
//! 1. provider and state backend are emitted
//! 2. ranges bound as `variable`/`tf_vars` are declared as Terraform variables
//! 3. prepass: every bound kind ([catalog::ResourceKind]) gets its registry bucket, feeds its
//!    [accumulate::Accumulator]s and declares the variables it always needs
//! 4. every binding is built in config order by its constructor in [resources]
//!
//! A constructor copies an item, rewrites the fields that hold logical names through the resolver, hands the result to
//! the [backend::Backend] as a [backend::Construct] and registers the returned [address::Handle] under the item's
//! name in the [registry::NameRegistry].
//!
//! ### Resolving names
//!
//! see [resolve::Resolver]
//!
//! A reference is `(kind, name)`, e.g. `("network", "vpc1")`. The resolver looks the name up in the registry bucket of
//! that kind and projects the handle onto the output attribute for the kind:
//!
//! | **kind**  | **bucket**  | **resolves to**                     |
//! |-----------|-------------|-------------------------------------|
//! | `network` | `Network`   | `module.nw_vpc1.network_self_link`  |
//! | `project` | `Projects`  | `module.prj_host.project_id`        |
//! | `folder`  | `Folders`   | `google_folder.fldr_prod.name`      |
//!
//! Names that are not registered are passed through verbatim, the resolver never fails. Since only earlier bindings
//! are registered, references to things built later go through accumulators (subnets, log destinations, HA VPN
//! gateways), which are filled before anything is built.
//!
//! Values carrying references are [value::Value::Ref] and [value::Value::Template], they become HCL traversals and
//! template strings when emitted.
//!
//! ### Output
//!
//! The [backend::HclBackend] collects blocks per section (one section per range) and renders each section as a `.tf`
//! file. [check] walks the rendered expressions and warns about references to blocks that were never emitted.
//! [generate] runs all sub-stacks and [output] writes the repository.
//!
pub mod accumulate;
pub mod address;
pub mod backend;
pub mod catalog;
pub mod check;
pub mod config;
pub mod generate;
pub mod output;
pub mod registry;
pub mod resolve;
pub mod resources;
pub mod stack;
mod util;
pub mod value;
pub mod variables;
mod visit;
