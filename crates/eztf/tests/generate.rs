//! End to end tests
//!
//! Generates every config in /tests/fixtures/, writes the repository and loads the written config again.

use eztf::config::Document;
use eztf::generate::{generate, Generation};
use eztf::output::write_repo;
use eztf::registry::Bucket;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("EZTF_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
}

fn fixture(name: &str) -> Document {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    Document::load_file(&path).expect("fixture must load")
}

fn out_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("eztf-test-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn file_names(generation: &Generation, sub_stack: &str) -> Vec<String> {
    generation
        .stacks
        .iter()
        .find(|stack| stack.sub_stack() == sub_stack)
        .expect("stack must be generated")
        .files
        .keys()
        .cloned()
        .collect()
}

fn file<'a>(generation: &'a Generation, sub_stack: &str, file_name: &str) -> &'a str {
    generation
        .stacks
        .iter()
        .find(|stack| stack.sub_stack() == sub_stack)
        .and_then(|stack| stack.files.get(file_name))
        .map(String::as_str)
        .expect("file must be generated")
}

#[test]
fn fixtures() {
    init_tracing();

    insta::glob!("fixtures/*.yaml", |path| {
        let document = Document::load_file(path).expect("fixture must load");
        let generation = generate(&document, &[]).expect("fixture must generate");
        assert!(!generation.stacks.is_empty());

        for stack in &generation.stacks {
            assert!(
                stack.dangling.is_empty(),
                "{}: {:?}",
                stack.name,
                stack.dangling
            );
            assert!(stack.files.contains_key("backend.tf"), "{}", stack.name);
        }

        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("fixture");
        let repo = write_repo(&generation, &out_dir(name)).expect("repo must be written");
        for stack in &generation.stacks {
            for file_name in stack.files.keys() {
                assert!(repo.join(stack.sub_stack()).join(file_name).is_file());
            }
        }
        assert!(repo.join("README.md").is_file());
        assert!(repo.join("script_env").is_file());

        let written = Document::load_file(&repo.join("eztf-config.yaml")).expect("written config must load");
        assert_eq!(
            written.orchestration().tf_stacks,
            generation.document.orchestration().tf_stacks
        );
    });
}

#[test]
fn landing_zone() {
    init_tracing();
    let generation = generate(&fixture("landing_zone.yaml"), &[]).unwrap();

    let names: Vec<_> = generation.stacks.iter().map(|s| s.name.as_str()).collect();
    insta::assert_snapshot!(names.join("\n"), @r"
    gcp-acme-com-org
    gcp-acme-com-net
    ");

    assert_eq!(
        file_names(&generation, "org"),
        vec!["backend.tf", "variables.tf", "fldrs.tf", "prjs.tf"]
    );
    assert_eq!(
        file_names(&generation, "net"),
        vec!["backend.tf", "variables.tf", "nets.tf", "fws.tf"]
    );

    let registry = &generation.stacks[0].stack.registry;
    let folder_paths: Vec<_> = registry.keys(&Bucket::Folders).collect();
    insta::assert_debug_snapshot!(folder_paths, @r#"
    [
        "/prod",
        "/dev",
        "/prod/apps",
    ]
    "#);
    assert!(registry.contains(&Bucket::Projects, "app"));

    let folders = file(&generation, "org", "fldrs.tf");
    assert!(folders.contains(r#"resource "google_folder" "fldr_prod__apps""#));
    assert!(folders.contains("google_folder.fldr_prod.name"));

    let projects = file(&generation, "org", "prjs.tf");
    assert!(projects.contains(r#"module "prj_app""#));
    assert!(projects.contains("google_folder.fldr_prod__apps.name"));

    let backend = file(&generation, "net", "backend.tf");
    assert!(backend.contains("acme-seed-state"));
    assert!(backend.contains("terraform-net-state"));

    let firewalls = file(&generation, "net", "fws.tf");
    assert!(firewalls.contains("module.nw_vpc1.network_self_link"));
}

#[test]
fn landing_zone_repository() {
    init_tracing();
    let generation = generate(&fixture("landing_zone.yaml"), &[]).unwrap();
    let repo = write_repo(&generation, &out_dir("landing_zone_repository")).unwrap();

    assert!(repo.ends_with("gcp-acme-com-ezytf"));

    let tf_vars = std::fs::read_to_string(repo.join("net/terraform.tfvars")).unwrap();
    assert!(tf_vars.contains("region"));
    assert!(tf_vars.contains("europe-west1"));

    let notes = std::fs::read_to_string(repo.join("docs/owners.yaml")).unwrap();
    assert_eq!(notes.trim(), "team: platform");

    let script_env = std::fs::read_to_string(repo.join("script_env")).unwrap();
    assert!(script_env.contains("eztf@acme-seed.iam.gserviceaccount.com"));
    assert!(script_env.contains("cloudresourcemanager.googleapis.com iam.googleapis.com"));

    let readme = std::fs::read_to_string(repo.join("README.md")).unwrap();
    let org = readme.find("gcp-acme-com-org").unwrap();
    let net = readme.find("gcp-acme-com-net").unwrap();
    assert!(org < net);
}

#[test]
fn data_platform() {
    init_tracing();
    let generation = generate(&fixture("data_platform.yaml"), &[]).unwrap();
    assert_eq!(generation.stacks.len(), 1);
    assert_eq!(generation.stacks[0].name, "gcp-data-acme-com-data");

    let keys = file(&generation, "data", "keys.tf");
    assert!(keys.contains(r#"module "kms_lake""#));
    assert!(keys.contains("google_service_account.sa_loader_data-prod.email"));

    let lake = file(&generation, "data", "lake.tf");
    assert!(lake.contains(r#"resource "google_storage_bucket" "gcs_acme-lake-raw""#));
    assert!(lake.contains("versioning {"));

    let tables = file(&generation, "data", "tbls.tf");
    assert!(tables.contains("google_bigquery_dataset.bqd_raw.dataset_id"));

    let repo = write_repo(&generation, &out_dir("data_platform")).unwrap();
    assert!(repo.ends_with("gcp-data-acme-com-analytics"));
}

#[test]
fn selected_stacks_only() {
    init_tracing();
    let generation = generate(&fixture("landing_zone.yaml"), &["net".to_string()]).unwrap();

    let names: Vec<_> = generation.stacks.iter().map(|s| s.sub_stack()).collect();
    assert_eq!(names, vec!["net"]);
    assert_eq!(
        generation.document.orchestration().tf_stacks,
        Some(vec!["org".to_string(), "net".to_string()])
    );
}

#[test]
fn later_kinds_see_earlier_networks() {
    init_tracing();
    let document = eztf::config_document! {r#"
    variable:
      domain: acme.com
    eztf:
      stacks:
        network:
          - nets: network
          - fws: firewall
    nets:
      - network_name: vpc1
        project_id: proj-a
    fws:
      - network_name: vpc1
        project_id: proj-a
    "#};

    let generation = generate(&document, &[]).unwrap();
    let stack = &generation.stacks[0];
    assert_eq!(stack.name, "gcp-acme-com-network");
    assert!(stack.stack.registry.contains(&Bucket::Network, "vpc1"));

    let firewalls = file(&generation, "network", "fws.tf");
    assert!(firewalls.contains("module.nw_vpc1.network_self_link"));
    assert!(firewalls.contains(r#""proj-a""#));
}
