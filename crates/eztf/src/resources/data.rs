//! storage, keys, messaging and databases
use super::{fabric_module, resolve_each, BuildResult};
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, BuildError, StackContext};
use crate::value::Value;

const KMS_MODULE: &str = "terraform-google-modules/kms/google";
const KMS_VERSION: &str = "~> 3.0";
const SQL_MODULES: &str = "terraform-google-modules/sql-db/google//modules";
const SQL_VERSION: &str = "~> 25.0";

/// Database engine of a Cloud SQL instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlEngine {
    Postgres,
    MySql,
    SqlServer,
}

impl SqlEngine {
    /// Prefix of the block id
    fn prefix(self) -> &'static str {
        match self {
            SqlEngine::Postgres => "pgsql",
            SqlEngine::MySql => "mysql",
            SqlEngine::SqlServer => "mssql",
        }
    }

    fn source(self) -> String {
        let module = match self {
            SqlEngine::Postgres => "postgresql",
            SqlEngine::MySql => "mysql",
            SqlEngine::SqlServer => "mssql",
        };
        format!("{SQL_MODULES}/{module}")
    }
}

/// Key rings with their keys
///
/// Each owner entry is a comma separated list of principals, every principal is resolved on its own.
pub fn kms(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut keyring in ctx.items(range) {
        let name = required(&keyring, range, "keyring")?;
        ctx.resolve_field(&mut keyring, "project_id", "project");

        let owners: Vec<Value> = keyring
            .strings("owners")
            .iter()
            .map(|owner| {
                let mut parts = vec![];
                for (i, principal) in owner.split(',').enumerate() {
                    if i > 0 {
                        parts.push(Value::from(","));
                    }
                    parts.push(ctx.principal(principal.trim()));
                }
                Value::template(parts)
            })
            .collect();
        if !owners.is_empty() {
            keyring.insert("owners", owners);
        }

        let handle = ctx.construct(
            Construct::module(&format!("kms_{name}"), KMS_MODULE, Some(KMS_VERSION))
                .fields(keyring),
        );
        ctx.register(Bucket::Kms, name, handle)?;
    }
    Ok(())
}

/// Key rings through the fabric `kms` module, each key carries its own IAM
pub fn fabric_kms(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut keyring in ctx.items(range) {
        let name = keyring
            .get("keyring")
            .and_then(|config| config.get_str("name"))
            .ok_or_else(|| BuildError::MissingField {
                range: range.to_string(),
                key: "keyring.name".to_string(),
            })?;
        ctx.resolve_field(&mut keyring, "project_id", "project");
        if let Some(keys) = keyring.get_mut("keys").and_then(Value::as_object_mut) {
            for key in keys.values_mut() {
                ctx.fabric_iam(key);
            }
        }
        ctx.fabric_iam(&mut keyring);

        let handle = ctx.construct(
            Construct::module(&format!("kms_{name}"), &fabric_module("kms"), None).fields(keyring),
        );
        ctx.register(Bucket::Kms, name, handle)?;
    }
    Ok(())
}

pub fn buckets(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut bucket in ctx.items(range) {
        let name = required(&bucket, range, "name")?;
        ctx.resolve_field(&mut bucket, "project", "project");

        let handle = ctx.construct(
            Construct::resource("google_storage_bucket", &format!("gcs_{name}"))
                .fields(bucket)
                .as_blocks(&[
                    "cors",
                    "lifecycle_rule",
                    "action",
                    "condition",
                    "versioning",
                    "website",
                    "retention_policy",
                    "logging",
                    "encryption",
                    "soft_delete_policy",
                ]),
        );
        ctx.register(Bucket::Gcs, name, handle)?;
    }
    Ok(())
}

/// Buckets through the fabric `gcs` module
pub fn fabric_buckets(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut bucket in ctx.items(range) {
        let name = required(&bucket, range, "name")?;
        ctx.resolve_field(&mut bucket, "project_id", "project");
        ctx.fabric_iam(&mut bucket);

        let handle = ctx.construct(
            Construct::module(&format!("gcs_{name}"), &fabric_module("gcs"), None).fields(bucket),
        );
        ctx.register(Bucket::Gcs, name, handle)?;
    }
    Ok(())
}

/// Topics through the fabric `pubsub` module, subscriptions carry their own IAM
pub fn pubsub(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut topic in ctx.items(range) {
        let name = required(&topic, range, "name")?;
        ctx.resolve_field(&mut topic, "project_id", "project");
        ctx.fabric_iam(&mut topic);
        if let Some(subscriptions) = topic.get_mut("subscriptions").and_then(Value::as_object_mut) {
            for subscription in subscriptions.values_mut() {
                ctx.fabric_iam(subscription);
            }
        }

        let handle =
            ctx.construct(Construct::module(&name, &fabric_module("pubsub"), None).fields(topic));
        ctx.register(Bucket::Pubsub, name, handle)?;
    }
    Ok(())
}

pub fn bigquery_datasets(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut dataset in ctx.items(range) {
        let name = required(&dataset, range, "dataset_id")?;
        ctx.resolve_field(&mut dataset, "project", "project");
        resolve_each(ctx, &mut dataset, "access", "dataset_id", "bq_dataset");
        resolve_each(ctx, &mut dataset, "access", "project_id", "bq_project");
        resolve_each(ctx, &mut dataset, "access", "routine_id", "bq_routine");

        let handle = ctx.construct(
            Construct::resource("google_bigquery_dataset", &format!("bqd_{name}"))
                .fields(dataset)
                .as_blocks(&[
                    "access",
                    "dataset",
                    "routine",
                    "view",
                    "default_encryption_configuration",
                ]),
        );
        ctx.register(Bucket::BqDataset, name, handle)?;
    }
    Ok(())
}

pub fn bigquery_tables(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut table in ctx.items(range) {
        let name = required(&table, range, "table_id")?;
        ctx.resolve_field(&mut table, "dataset_id", "bq_dataset");
        ctx.resolve_field(&mut table, "project", "project");

        let handle = ctx.construct(
            Construct::resource("google_bigquery_table", &format!("bqt_{name}"))
                .fields(table)
                .as_blocks(&[
                    "time_partitioning",
                    "range_partitioning",
                    "range",
                    "view",
                    "materialized_view",
                    "encryption_configuration",
                    "external_data_configuration",
                    "bigtable_options",
                    "column_family",
                    "column",
                    "table_constraints",
                    "primary_key",
                    "foreign_keys",
                    "referenced_table",
                    "column_references",
                ]),
        );
        ctx.register(Bucket::BqTable, name, handle)?;
    }
    Ok(())
}

pub fn bigquery_routines(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut routine in ctx.items(range) {
        let name = required(&routine, range, "routine_id")?;
        ctx.resolve_field(&mut routine, "dataset_id", "bq_dataset");
        ctx.resolve_field(&mut routine, "project", "project");

        let handle = ctx.construct(
            Construct::resource("google_bigquery_routine", &format!("bqr_{name}"))
                .fields(routine)
                .as_blocks(&["arguments", "remote_function_options", "spark_options"]),
        );
        ctx.register(Bucket::BqRoutine, name, handle)?;
    }
    Ok(())
}

pub fn cloudsql(ctx: &mut StackContext, range: &str, engine: SqlEngine) -> BuildResult {
    for mut instance in ctx.items(range) {
        let name = required(&instance, range, "name")?;
        let id = format!("{}_{name}", engine.prefix());
        ctx.resolve_field(&mut instance, "project_id", "project");
        if let Some(ip_configuration) = instance.get_mut("ip_configuration") {
            ctx.resolve_field(ip_configuration, "private_network", "network");
            ctx.resolve_list(ip_configuration, "psc_allowed_consumer_projects", "project");
        }

        let handle = ctx.construct(
            Construct::module(&id, &engine.source(), Some(SQL_VERSION)).fields(instance),
        );
        ctx.register(Bucket::Cloudsql, id, handle)?;
    }
    Ok(())
}

/// Parallelstore instances in a project network
pub fn parallelstores(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut instance in ctx.items(range) {
        let name = required(&instance, range, "instance_id")?;
        ctx.resolve_field(&mut instance, "project", "project");
        ctx.resolve_field(&mut instance, "network", "network");

        let handle = ctx.construct(
            Construct::resource(
                "google_parallelstore_instance",
                &format!("parallelstore_{name}"),
            )
            .fields(instance),
        );
        ctx.register(Bucket::Parallelstore, name, handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::backend::HclBackend;
    use crate::config_document;
    use crate::registry::Bucket;
    use crate::stack::{build_stack, BuildError};
    use crate::resources::test::{build, field};
    use pretty_assertions::assert_eq;

    #[test]
    fn key_ring_owners_resolve_each_principal() {
        let document = config_document! {r#"
        eztf:
          stacks:
            sec:
              - sas: service_account
              - keys: kms
        sas:
          - account_id: ci
            project: tooling
        keys:
          - keyring: main
            project_id: tooling
            keys: [one, two]
            owners:
              - "serviceAccount:ci@tooling.iam.gserviceaccount.com, group:sec@acme.com"
              - user:jane@acme.com
        "#};

        let (_, backend) = build(&document);

        assert_eq!(
            field(&backend, "kms_main", "owners"),
            r#"["serviceAccount:${google_service_account.sa_ci_tooling.email},group:sec@acme.com","user:jane@acme.com"]"#
        );
    }

    #[test]
    fn bigquery_references() {
        let document = config_document! {r#"
        eztf:
          stacks:
            bq:
              - sql: pgsql
              - datasets: bq_dataset
              - routines: bq_routine
              - tables: bq_table
        nets: []
        sql:
          - name: main
            project_id: data
            ip_configuration:
              private_network: vpc1
        datasets:
          - dataset_id: raw
            project: data
            access:
              - role: READER
                special_group: projectReaders
        routines:
          - routine_id: clean
            dataset_id: raw
            project: data
            arguments:
              - name: x
                data_type: '{"typeKind": "INT64"}'
        tables:
          - table_id: events
            dataset_id: raw
            project: data
        "#};

        let (_, backend) = build(&document);

        assert_eq!(
            field(&backend, "bqt_events", "dataset_id"),
            "${google_bigquery_dataset.bqd_raw.dataset_id}"
        );
        assert_eq!(
            field(&backend, "bqr_clean", "dataset_id"),
            "${google_bigquery_dataset.bqd_raw.dataset_id}"
        );
        let sql = &backend.find("pgsql_main").unwrap().construct;
        assert_eq!(
            sql.fields["ip_configuration"].get("private_network"),
            Some(&crate::value::Value::from("vpc1"))
        );
    }

    #[test]
    fn fabric_key_rings_and_buckets() {
        let document = config_document! {r#"
        eztf:
          stacks:
            sec:
              - prjs: projects
              - sas: service_account
              - keys: ff_kms
              - lake: ff_gcs
        prjs:
          - name: sec
        sas:
          - account_id: ci
            project: tooling
        keys:
          - project_id: sec
            keyring:
              location: europe-west1
              name: main
            keys:
              disk:
                iam:
                  roles/cloudkms.cryptoKeyEncrypterDecrypter:
                    - serviceAccount:ci@tooling.iam.gserviceaccount.com
            iam:
              roles/cloudkms.admin: [group:sec@acme.com]
        lake:
          - name: acme-raw
            project_id: sec
            location: EU
            iam:
              roles/storage.objectViewer: [serviceAccount:ci@tooling.iam.gserviceaccount.com]
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "kms_main", "project_id"),
            "${module.prj_sec.project_id}"
        );
        let keys = &backend.find("kms_main").unwrap().construct.fields["keys"];
        assert_eq!(
            keys.get("disk").unwrap().get("iam").unwrap().to_string(),
            r#"{"roles/cloudkms.cryptoKeyEncrypterDecrypter":["serviceAccount:${google_service_account.sa_ci_tooling.email}"]}"#
        );
        assert!(stack.registry.contains(&Bucket::Kms, "main"));

        assert_eq!(
            field(&backend, "gcs_acme-raw", "iam"),
            r#"{"roles/storage.objectViewer":["serviceAccount:${google_service_account.sa_ci_tooling.email}"]}"#
        );
        assert!(stack.registry.contains(&Bucket::Gcs, "acme-raw"));
    }

    #[test]
    fn fabric_key_ring_needs_a_name() {
        let document = config_document! {r#"
        eztf:
          stacks:
            sec:
              - keys: ff_kms
        keys:
          - project_id: sec
            keyring:
              location: europe-west1
        "#};

        let result = build_stack(&document, "sec", &mut HclBackend::default());
        match result {
            Err(BuildError::MissingField { range, key }) => {
                assert_eq!(range, "keys");
                assert_eq!(key, "keyring.name");
            }
            other => panic!("expected a missing key ring name, got {other:?}"),
        }
    }

    #[test]
    fn parallelstore_in_network() {
        let document = config_document! {r#"
        eztf:
          stacks:
            hpc:
              - nets: network
              - fs: parallelstore
        nets:
          - network_name: hpc
            project_id: compute
        fs:
          - instance_id: scratch
            project: compute
            location: europe-west4-b
            capacity_gib: 12000
            network: hpc
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "parallelstore_scratch", "network"),
            "${module.nw_hpc.network_self_link}"
        );
        assert_eq!(field(&backend, "parallelstore_scratch", "project"), "compute");
        assert!(stack.registry.contains(&Bucket::Parallelstore, "scratch"));
    }
}
