//! log sinks, their destinations and monitoring scopes
//!
//! A sink and its destination reference each other: the sink exports to the destination URI, the destination grants
//! the sink's writer identity access. Sinks are known from the prepass, so destinations built before their sink can
//! still point at it.
use super::{fabric_module, BuildResult};
use crate::address::Address;
use crate::backend::Construct;
use crate::registry::Bucket;
use crate::stack::{required, BuildError, StackContext};
use crate::util::block_id;
use crate::value::Value;
use indexmap::IndexMap;

const LOG_EXPORT: &str = "terraform-google-modules/log-export/google";
const LOG_EXPORT_VERSION: &str = "~> 10.0";
const DEFAULT_WRITER_IDENTITY: &str = "serviceAccount:cloud-logs@system.gserviceaccount.com";
const MONITORING_API: &str = "monitoring.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestinationType {
    PubSub,
    Storage,
    LogBucket,
    BigQuery,
    Project,
}

impl LogDestinationType {
    /// Destination type of a kind, only the full `log*` names count
    pub fn from_key(key: &str) -> Option<Self> {
        let destination = match key {
            "logpubsub" => Self::PubSub,
            "logstorage" => Self::Storage,
            "logbucket" => Self::LogBucket,
            "logbigquery" => Self::BigQuery,
            "logproject" => Self::Project,
            _ => return None,
        };
        Some(destination)
    }

    /// Destination key next to a `logsink`, which also has the short `pubsub`, `storage`, `bigquery` and `project`
    fn from_inline_key(key: &str) -> Option<Self> {
        let destination = match key {
            "pubsub" => Self::PubSub,
            "storage" => Self::Storage,
            "bigquery" => Self::BigQuery,
            "project" => Self::Project,
            _ => return Self::from_key(key),
        };
        Some(destination)
    }

    pub fn kind(self) -> &'static str {
        match self {
            Self::PubSub => "logpubsub",
            Self::Storage => "logstorage",
            Self::LogBucket => "logbucket",
            Self::BigQuery => "logbigquery",
            Self::Project => "logproject",
        }
    }

    /// Key naming a destination item
    fn name_key(self) -> &'static str {
        match self {
            Self::PubSub => "topic_name",
            Self::Storage => "storage_bucket_name",
            Self::LogBucket => "name",
            Self::BigQuery => "dataset_name",
            Self::Project => "project_id",
        }
    }

    fn source(self) -> String {
        let module = match self {
            Self::PubSub => "pubsub",
            Self::Storage => "storage",
            Self::LogBucket => "logbucket",
            Self::BigQuery => "bigquery",
            Self::Project => "project",
        };
        format!("{LOG_EXPORT}//modules/{module}")
    }
}

fn sink_module(sink_name: &str) -> String {
    format!("logsink-{sink_name}")
}

fn writer_identity(sink_name: &str) -> Value {
    Address::module(&block_id(&sink_module(sink_name)))
        .attr("writer_identity")
        .into()
}

/// `parent_resource_id` resolved with `parent_resource_type` as kind
fn resolve_sink_parent(ctx: &mut StackContext, sink: &mut Value) {
    let kind = sink.get_str("parent_resource_type").unwrap_or_default();
    let id = sink.get_str("parent_resource_id").unwrap_or_default();
    let parent = ctx.reference(&kind, &id);
    sink.insert("parent_resource_id", parent);
}

/// A sink together with its destination
///
/// Each item has a `logsink` and exactly one destination key, e.g. `storage` or `logstorage`.
pub fn centralized_logging(ctx: &mut StackContext, range: &str) -> BuildResult {
    for config in ctx.items(range) {
        let mut sink = config
            .get("logsink")
            .cloned()
            .ok_or_else(|| BuildError::MissingField {
                range: range.to_string(),
                key: "logsink".to_string(),
            })?;
        let (key, mut destination, destination_type) = config
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(key, _)| key.as_str() != "logsink")
            .find_map(|(key, value)| {
                LogDestinationType::from_inline_key(key).map(|t| (key.clone(), value.clone(), t))
            })
            .ok_or_else(|| BuildError::InvalidField {
                range: range.to_string(),
                key: "logsink".to_string(),
                problem: "has no log destination next to it".to_string(),
            })?;

        let sink_name = required(&sink, range, "log_sink_name")?;
        resolve_sink_parent(ctx, &mut sink);
        ctx.resolve_field(&mut destination, "project_id", "project");
        destination.insert("log_sink_writer_identity", writer_identity(&sink_name));

        let destination = ctx.construct(
            Construct::module(
                &format!("{key}-{sink_name}"),
                &destination_type.source(),
                Some(LOG_EXPORT_VERSION),
            )
            .fields(destination),
        );
        sink.insert("destination_uri", destination.output("destination_uri"));

        let handle = ctx.construct(
            Construct::module(&sink_module(&sink_name), LOG_EXPORT, Some(LOG_EXPORT_VERSION))
                .fields(sink),
        );
        ctx.register(Bucket::Logging, sink_name, handle)?;
    }
    Ok(())
}

/// Sinks exporting to a destination of another range, or to a project
pub fn log_sinks(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut sink in ctx.items(range) {
        let destination_kind = required(&sink, range, "log_destination_type")?;
        let sink_name = required(&sink, range, "log_sink_name")?;
        let destination_uri = required(&sink, range, "destination_uri")?;
        sink.remove("log_destination_type");

        if LogDestinationType::from_key(&destination_kind) == Some(LogDestinationType::Project) {
            let mut destination = Value::object();
            destination.insert("project_id", destination_uri.as_str());
            build_destination(ctx, range, destination, LogDestinationType::Project)?;
        }

        resolve_sink_parent(ctx, &mut sink);
        let uri = ctx.reference_or(
            "log_destination",
            &format!("{destination_kind}-{destination_uri}"),
            destination_uri.as_str(),
        );
        sink.insert("destination_uri", uri);

        let handle = ctx.construct(
            Construct::module(&sink_module(&sink_name), LOG_EXPORT, Some(LOG_EXPORT_VERSION))
                .fields(sink),
        );
        ctx.register(Bucket::LogSink, sink_name, handle)?;
    }
    Ok(())
}

pub fn log_destinations(
    ctx: &mut StackContext,
    range: &str,
    destination_type: LogDestinationType,
) -> BuildResult {
    for destination in ctx.items(range) {
        build_destination(ctx, range, destination, destination_type)?;
    }
    Ok(())
}

/// A destination grants write access to the sink exporting to it, or to the default logging identity
fn build_destination(
    ctx: &mut StackContext,
    range: &str,
    mut destination: Value,
    destination_type: LogDestinationType,
) -> BuildResult {
    let name = required(&destination, range, destination_type.name_key())?;
    let id = format!("{}-{name}", destination_type.kind());
    ctx.resolve_field(&mut destination, "project_id", "project");

    if !destination.has("log_sink_writer_identity") {
        let identity = match ctx.accumulators.log_destinations.get(&id) {
            Some(sink_name) => writer_identity(sink_name),
            None => Value::from(DEFAULT_WRITER_IDENTITY),
        };
        destination.insert("log_sink_writer_identity", identity);
    }

    let handle = ctx.construct(
        Construct::module(&id, &destination_type.source(), Some(LOG_EXPORT_VERSION))
            .fields(destination),
    );
    ctx.register(Bucket::LogDestination, id, handle)
}

/// Log buckets through the fabric `logging-bucket` module
///
/// `parent` is resolved with `parent_type` as kind, projects when the type is missing.
pub fn fabric_log_buckets(ctx: &mut StackContext, range: &str) -> BuildResult {
    for mut bucket in ctx.items(range) {
        let id = required(&bucket, range, "id")?;
        let parent_type = bucket
            .get_str("parent_type")
            .unwrap_or_else(|| "project".to_string());
        let node = bucket.get_str("parent").unwrap_or_default();
        let parent = ctx.reference(&parent_type, &node);
        bucket.insert("parent_type", parent_type);
        bucket.insert("parent", parent);

        let handle = ctx.construct(
            Construct::module(&format!("logbucket_{id}"), &fabric_module("logging-bucket"), None)
                .fields(bucket),
        );
        ctx.register(Bucket::Fabric("logbucket".to_string()), id, handle)?;
    }
    Ok(())
}

/// Metrics scopes: a scoping project monitoring a list of other projects
pub fn monitoring(ctx: &mut StackContext, range: &str) -> BuildResult {
    for scope in ctx.items(range) {
        let scoping = required(&scope, range, "scoping_project")?;
        let project = ctx.reference("project", &scoping);

        let api = ctx.construct(
            Construct::resource("google_project_service", &format!("mon_api_{scoping}"))
                .field("service", MONITORING_API)
                .field("project", project)
                .field("disable_on_destroy", false)
                .field("disable_dependent_services", false),
        );

        let monitored: IndexMap<String, Value> = scope
            .strings("monitored_project")
            .into_iter()
            .filter(|monitored| monitored != &scoping)
            .map(|monitored| {
                let reference = ctx.reference("project", &monitored);
                (monitored, reference)
            })
            .collect();
        let handle = ctx.construct(
            Construct::resource(
                "google_monitoring_monitored_project",
                &format!("ms_{scoping}"),
            )
            .field("for_each", Value::Object(monitored))
            .field("metrics_scope", api.output("project"))
            .field("name", Address::each_value()),
        );
        ctx.register(Bucket::Monitoring, scoping, handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config_document;
    use crate::resources::test::{build, field};
    use pretty_assertions::assert_eq;

    #[test]
    fn destination_keys() {
        assert_eq!(
            LogDestinationType::from_key("logpubsub"),
            Some(LogDestinationType::PubSub)
        );
        assert_eq!(
            LogDestinationType::from_key("logbucket"),
            Some(LogDestinationType::LogBucket)
        );
        assert_eq!(LogDestinationType::from_key("logsink"), None);
        for bare in ["project", "storage", "bucket", "pubsub", "bigquery"] {
            assert_eq!(LogDestinationType::from_key(bare), None, "{bare}");
        }

        assert_eq!(
            LogDestinationType::from_inline_key("pubsub"),
            Some(LogDestinationType::PubSub)
        );
        assert_eq!(
            LogDestinationType::from_inline_key("logstorage"),
            Some(LogDestinationType::Storage)
        );
        assert_eq!(LogDestinationType::from_inline_key("bucket"), None);
    }

    #[test]
    fn sinks_only_create_projects_for_logproject() {
        let document = config_document! {r#"
        eztf:
          stacks:
            logs:
              - sinks: logsink
        sinks:
          - log_sink_name: bare
            log_destination_type: project
            destination_uri: some-prj
            parent_resource_type: project
            parent_resource_id: app
          - log_sink_name: full
            log_destination_type: logproject
            destination_uri: central-prj
            parent_resource_type: project
            parent_resource_id: app
        "#};

        let (stack, backend) = build(&document);

        assert!(!stack
            .registry
            .contains(&Bucket::LogDestination, "logproject-some-prj"));
        assert!(stack
            .registry
            .contains(&Bucket::LogDestination, "logproject-central-prj"));
        assert_eq!(field(&backend, "logsink-bare", "destination_uri"), "some-prj");
    }

    #[test]
    fn destinations_grant_their_sink() {
        let document = config_document! {r#"
        eztf:
          stacks:
            logs:
              - buckets: logstorage
              - topics: logpubsub
              - sinks: logsink
        buckets:
          - storage_bucket_name: audit-logs
            project_id: logging-prj
        topics:
          - topic_name: unused
            project_id: logging-prj
        sinks:
          - log_sink_name: audit
            log_destination_type: logstorage
            destination_uri: audit-logs
            parent_resource_type: organization
            filter: logName:cloudaudit
          - log_sink_name: central
            log_destination_type: logproject
            destination_uri: central-prj
            parent_resource_type: folder
            parent_resource_id: /prod
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "logstorage-audit-logs", "log_sink_writer_identity"),
            "${module.logsink-audit.writer_identity}"
        );
        assert_eq!(
            field(&backend, "logpubsub-unused", "log_sink_writer_identity"),
            DEFAULT_WRITER_IDENTITY
        );
        assert_eq!(
            field(&backend, "logsink-audit", "destination_uri"),
            "${module.logstorage-audit-logs.destination_uri}"
        );
        assert_eq!(
            field(&backend, "logsink-audit", "parent_resource_id"),
            "${var.organization_id}"
        );
        assert!(!backend
            .find("logsink-audit")
            .unwrap()
            .construct
            .fields
            .contains_key("log_destination_type"));

        assert_eq!(
            field(&backend, "logproject-central-prj", "log_sink_writer_identity"),
            "${module.logsink-central.writer_identity}"
        );
        assert_eq!(
            field(&backend, "logsink-central", "destination_uri"),
            "${module.logproject-central-prj.destination_uri}"
        );
        assert_eq!(field(&backend, "logsink-central", "parent_resource_id"), "/prod");
        assert!(stack
            .registry
            .contains(&Bucket::LogDestination, "logproject-central-prj"));
    }

    #[test]
    fn sink_with_inline_destination() {
        let document = config_document! {r#"
        eztf:
          stacks:
            logs:
              - central: logging
        central:
          - logsink:
              log_sink_name: all
              parent_resource_type: project
              parent_resource_id: app
            bigquery:
              dataset_name: all_logs
              project_id: logging-prj
        "#};

        let (_, backend) = build(&document);

        assert_eq!(
            field(&backend, "bigquery-all", "log_sink_writer_identity"),
            "${module.logsink-all.writer_identity}"
        );
        assert_eq!(
            field(&backend, "logsink-all", "destination_uri"),
            "${module.bigquery-all.destination_uri}"
        );
        assert!(backend.position("bigquery-all") < backend.position("logsink-all"));
    }

    #[test]
    fn monitoring_scope_excludes_itself() {
        let document = config_document! {r#"
        eztf:
          stacks:
            mon:
              - scopes: monitoring
        scopes:
          - scoping_project: ops
            monitored_project: [ops, app, data]
        "#};

        let (_, backend) = build(&document);

        assert_eq!(
            field(&backend, "ms_ops", "for_each"),
            r#"{"app":"app","data":"data"}"#
        );
        assert_eq!(
            field(&backend, "ms_ops", "metrics_scope"),
            "${google_project_service.mon_api_ops.project}"
        );
    }

    #[test]
    fn fabric_log_buckets_resolve_their_parent() {
        let document = config_document! {r#"
        eztf:
          stacks:
            logs:
              - fldrs: folders
              - prjs: projects
              - buckets: ff_logbucket
        fldrs:
          prod: {}
        prjs:
          - name: logging
        buckets:
          - id: audit
            parent: logging
            location: europe-west1
          - id: prod-audit
            parent_type: folder
            parent: /prod
          - id: org-audit
            parent_type: organization
        "#};

        let (stack, backend) = build(&document);

        assert_eq!(
            field(&backend, "logbucket_audit", "parent"),
            "${module.prj_logging.project_id}"
        );
        assert_eq!(field(&backend, "logbucket_audit", "parent_type"), "project");
        assert_eq!(
            field(&backend, "logbucket_prod-audit", "parent"),
            "${google_folder.fldr_prod.name}"
        );
        assert_eq!(
            field(&backend, "logbucket_org-audit", "parent"),
            "${var.organization_id}"
        );
        assert!(stack
            .registry
            .contains(&Bucket::Fabric("logbucket".to_string()), "audit"));
    }
}
