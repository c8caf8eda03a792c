/// # gcloud-graph CLI interface
///
/// Command parsing and the async entrypoint [`run`], used by `main` and by the
/// integration tests. Everything beyond argument handling, report printing and
/// writing the graph file lives in `gcloud-graph-core`.
///
/// ## Commands
/// - `collect --config <yaml> [--output <graph.json>]`: run every step and write the graph.
/// - `steps`: print the step registry in execution order.
use crate::load_config::load_config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gcloud_graph_core::client::GoogleHttpClient;
use gcloud_graph_core::executor::{collect_in_memory, CollectionReport, StepGraph};
use gcloud_graph_core::job_state::GraphDocument;
use gcloud_graph_core::steps::{all_steps, ApiClients, Artifact};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for gcloud-graph: collect a Google Cloud project into an entity/relationship graph.
#[derive(Parser)]
#[clap(
    name = "gcloud-graph",
    version,
    about = "Collect App Engine, Storage, IAM and Cloud Functions resources into a typed graph"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect the project described by the config file
    Collect {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Where to write the graph JSON
        #[clap(long, default_value = "graph.json")]
        output: PathBuf,
    },
    /// List the collection steps in execution order
    Steps,
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Collect { config, output } => {
            let config = load_config(config)?;
            tracing::info!(command = "collect", project_id = %config.collector.project_id, "Starting collection");

            let http = GoogleHttpClient::new(&config.collector, config.access_token)
                .context("Failed to construct Google API client")?;
            let clients = ApiClients::from_http(Arc::new(http));

            match collect_in_memory(config.collector, clients).await {
                Ok((report, document)) => {
                    write_document(&output, &document)?;
                    print!("{}", render_report(&report, &output));
                    tracing::info!(command = "collect", output = ?output, "Collection complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "collect", error = %e, "Collection failed");
                    Err(anyhow::Error::new(e).context("Collection failed"))
                }
            }
        }
        Commands::Steps => {
            let graph = StepGraph::new(all_steps()).context("Step registry is invalid")?;
            print!("{}", render_steps(&graph));
            Ok(())
        }
    }
}

fn write_document(path: &Path, document: &GraphDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(document).context("Failed to serialize graph")?;
    fs::write(path, json).with_context(|| format!("Failed to write graph to {:?}", path))?;
    tracing::info!(
        path = ?path,
        entities = document.entities.len(),
        relationships = document.relationships.len(),
        "Graph written"
    );
    Ok(())
}

pub fn render_report(report: &CollectionReport, output: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Collection report (run {})", report.run_id);
    for step in &report.steps {
        let _ = writeln!(
            out,
            "  {:<52} {:?} ({} ms)",
            step.step_id,
            step.outcome,
            step.duration.as_millis()
        );
    }
    let _ = writeln!(
        out,
        "Entities: {}  Relationships: {}",
        report.entity_count, report.relationship_count
    );
    for event in &report.missing_permissions {
        let _ = writeln!(out, "Missing permission: {} (step {})", event.permission, event.step_id);
    }
    let _ = writeln!(out, "Graph written to {}", output.display());
    out
}

pub fn render_steps(graph: &StepGraph) -> String {
    let mut out = String::new();
    for step in graph.ordered() {
        let _ = writeln!(out, "{} ({})", step.id, step.name);
        if let Some(permission) = step.permission {
            let _ = writeln!(out, "  permission: {permission}");
        }
        if !step.depends_on.is_empty() {
            let _ = writeln!(out, "  depends on: {}", step.depends_on.join(", "));
        }
        for artifact in &step.reads {
            match artifact {
                Artifact::Entities(entity_type) => {
                    let _ = writeln!(out, "  reads entities: {entity_type}");
                }
                Artifact::Slot(slot) => {
                    let _ = writeln!(out, "  reads slot: {slot}");
                }
            }
        }
        for entity in &step.entities {
            let _ = writeln!(
                out,
                "  entity: {} [{}]",
                entity.entity_type, entity.entity_class
            );
        }
        for relationship in &step.relationships {
            let _ = writeln!(
                out,
                "  relationship: {} [{}]",
                relationship.relationship_type(),
                relationship.class.as_str()
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcloud_graph_core::events::MissingPermissionEvent;
    use gcloud_graph_core::executor::StepReport;
    use gcloud_graph_core::steps::StepOutcome;
    use std::time::Duration;

    #[test]
    fn steps_listing_shows_declared_outputs() {
        let graph = StepGraph::new(all_steps()).unwrap();
        let listing = render_steps(&graph);

        assert!(listing.starts_with("fetch-storage-buckets"));
        assert!(listing.contains("relationship: google_app_engine_application_uses_storage_bucket [USES]"));
        assert!(listing.contains("permission: appengine.versions.list"));
        assert!(listing.contains("reads slot: app_engine_application"));
    }

    #[test]
    fn report_lists_missing_permissions() {
        let report = CollectionReport {
            run_id: "run".into(),
            steps: vec![StepReport {
                step_id: "fetch-iam-bindings".into(),
                outcome: StepOutcome::MissingPermission,
                duration: Duration::from_millis(3),
            }],
            entity_count: 2,
            relationship_count: 1,
            missing_permissions: vec![MissingPermissionEvent::new(
                "fetch-iam-bindings",
                "cloudasset.assets.searchAllIamPolicies",
            )],
        };

        let text = render_report(&report, Path::new("out.json"));

        assert!(text.contains("MissingPermission (3 ms)"));
        assert!(text.contains("Entities: 2  Relationships: 1"));
        assert!(text.contains("Missing permission: cloudasset.assets.searchAllIamPolicies (step fetch-iam-bindings)"));
        assert!(text.ends_with("Graph written to out.json\n"));
    }
}
