//! Orchestration: orders the registered steps and runs them, one at a time, to completion.
//!
//! [`StepGraph`] validates the registry and derives a topological order. Edges
//! come from each step's explicit `depends_on` and from its `reads`: a step
//! reading entities of a type (or a slot) runs after every step declaring that
//! type (or publishing that slot). Ties are broken by registration order, so
//! the order is deterministic.
//!
//! [`collect`] walks that order under a `collect` span carrying the run id.
//! Disabled steps are reported and skipped; a step denied by IAM is reported
//! as `MissingPermission` and its dependents run against whatever is present.
//! The first other failure aborts the run; entities written until then stay in
//! the job state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

use crate::config::CollectorConfig;
use crate::contract::EventPublisher;
use crate::error::{CollectionError, GraphError};
use crate::events::{MissingPermissionEvent, RecordingEventPublisher};
use crate::job_state::{GraphDocument, InMemoryJobState};
use crate::steps::{
    all_steps, execute_step, ApiClients, Artifact, StepContext, StepDescriptor, StepOutcome,
};

#[derive(Debug)]
pub struct StepGraph {
    steps: Vec<StepDescriptor>,
    order: Vec<usize>,
}

impl StepGraph {
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self, GraphError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.id, i).is_some() {
                return Err(GraphError::DuplicateStep(step.id.to_string()));
            }
        }

        // dependencies[i] = steps that must finish before step i
        let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); steps.len()];
        for (i, step) in steps.iter().enumerate() {
            for dep in &step.depends_on {
                let &j = index.get(dep).ok_or_else(|| GraphError::UnknownDependency {
                    step: step.id.to_string(),
                    dependency: dep.to_string(),
                })?;
                dependencies[i].insert(j);
            }
            for artifact in &step.reads {
                for (j, producer) in steps.iter().enumerate() {
                    let produces = match artifact {
                        Artifact::Entities(entity_type) => producer.declares_entity(entity_type),
                        Artifact::Slot(slot) => producer.publishes_slot(slot),
                    };
                    if produces && j != i {
                        dependencies[i].insert(j);
                    }
                }
            }
        }

        let order = topological_order(&dependencies).map_err(|stuck| {
            GraphError::Cycle(stuck.into_iter().map(|i| steps[i].id.to_string()).collect())
        })?;
        Ok(Self { steps, order })
    }

    /// Steps in execution order.
    pub fn ordered(&self) -> impl Iterator<Item = &StepDescriptor> {
        self.order.iter().map(|&i| &self.steps[i])
    }

    pub fn step_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.id).collect()
    }
}

/// Kahn's algorithm, always taking the lowest ready index. On a cycle, returns
/// the indices that could not be scheduled.
fn topological_order(dependencies: &[BTreeSet<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let mut remaining: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..dependencies.len())
        .filter(|&i| remaining[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(dependencies.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for (i, deps) in dependencies.iter().enumerate() {
            if deps.contains(&next) {
                remaining[i] -= 1;
                if remaining[i] == 0 {
                    ready.insert(i);
                }
            }
        }
    }

    if order.len() == dependencies.len() {
        Ok(order)
    } else {
        Err((0..dependencies.len()).filter(|i| !order.contains(i)).collect())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step_id: String,
    pub outcome: StepOutcome,
    #[serde(with = "millis")]
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub run_id: String,
    pub steps: Vec<StepReport>,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub missing_permissions: Vec<MissingPermissionEvent>,
}

impl CollectionReport {
    pub fn outcome_of(&self, step_id: &str) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.step_id == step_id)
            .map(|s| s.outcome)
    }
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

/// Side channel for report figures the executor cannot read through the
/// `JobState`/`EventPublisher` traits.
pub trait RunObserver {
    fn entity_count(&self) -> usize;
    fn relationship_count(&self) -> usize;
    fn missing_permissions(&self) -> Vec<MissingPermissionEvent>;
}

/// Observer over the bundled in-memory job state and recording publisher.
pub struct InMemoryObserver<'a, P> {
    pub state: &'a InMemoryJobState,
    pub events: &'a RecordingEventPublisher<P>,
}

impl<P: EventPublisher> RunObserver for InMemoryObserver<'_, P> {
    fn entity_count(&self) -> usize {
        self.state.entity_count()
    }

    fn relationship_count(&self) -> usize {
        self.state.relationship_count()
    }

    fn missing_permissions(&self) -> Vec<MissingPermissionEvent> {
        self.events.events()
    }
}

/// Validates `config`, runs the full registry against an in-memory job state
/// and returns the report together with the collected graph.
pub async fn collect_in_memory(
    config: CollectorConfig,
    clients: ApiClients,
) -> Result<(CollectionReport, GraphDocument), CollectionError> {
    let graph = StepGraph::new(all_steps())?;
    config.validate(&graph.step_ids())?;

    let state = Arc::new(InMemoryJobState::new());
    let events = Arc::new(RecordingEventPublisher::new());
    let ctx = StepContext::new(config, state.clone(), events.clone(), clients);

    let observer = InMemoryObserver {
        state: &state,
        events: &events,
    };
    let report = collect(&graph, &ctx, &observer).await?;
    Ok((report, state.to_document()))
}

/// Runs every step of `graph` in order against `ctx`.
pub async fn collect(
    graph: &StepGraph,
    ctx: &StepContext,
    observer: &dyn RunObserver,
) -> Result<CollectionReport, CollectionError> {
    let span = info_span!(
        "collect",
        run_id = %ctx.run_id,
        project_id = %ctx.config.project_id
    );
    async {
        info!(steps = graph.order.len(), "Starting collection");
        let mut reports = Vec::with_capacity(graph.order.len());

        for step in graph.ordered() {
            let started = Instant::now();
            let outcome = if ctx.config.is_disabled(step.id) {
                info!(step_id = step.id, "Step disabled by configuration");
                StepOutcome::Disabled
            } else {
                let result = execute_step(step, ctx)
                    .instrument(info_span!("step", step_id = step.id))
                    .await;
                match result {
                    Ok(outcome) => outcome,
                    Err(source) => {
                        error!(step_id = step.id, error = %source, "Step failed, aborting collection");
                        return Err(CollectionError::StepFailed {
                            step_id: step.id.to_string(),
                            source,
                        });
                    }
                }
            };
            let duration = started.elapsed();
            info!(step_id = step.id, ?outcome, elapsed_ms = duration.as_millis() as u64, "Step finished");
            reports.push(StepReport {
                step_id: step.id.to_string(),
                outcome,
                duration,
            });
        }

        let report = CollectionReport {
            run_id: ctx.run_id.to_string(),
            steps: reports,
            entity_count: observer.entity_count(),
            relationship_count: observer.relationship_count(),
            missing_permissions: observer.missing_permissions(),
        };
        info!(
            entities = report.entity_count,
            relationships = report.relationship_count,
            missing_permissions = report.missing_permissions.len(),
            "Collection complete"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}
