//! Missing-permission events and the bundled publishers.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::contract::EventPublisher;

/// Published when a step stops because the caller lacks `permission`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingPermissionEvent {
    pub permission: String,
    pub step_id: String,
}

impl MissingPermissionEvent {
    pub fn new(step_id: &str, permission: &str) -> Self {
        Self {
            permission: permission.to_string(),
            step_id: step_id.to_string(),
        }
    }

    pub fn description(&self) -> String {
        format!(
            "Missing a required permission to collect data for step \"{}\". Grant \"{}\" to the collector principal.",
            self.step_id, self.permission
        )
    }
}

/// Emits every event as a structured `warn!`.
#[derive(Debug, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish_missing_permission(&self, event: MissingPermissionEvent) {
        warn!(
            step_id = %event.step_id,
            permission = %event.permission,
            "{}",
            event.description()
        );
    }
}

/// Keeps events in memory (for the run report) and forwards them to an inner publisher.
pub struct RecordingEventPublisher<P = LogEventPublisher> {
    inner: P,
    events: Mutex<Vec<MissingPermissionEvent>>,
}

impl RecordingEventPublisher<LogEventPublisher> {
    pub fn new() -> Self {
        Self::wrapping(LogEventPublisher)
    }
}

impl Default for RecordingEventPublisher<LogEventPublisher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: EventPublisher> RecordingEventPublisher<P> {
    pub fn wrapping(inner: P) -> Self {
        Self {
            inner,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<MissingPermissionEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl<P: EventPublisher> EventPublisher for RecordingEventPublisher<P> {
    async fn publish_missing_permission(&self, event: MissingPermissionEvent) {
        self.events.lock().push(event.clone());
        self.inner.publish_missing_permission(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockEventPublisher;

    #[test]
    fn event_serializes_with_camel_case_step_id() {
        let event = MissingPermissionEvent::new("fetch-iam-bindings", "cloudasset.assets.searchAllIamPolicies");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "permission": "cloudasset.assets.searchAllIamPolicies",
                "stepId": "fetch-iam-bindings",
            })
        );
    }

    #[tokio::test]
    async fn recording_publisher_keeps_and_forwards_events() {
        let mut inner = MockEventPublisher::new();
        inner
            .expect_publish_missing_permission()
            .withf(|e| e.step_id == "fetch-app-engine-application")
            .times(1)
            .return_const(());

        let publisher = RecordingEventPublisher::wrapping(inner);
        publisher
            .publish_missing_permission(MissingPermissionEvent::new(
                "fetch-app-engine-application",
                "appengine.applications.get",
            ))
            .await;

        assert_eq!(publisher.events().len(), 1);
        assert_eq!(publisher.events()[0].permission, "appengine.applications.get");
    }
}
