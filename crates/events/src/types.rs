//! Event types for the DevCrew event system

use chrono::{DateTime, Utc};
use devcrew_core::WorkerKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Run events
    /// A validated plan started executing
    #[serde(rename = "run.started")]
    RunStarted {
        run_id: Uuid,
        project_name: String,
        total_steps: usize,
    },

    /// Every step was attempted, or the run stopped early
    #[serde(rename = "run.completed")]
    RunCompleted {
        run_id: Uuid,
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },

    /// Planning or validation aborted the run before any step ran
    #[serde(rename = "run.aborted")]
    RunAborted { run_id: Uuid, reason: String },

    // Step events
    #[serde(rename = "step.started")]
    StepStarted {
        run_id: Uuid,
        step_id: u32,
        worker: WorkerKind,
    },

    #[serde(rename = "step.succeeded")]
    StepSucceeded {
        run_id: Uuid,
        step_id: u32,
        worker: WorkerKind,
        duration_ms: u64,
    },

    #[serde(rename = "step.failed")]
    StepFailed {
        run_id: Uuid,
        step_id: u32,
        worker: WorkerKind,
        error: String,
    },

    // Project state events
    /// Every artifact was cleared
    #[serde(rename = "state.reset")]
    StateReset { version: u64 },

    /// An artifact was written by a step
    #[serde(rename = "state.updated")]
    StateUpdated { key: String, version: u64 },

    /// The project tree was exported to disk
    #[serde(rename = "project.exported")]
    ProjectExported { path: String, files: usize },

    // System events
    /// Generic error event
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// Run the event belongs to, if any
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            Event::RunStarted { run_id, .. }
            | Event::RunCompleted { run_id, .. }
            | Event::RunAborted { run_id, .. }
            | Event::StepStarted { run_id, .. }
            | Event::StepSucceeded { run_id, .. }
            | Event::StepFailed { run_id, .. } => Some(*run_id),
            Event::StateReset { .. }
            | Event::StateUpdated { .. }
            | Event::ProjectExported { .. }
            | Event::Error { .. } => None,
        }
    }

    /// Wire name used for the `type` tag and SSE event names
    pub fn name(&self) -> &'static str {
        match self {
            Event::RunStarted { .. } => "run.started",
            Event::RunCompleted { .. } => "run.completed",
            Event::RunAborted { .. } => "run.aborted",
            Event::StepStarted { .. } => "step.started",
            Event::StepSucceeded { .. } => "step.succeeded",
            Event::StepFailed { .. } => "step.failed",
            Event::StateReset { .. } => "state.reset",
            Event::StateUpdated { .. } => "state.updated",
            Event::ProjectExported { .. } => "project.exported",
            Event::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_uses_dotted_tag() {
        let event = Event::StepFailed {
            run_id: Uuid::new_v4(),
            step_id: 2,
            worker: WorkerKind::ResearchEngineer,
            error: "search unavailable".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step.failed");
        assert_eq!(json["worker"], "research_engineer");
        assert_eq!(json["type"], event.name());
    }

    #[test]
    fn test_run_id() {
        let run_id = Uuid::new_v4();
        let event = Event::StepStarted {
            run_id,
            step_id: 1,
            worker: WorkerKind::ProductAnalyst,
        };
        assert_eq!(event.run_id(), Some(run_id));
        assert_eq!(Event::StateReset { version: 3 }.run_id(), None);
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = EventEnvelope::new(Event::StateUpdated {
            key: "architecture".to_string(),
            version: 7,
        });
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, envelope.id);
        assert_eq!(parsed.event.name(), "state.updated");
    }
}
