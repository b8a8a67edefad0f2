//! Shared handle to the active project's state.

use std::sync::Arc;

use devcrew_core::{ProjectState, ProjectSummary, StateField, StateWrite};
use events::{Event, EventBus};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Cloneable handle over the single live [`ProjectState`].
///
/// Every access goes through one `RwLock`, so readers never observe a reset or
/// a write halfway through.
#[derive(Clone, Default)]
pub struct ProjectStateStore {
    inner: Arc<RwLock<ProjectState>>,
    event_bus: Option<EventBus>,
}

impl ProjectStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub async fn get(&self, field: StateField) -> Option<String> {
        self.inner.read().await.get(field).map(str::to_string)
    }

    pub async fn set(&self, field: StateField, value: impl Into<String>) {
        let version = {
            let mut state = self.inner.write().await;
            state.set(field, value);
            state.version
        };
        debug!(field = %field, version, "Project state field updated");
        self.emit_updated(field.as_str(), version);
    }

    pub async fn code_module(&self, name: &str) -> Option<String> {
        self.inner.read().await.code_modules.get(name).cloned()
    }

    pub async fn set_code_module(&self, name: impl Into<String>, content: impl Into<String>) {
        let name = name.into();
        let version = {
            let mut state = self.inner.write().await;
            state.set_code_module(name.clone(), content);
            state.version
        };
        debug!(module = %name, version, "Code module stored");
        self.emit_updated(&format!("code_modules.{name}"), version);
    }

    pub async fn apply(&self, write: StateWrite) {
        match write {
            StateWrite::Field { field, value } => self.set(field, value).await,
            StateWrite::CodeModule { name, content } => self.set_code_module(name, content).await,
        }
    }

    /// Clear every artifact. Calling it twice is the same as calling it once.
    pub async fn reset_all(&self) {
        let version = {
            let mut state = self.inner.write().await;
            state.clear();
            state.version
        };
        info!(version, "Project state reset");
        self.emit(Event::StateReset { version });
    }

    /// Reset and name the new project inside one critical section.
    pub async fn start_project(&self, name: impl Into<String>) {
        let name = name.into();
        let version = {
            let mut state = self.inner.write().await;
            state.clear();
            state.set(StateField::CurrentProject, name.clone());
            state.version
        };
        info!(project = %name, version, "Project started");
        self.emit(Event::StateReset { version });
        self.emit_updated(StateField::CurrentProject.as_str(), version);
    }

    /// Replace the state with `base` plus `writes` applied in order.
    ///
    /// Used by the concurrent scheduler so the final state matches what a
    /// sequential pass over the same writes would have produced.
    pub async fn replay(&self, base: ProjectState, writes: impl IntoIterator<Item = StateWrite>) {
        let mut state = self.inner.write().await;
        *state = base;
        for write in writes {
            state.apply(write);
        }
    }

    /// Owned copy, detached from later mutations.
    pub async fn snapshot(&self) -> ProjectState {
        self.inner.read().await.clone()
    }

    pub async fn summary(&self) -> ProjectSummary {
        self.inner.read().await.summary()
    }

    fn emit_updated(&self, key: &str, version: u64) {
        self.emit(Event::StateUpdated {
            key: key.to_string(),
            version,
        });
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }
}

impl std::fmt::Debug for ProjectStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStateStore")
            .field("has_event_bus", &self.event_bus.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_after_set() {
        let store = ProjectStateStore::new();
        store.set(StateField::Requirements, "reqs").await;
        let before = store.snapshot().await;

        store.set(StateField::Architecture, "hexagonal").await;
        let after = store.snapshot().await;

        assert_eq!(after.get(StateField::Architecture), Some("hexagonal"));
        assert_eq!(after.get(StateField::Requirements), Some("reqs"));
        assert_eq!(after.get(StateField::DeploymentPlan), None);
        assert_eq!(before.get(StateField::Architecture), None);
    }

    #[tokio::test]
    async fn test_reset_all_twice_matches_once() {
        let store = ProjectStateStore::new();
        store.set(StateField::CurrentProject, "blog").await;
        store.set_code_module("posts", "...").await;

        store.reset_all().await;
        let once = store.snapshot().await;
        store.reset_all().await;
        let twice = store.snapshot().await;

        assert!(once.is_empty());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_start_project_discards_previous_modules() {
        let store = ProjectStateStore::new();
        store.start_project("first").await;
        store.set_code_module("auth", "a").await;
        store.set_code_module("billing", "b").await;

        store.start_project("second").await;

        let state = store.snapshot().await;
        assert!(state.code_modules.is_empty());
        assert_eq!(state.get(StateField::CurrentProject), Some("second"));
    }

    #[tokio::test]
    async fn test_replay_applies_writes_in_order() {
        let store = ProjectStateStore::new();
        let base = store.snapshot().await;
        store.set_code_module("b", "late").await;
        store.set_code_module("a", "early").await;

        store
            .replay(
                base,
                vec![
                    StateWrite::CodeModule {
                        name: "a".to_string(),
                        content: "early".to_string(),
                    },
                    StateWrite::CodeModule {
                        name: "b".to_string(),
                        content: "late".to_string(),
                    },
                ],
            )
            .await;

        let names: Vec<_> = store.snapshot().await.code_modules.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_state_events_are_published() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let store = ProjectStateStore::new().with_event_bus(bus);

        store.set(StateField::Architecture, "layers").await;

        let envelope = rx.recv().await.unwrap();
        match envelope.event {
            Event::StateUpdated { key, version } => {
                assert_eq!(key, "architecture");
                assert_eq!(version, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
