use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use events::{EventBus, EventEnvelope};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::state::AppState;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;
pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Only forward events of this run. State and export events always pass.
    pub run_id: Option<Uuid>,
}

/// Recent envelopes kept for `Last-Event-ID` replay.
pub struct EventBuffer {
    events: VecDeque<EventEnvelope>,
    max_size: usize,
}

impl EventBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, envelope: EventEnvelope) {
        if self.events.len() >= self.max_size {
            self.events.pop_front();
        }
        self.events.push_back(envelope);
    }

    pub fn events_after(&self, event_id: Uuid) -> Vec<EventEnvelope> {
        self.events
            .iter()
            .skip_while(|envelope| envelope.id != event_id)
            .skip(1)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub type SharedEventBuffer = Arc<RwLock<EventBuffer>>;

/// Copy every published envelope into `buffer` for the lifetime of the bus.
pub fn spawn_recorder(bus: &EventBus, buffer: SharedEventBuffer) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => buffer
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event recorder lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn matches_run(envelope: &EventEnvelope, run_id: Option<Uuid>) -> bool {
    match (run_id, envelope.event.run_id()) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
    }
}

fn envelope_to_sse_event(envelope: &EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.id.to_string())
        .event(envelope.event.name())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "SSE stream of run, step and state events"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
    headers: axum::http::HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let run_id = query.run_id;
    let last_event_id = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<Uuid>().ok());

    let rx = state.event_bus.subscribe();

    let missed_events = match last_event_id {
        Some(event_id) => state
            .event_buffer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .events_after(event_id),
        None => vec![],
    };

    let missed_stream = futures::stream::iter(
        missed_events
            .into_iter()
            .filter(move |envelope| matches_run(envelope, run_id))
            .map(|envelope| envelope_to_sse_event(&envelope)),
    );

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(envelope) if matches_run(&envelope, run_id) => Some(envelope_to_sse_event(&envelope)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("SSE broadcast error: {:?}", e);
                None
            }
        }
    });

    Sse::new(missed_stream.chain(live_stream)).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
