//! Live progress for a single prediction job.
//!
//! The page picks a job id before submitting and listens on
//! `/api/events?job=<id>`; only that job's events are forwarded.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use cholinease_bioactivity::PipelineEvent;
use futures_core::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;
use uuid::Uuid;

use crate::state::SharedState;

pub const PROGRESS_EVENT: &str = "progress";

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub job: Uuid,
}

fn progress_frame(event: &PipelineEvent) -> Option<Event> {
    let data = serde_json::to_string(event).ok()?;
    Some(Event::default().event(PROGRESS_EVENT).id(event.job_id().to_string()).data(data))
}

pub async fn job_events(
    State(state): State<SharedState>,
    Query(query): Query<JobQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Client subscribed to progress of job {}", query.job);
    let job = query.job;

    // a lagged receiver skips what it missed; the final page render still has everything
    let stream = BroadcastStream::new(state.subscribe())
        .filter_map(move |received| received.ok().filter(|event| event.job_id() == job))
        .filter_map(|event| progress_frame(&event).map(Ok));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
