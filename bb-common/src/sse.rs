//! Server-Sent Events (SSE) utilities

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::events::{BattleEvent, EventBus};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize one event as an SSE frame named after its type
pub fn to_sse_event(event: &BattleEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("SSE: failed to serialize {}: {}", event.event_type(), e);
            None
        }
    }
}

/// Stream bus events to one client
///
/// With `battle_id` set only that contest's events are forwarded. A client
/// that falls behind the bus capacity is sent `Resync` so it refetches the
/// standings instead of drawing from a partial history.
pub fn battle_event_stream(
    bus: Arc<EventBus>,
    battle_id: Option<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected (battle filter: {:?})", battle_id);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if battle_id.is_some_and(|id| id != event.battle_id()) {
                        continue;
                    }
                    if let Some(frame) = to_sse_event(&event) {
                        yield Ok(frame);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("SSE: client lagged by {} events", skipped);
                    yield Ok(Event::default().event("Resync").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => {
                    info!("SSE: event bus closed, ending stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}
