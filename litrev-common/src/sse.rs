//! Server-Sent Events (SSE) utilities
//!
//! Turns an [`EventBus`](crate::events::EventBus) subscription into an SSE
//! response, forwarding only the events a client subscribed to.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::events::LitrevEvent;

/// Heartbeat interval for idle streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// When a filtered stream ends on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Stream until the client disconnects
    Never,
    /// Close after forwarding a terminal job update
    AfterTerminalJobUpdate,
}

fn to_sse_event(event: &LitrevEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event.event_type(), e);
            None
        }
    }
}

/// Build an SSE response from a bus subscription
///
/// `initial` events are sent first (current row snapshots), then every bus
/// event accepted by `filter`. Subscribe *before* reading the snapshot so no
/// update falls between the two.
pub fn filtered_event_stream<F>(
    label: String,
    mut rx: broadcast::Receiver<LitrevEvent>,
    initial: Vec<LitrevEvent>,
    filter: F,
    end: StreamEnd,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&LitrevEvent) -> bool + Send + 'static,
{
    info!("New SSE client connected to {}", label);

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        for event in initial {
            let terminal = event.is_terminal_job_update();
            if let Some(sse_event) = to_sse_event(&event) {
                yield Ok(sse_event);
            }
            if terminal && end == StreamEnd::AfterTerminalJobUpdate {
                debug!("SSE: {} already terminal, closing stream", label);
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if !filter(&event) {
                                continue;
                            }
                            let terminal = event.is_terminal_job_update();
                            if let Some(sse_event) = to_sse_event(&event) {
                                yield Ok(sse_event);
                            }
                            if terminal && end == StreamEnd::AfterTerminalJobUpdate {
                                info!("SSE: {} reached terminal status, closing stream", label);
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: {} lagged, {} events skipped", label, skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("SSE: event bus closed, ending {}", label);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
