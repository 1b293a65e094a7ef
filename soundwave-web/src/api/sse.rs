//! Server-Sent Events subscriber stream
//!
//! Each connection to `/events` becomes one registered subscriber. The
//! registration guard lives inside the response stream, so the subscriber
//! is removed as soon as the client goes away and the stream is dropped.
//! Once the registry is closed for shutdown, new connections get a stream
//! that ends immediately.

use crate::api::server::AppContext;
use crate::fanout::{subscriber_channel, HubMessage, RegistrationGuard};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use soundwave_common::SubscriberId;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// GET /events - SSE frame stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let id = SubscriberId::new();
    let (tx, mut rx) = subscriber_channel(ctx.config.subscriber_queue);
    let guard = RegistrationGuard::register(Arc::clone(&ctx.state.registry), id, tx).await;

    if guard.is_accepted() {
        info!(
            "Subscriber {} connected, total subscribers: {}",
            id,
            ctx.state.registry.len().await
        );
    } else {
        // Stream ends right away: the sender was dropped with the refusal
        info!("Shutting down, subscriber {} refused", id);
    }

    let stream = async_stream::stream! {
        let _guard = guard;

        while let Some(message) = rx.recv().await {
            if let Some(event) = to_event(&message) {
                yield Ok::<_, Infallible>(event);
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert a hub message into an SSE event
///
/// Frames carry a JSON array of integers and use the block sequence as the
/// event id.
pub fn to_event(message: &HubMessage) -> Option<Event> {
    let event = Event::default().event(message.event_name());

    let result = match message {
        HubMessage::Frame { sequence, frame, .. } => {
            event.id(sequence.to_string()).json_data(frame.values())
        }
        HubMessage::Chat(chat) => event.json_data(chat),
    };

    match result {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", message.event_name(), e);
            None
        }
    }
}
