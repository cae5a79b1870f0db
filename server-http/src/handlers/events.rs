use crate::state::AppState;
use axum::{
    extract::State,
    http::Uri,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use keygrid::events::{CacheEvent, InvalidationSource};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Clone, Debug)]
pub struct EventFilter {
    source: Vec<String>,
}

impl EventFilter {
    /// Parse query string with CSV support for multiple values
    /// Example: ?source=local,remote
    fn from_query_string(query: &str) -> Self {
        let mut source = Vec::new();

        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                if key == "source" {
                    source.extend(value.split(',').map(|s| s.trim().to_string()));
                }
            }
        }

        Self { source }
    }
}

/// SSE endpoint that streams cache invalidation events to clients
pub async fn stream_events(
    State(state): State<AppState>,
    uri: Uri,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = uri
        .query()
        .map(EventFilter::from_query_string)
        .unwrap_or_else(|| EventFilter { source: Vec::new() });

    tracing::info!(filters = ?filter.source, "new SSE client connected");

    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx);

    let filtered_stream = stream.filter_map(move |result| {
        let filter_clone = filter.clone();
        async move {
            match result {
                Ok(event) => {
                    if should_send(&event, &filter_clone) {
                        Some(Ok(to_sse_event(event)))
                    } else {
                        None
                    }
                }
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                    Some(Ok(Event::default()
                        .event("error")
                        .data(format!("Lagged by {} events", n))))
                }
            }
        }
    });

    Sse::new(filtered_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Check if an event should be sent based on the filter criteria
fn should_send(event: &CacheEvent, filter: &EventFilter) -> bool {
    if filter.source.is_empty() {
        return true;
    }

    let source = match event.source() {
        InvalidationSource::Local => "local",
        InvalidationSource::Remote => "remote",
    };
    filter.source.iter().any(|s| s == source)
}

/// Convert a CacheEvent to an SSE Event
fn to_sse_event(event: CacheEvent) -> Event {
    match event {
        CacheEvent::Invalidated(e) => Event::default()
            .event("key.invalidated")
            .json_data(e)
            .unwrap(),
    }
}
