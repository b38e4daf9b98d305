//! Server-Sent Events framing for AG-UI runs

use crate::ag_ui;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Stream run events as `data:` frames until the run task drops its sender
pub fn sse_stream(
    rx: mpsc::Receiver<ag_ui::Event>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = ReceiverStream::new(rx).map(|event| Ok(to_sse_event(event)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_sse_event(event: ag_ui::Event) -> Event {
    let event_type = event.event_type();
    let stamped = event.with_timestamp(ag_ui::Event::now_millis());
    match serde_json::to_string(&stamped) {
        Ok(data) => Event::default().data(data),
        Err(e) => {
            tracing::error!(error = %e, event_type, "Failed to serialize event");
            Event::default().comment("serialization failed")
        }
    }
}
