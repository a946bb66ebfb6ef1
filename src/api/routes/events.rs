//! Push-notice stream over server-sent events.

use crate::proto::Notice;
use axum::{
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use axum::extract::State;
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast;
use tracing::warn;

pub fn router(notices: broadcast::Sender<Notice>) -> Router {
    Router::new()
        .route("/events", get(events))
        .with_state(notices)
}

async fn events(
    State(notices): State<broadcast::Sender<Notice>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = notices.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notice) => match Event::default().json_data(&notice) {
                    Ok(event) => return Some((Ok::<_, Infallible>(event), rx)),
                    Err(e) => {
                        warn!("Failed to encode notice: {e}");
                        continue;
                    }
                },
                // A lagged consumer re-queries /state anyway.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Notice stream lagged, skipped {skipped}");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
