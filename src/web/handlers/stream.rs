//! Live spot stream over server-sent events.

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::services::{FilterParams, SpotFilter};
use crate::web::AppState;
use crate::web::session::{LiveSession, SseSink};

/// Events buffered between the session task and the HTTP body
const EVENT_BUFFER: usize = 64;

pub async fn live_stream(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Sse<ReceiverStream<Result<Event, Infallible>>> {
    let filter = SpotFilter::from_params(&params, &state.config.bands);
    let (sender, receiver) = mpsc::channel(EVENT_BUFFER);

    let session = LiveSession::new(
        state.broadcaster.subscribe(),
        filter,
        SseSink::new(sender),
        state.config.stream_poll_interval,
        state.config.stream_keepalive_interval,
    );
    tokio::spawn(session.run());

    Sse::new(ReceiverStream::new(receiver))
}
