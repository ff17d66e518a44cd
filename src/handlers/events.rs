//! Realtime stream. One SSE connection per dashboard; frames carry the
//! serialized event envelope the hub fanned out for this tenant.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::auth::CurrentUser;
use crate::errors::ServiceError;
use crate::AppState;

/// Authed but outside the feature gates: the stream feeds every screen's
/// notification bell, so it is tied to tenant standing, not one feature.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", get(subscribe))
}

fn event_stream(
    receiver: mpsc::Receiver<String>,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        let payload = receiver.recv().await?;
        Some((Ok(SseEvent::default().data(payload)), receiver))
    })
}

/// Subscribe to the tenant's event stream
#[utoipa::path(
    get,
    path = "/api/v1/events",
    summary = "Event stream",
    description = "Server-sent events scoped to the caller's restaurant. Slow consumers lose frames rather than stalling the hub.",
    responses(
        (status = 200, description = "text/event-stream of event envelopes"),
        (status = 403, description = "No restaurant account or tenant not active", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn subscribe(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServiceError> {
    let restaurant_id = user.tenant_id()?;
    if user.tenant_status.as_deref() != Some("active") {
        return Err(ServiceError::Forbidden(
            "The restaurant account is not active".to_string(),
        ));
    }

    let receiver = state.hub.subscribe(restaurant_id, user.user_id);
    Ok(Sse::new(event_stream(receiver)).keep_alive(KeepAlive::default()))
}
