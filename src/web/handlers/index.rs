//! Snapshot page of the retained spot log.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::services::{FilterParams, SpotFilter};
use crate::web::AppState;
use crate::web::render::{IndexTemplate, render_rows};

/// Render every retained spot that passes the filter, newest first
pub async fn spot_log(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Response {
    let filter = SpotFilter::from_params(&params, &state.config.bands);
    let snapshot = state.store.snapshot();
    let rows = render_rows(snapshot.iter().rev(), &filter);

    let page = IndexTemplate {
        country: state.config.country,
        bands: state.config.bands.join(", "),
        retained: snapshot.len(),
        shown: rows.len(),
        filter_bands: filter.bands.join(","),
        filter_modes: filter.modes.join(","),
        filter_locator: filter.locator.as_deref().unwrap_or_default(),
        filter_callsign: filter.callsign.as_deref().unwrap_or_default(),
        rows: &rows,
    };

    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render spot log page");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render spot log").into_response()
        }
    }
}
