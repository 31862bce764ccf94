//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/snapshot` | Displayed state of every location |
//! | `GET` | `/api/locations/{id}` | One location with baseline and bookkeeping |
//! | `GET` | `/api/baselines` | Non-fluctuated baseline figures |
//! | `GET` | `/health` | Stale-worker check |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use uwcrowd_types::{BaselineReport, HealthReport, LocationView, Snapshot};

use crate::error::ObserverError;
use crate::state::AppState;

/// Return the current snapshot, shaped exactly like the published file.
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.store.snapshot().await)
}

/// Return one location.
///
/// The id is matched exactly first, then ignoring ASCII case, so
/// `/api/locations/e7` finds `E7`.
pub async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LocationView>, ObserverError> {
    if let Some(view) = state.store.view(&id).await {
        return Ok(Json(view));
    }

    let folded = state.store.ids().find(|known| known.matches(&id)).cloned();
    match folded {
        Some(known) => state
            .store
            .view(known.as_str())
            .await
            .map(Json)
            .ok_or(ObserverError::LocationNotFound { id }),
        None => Err(ObserverError::LocationNotFound { id }),
    }
}

/// Return the baseline report computed at startup.
pub async fn get_baselines(State(state): State<Arc<AppState>>) -> Json<BaselineReport> {
    Json(state.baselines.clone())
}

/// Report whether every worker is still updating.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.health_at(Utc::now()).await)
}
