//! HTTP surface of the audit ledger: read the chain, check it, append to it.
pub mod error;

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use ledger_core::chain::{ChainFault, Ledger};
use ledger_core::store::RecordStore;
use ledger_core::Block;
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

pub use crate::error::AppError;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Validity {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ChainFault>,
}

/// Builds the router around an already initialized ledger.
pub fn router<S: RecordStore + 'static>(ledger: Arc<Ledger<S>>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/blockchain", get(chain::<S>))
        .route("/blockchain/", get(chain::<S>))
        .route("/blockchain/valid", get(validity::<S>))
        .route("/blockchain/blocks", axum::routing::post(append::<S>))
        .route("/blockchain/blocks/{index}", get(block::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(ledger)
}

async fn chain<S: RecordStore>(State(ledger): State<Arc<Ledger<S>>>) -> Json<Vec<Block>> {
    Json(ledger.snapshot())
}

async fn validity<S: RecordStore>(State(ledger): State<Arc<Ledger<S>>>) -> Json<Validity> {
    let fault = ledger.verify().err();
    Json(Validity {
        valid: fault.is_none(),
        fault,
    })
}

async fn block<S: RecordStore>(
    State(ledger): State<Arc<Ledger<S>>>,
    index: Result<Path<u64>, PathRejection>,
) -> Result<Json<Block>, AppError> {
    let Path(index) = index?;
    ledger
        .get(index)
        .map(Json)
        .ok_or(AppError::NotFound(index))
}

async fn append<S: RecordStore + 'static>(
    State(ledger): State<Arc<Ledger<S>>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Block>), AppError> {
    let Json(body) = body?;
    let Value::Object(data) = body else {
        return Err(AppError::BadRequest(
            "block payload must be a JSON object".to_string(),
        ));
    };
    // The store write may block on disk I/O.
    let block = tokio::task::spawn_blocking(move || ledger.append(data))
        .await
        .map_err(|err| AppError::Internal(err.to_string()))??;
    Ok((StatusCode::CREATED, Json(block)))
}
