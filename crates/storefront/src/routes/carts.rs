//! Cart API handlers.
//!
//! Carts are addressed by identity key (`session:<uuid>` or `customer:<id>`)
//! and lines by their client-minted `line_key`. Line writes carry absolute
//! quantities, so every handler here is safe to retry.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use shopfront_core::{CartIdentity, CartItem, CartResponse, LineKey};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Largest quantity accepted for a single line.
pub const MAX_LINE_QUANTITY: u32 = 9_999;

fn parse_identity(raw: &str) -> Result<CartIdentity> {
    Ok(raw.parse::<CartIdentity>()?)
}

/// Return every stored row of a cart. Unknown carts are empty.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<CartResponse>> {
    let identity = parse_identity(&identity)?;
    let rows = state.carts().fetch(&identity).await?;
    Ok(Json(CartResponse::new(&identity, rows)))
}

/// Insert or overwrite one line.
///
/// The body is the full line; its `line_key` must match the path.
#[instrument(skip(state, line), fields(product_id = %line.product_id, quantity = line.quantity))]
pub async fn upsert_line(
    State(state): State<AppState>,
    Path((identity, line_key)): Path<(String, LineKey)>,
    Json(line): Json<CartItem>,
) -> Result<Json<CartItem>> {
    let identity = parse_identity(&identity)?;

    if line.line_key != line_key {
        return Err(AppError::BadRequest(format!(
            "line_key in body ({}) does not match path ({line_key})",
            line.line_key
        )));
    }
    if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )));
    }

    let stored = state.carts().upsert_line(&identity, &line).await?;
    Ok(Json(stored))
}

/// Delete one line. Deleting a missing line succeeds.
#[instrument(skip(state))]
pub async fn delete_line(
    State(state): State<AppState>,
    Path((identity, line_key)): Path<(String, LineKey)>,
) -> Result<StatusCode> {
    let identity = parse_identity(&identity)?;
    state.carts().delete_line(&identity, line_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every line of a cart.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<StatusCode> {
    let identity = parse_identity(&identity)?;
    let removed = state.carts().clear(&identity).await?;
    info!(identity = %identity, removed, "Cart cleared");
    Ok(StatusCode::NO_CONTENT)
}
