//! Record counting endpoint

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::ApiError;
use crate::api::state::AppState;
use crate::store::{SelectQuery, Selection};

/// Query parameters for counting records
#[derive(Debug, Default, Deserialize)]
pub struct CountParams {
    /// Path to group by, in separator form (`python$version`)
    pub group_by: Option<String>,
    /// Most recent records (or groups) to consider; kept as text so a bad
    /// value gets a JSON error body
    pub limit: Option<String>,
    /// Backend query text, run instead of grouping
    pub raw_query: Option<String>,
}

impl CountParams {
    /// Convert into a store query, validating `limit`
    pub fn to_query(&self) -> Result<SelectQuery, ApiError> {
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(text.parse::<usize>().map_err(|_| {
                ApiError::bad_request(format!("limit must be a non-negative integer, got {:?}", text))
            })?),
        };

        Ok(SelectQuery {
            limit,
            group_by: self.group_by.clone(),
            raw_query: self.raw_query.clone().filter(|q| !q.trim().is_empty()),
        })
    }
}

/// GET /v1/count - Group and count records
pub async fn get_count(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CountParams>,
) -> Result<Json<Selection>, ApiError> {
    let query = params.to_query()?;
    tracing::debug!(?query, "counting records");

    let selection = state
        .read_store(move |store| store.select_records(&query))
        .await?;
    Ok(Json(selection))
}
