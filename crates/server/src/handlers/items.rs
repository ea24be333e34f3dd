//! Item handlers: batch upsert, delta sync, single fetch and tombstoning.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::read_json;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use gophkeeper_core::api::{
    ChangeDto, DeleteItemResponse, GetChangesResponse, ItemResponse, ItemVersionDto,
    UpsertItemsRequest, UpsertItemsResponse,
};
use gophkeeper_store::models::{ItemVersion, UpsertIntent};
use serde::Deserialize;
use uuid::Uuid;

fn to_version_dto(v: ItemVersion) -> ItemVersionDto {
    ItemVersionDto {
        id: v.id,
        new_ver: v.new_ver,
        updated_at: v.updated_at,
    }
}

/// POST /v1/items - create or update items in an atomic batch.
#[tracing::instrument(skip_all)]
pub async fn upsert_items(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<UpsertItemsResponse>> {
    let auth = require_auth(&req)?;
    let body: UpsertItemsRequest = read_json(&state, req).await?;

    let intents: Vec<UpsertIntent> = body
        .items
        .into_iter()
        .map(|item| UpsertIntent {
            id: item.id,
            base_ver: item.base_ver,
            blob_enc: item.blob_enc,
        })
        .collect();

    let results = state.items.upsert(auth.user_id, intents).await?;
    Ok(Json(UpsertItemsResponse {
        results: results.into_iter().map(to_version_dto).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    #[serde(default)]
    pub since_ver: i64,
}

/// GET /v1/items/changes?since_ver=N - delta sync: everything newer than the
/// client's watermark, tombstones included (without payload).
#[tracing::instrument(skip_all)]
pub async fn get_changes(
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
    req: Request,
) -> ApiResult<Json<GetChangesResponse>> {
    let auth = require_auth(&req)?;
    let changes = state.items.get_changes(auth.user_id, query.since_ver).await?;

    Ok(Json(GetChangesResponse {
        changes: changes
            .into_iter()
            .map(|c| ChangeDto {
                id: c.id,
                ver: c.ver,
                deleted: c.deleted,
                updated_at: c.updated_at,
                blob_enc: c.blob_enc,
            })
            .collect(),
    }))
}

/// GET /v1/items/{item_id} - fetch a single item, tombstoned or not.
#[tracing::instrument(skip_all)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<ItemResponse>> {
    let auth = require_auth(&req)?;
    let item = state.items.get_one(auth.user_id, item_id).await?;

    Ok(Json(ItemResponse {
        id: item.id,
        ver: item.ver,
        deleted: item.deleted,
        updated_at: item.updated_at,
        blob_enc: item.blob_enc,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub base_ver: i64,
}

/// DELETE /v1/items/{item_id}?base_ver=N - tombstone an item.
#[tracing::instrument(skip_all)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
    req: Request,
) -> ApiResult<Json<DeleteItemResponse>> {
    let auth = require_auth(&req)?;
    let version = state
        .items
        .delete(auth.user_id, item_id, query.base_ver)
        .await?;

    Ok(Json(DeleteItemResponse {
        result: to_version_dto(version),
    }))
}
