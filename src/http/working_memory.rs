//! Working-memory surface: the snapshot view (`GET /working-memory`), the
//! per-category views (`/working-memory/:section`), and item CRUD under
//! `/working-memory/items/...`.
//!
//! `:section` names an `ItemCategory` (e.g. `active_work`,
//! `waiting_for`). `GET` returns the items in that category; `PUT`
//! upserts a single item into it from the request body, creating one if
//! `id` is absent or unknown, updating in place otherwise. This mirrors
//! the item CRUD surface rather than inventing a second shape.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthContext;
use crate::error::{MementoError, MementoResult};
use crate::http::respond::structured;
use crate::items::{self, CreateItemInput, UpdateItemInput};
use crate::state::AppState;
use crate::types::{ItemCategory, ItemStatus};
use crate::workspace::ItemListFilter;

pub async fn overview(State(state): State<Arc<AppState>>, auth: AuthContext) -> MementoResult<Json<Value>> {
    let all = items::list(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &ItemListFilter::default()).await?;
    let mut by_category = serde_json::Map::new();
    for category in [
        ItemCategory::ActiveWork,
        ItemCategory::StandingDecision,
        ItemCategory::SkipList,
        ItemCategory::WaitingFor,
        ItemCategory::SessionNote,
    ] {
        let in_category: Vec<_> = all.iter().filter(|i| i.category == category).collect();
        by_category.insert(category.as_str().to_string(), serde_json::to_value(&in_category).unwrap_or(Value::Null));
    }
    Ok(Json(Value::Object(by_category)))
}

fn parse_section(section: &str) -> MementoResult<ItemCategory> {
    ItemCategory::parse(section).ok_or_else(|| MementoError::validation(format!("unknown working-memory section '{section}'")))
}

pub async fn get_section(State(state): State<Arc<AppState>>, auth: AuthContext, Path(section): Path<String>) -> MementoResult<Json<Value>> {
    let category = parse_section(&section)?;
    let filter = ItemListFilter { category: Some(category), ..Default::default() };
    let results = items::list(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &filter).await?;
    Ok(structured(&results))
}

#[derive(Debug, Deserialize)]
pub struct PutSectionBody {
    pub id: Option<String>,
    pub title: String,
    pub content: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub next_action: Option<String>,
}

pub async fn put_section(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(section): Path<String>,
    Json(body): Json<PutSectionBody>,
) -> MementoResult<Json<Value>> {
    let category = parse_section(&section)?;

    if let Some(id) = &body.id {
        if items::get(&auth.store, &state.crypto, auth.workspace_key.as_deref(), id).await.is_ok() {
            let updated = items::update(
                &auth.store,
                &state.crypto,
                auth.workspace_key.as_deref(),
                id,
                UpdateItemInput {
                    title: Some(body.title),
                    content: Some(body.content),
                    priority: Some(body.priority),
                    tags: Some(body.tags),
                    next_action: Some(body.next_action),
                    ..Default::default()
                },
            )
            .await?;
            return Ok(structured(&updated));
        }
    }

    let created = items::create(
        &auth.store,
        &state.crypto,
        auth.workspace_key.as_deref(),
        &auth.plan,
        CreateItemInput { category, title: body.title, content: body.content, priority: body.priority, tags: body.tags, next_action: body.next_action },
    )
    .await?;
    Ok(structured(&created))
}

#[derive(Debug, Deserialize)]
pub struct CreateItemBody {
    pub category: String,
    pub title: String,
    pub content: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub next_action: Option<String>,
}

pub async fn create_item(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<CreateItemBody>) -> MementoResult<Json<Value>> {
    let category = parse_section(&body.category)?;
    let created = items::create(
        &auth.store,
        &state.crypto,
        auth.workspace_key.as_deref(),
        &auth.plan,
        CreateItemInput { category, title: body.title, content: body.content, priority: body.priority, tags: body.tags, next_action: body.next_action },
    )
    .await?;
    Ok(structured(&created))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListItemsQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_items(State(state): State<Arc<AppState>>, auth: AuthContext, Query(q): Query<ListItemsQuery>) -> MementoResult<Json<Value>> {
    let filter = ItemListFilter {
        category: q.category.as_deref().and_then(ItemCategory::parse),
        status: q.status.as_deref().and_then(ItemStatus::parse),
        query: q.query,
        limit: q.limit,
        offset: q.offset.unwrap_or(0),
    };
    let results = items::list(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &filter).await?;
    Ok(structured(&results))
}

pub async fn get_item(State(state): State<Arc<AppState>>, auth: AuthContext, Path(id): Path<String>) -> MementoResult<Json<Value>> {
    let item = items::get(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &id).await?;
    Ok(structured(&item))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateItemBody {
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<i64>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub next_action: Option<Option<String>>,
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<UpdateItemBody>,
) -> MementoResult<Json<Value>> {
    let status = match &body.status {
        Some(s) => Some(ItemStatus::parse(s).ok_or_else(|| MementoError::validation(format!("unknown item status '{s}'")))?),
        None => None,
    };
    let updated = items::update(
        &auth.store,
        &state.crypto,
        auth.workspace_key.as_deref(),
        &id,
        UpdateItemInput { title: body.title, content: body.content, status, priority: body.priority, tags: body.tags, next_action: body.next_action },
    )
    .await?;
    Ok(structured(&updated))
}

pub async fn delete_item(auth: AuthContext, Path(id): Path<String>) -> MementoResult<Json<Value>> {
    let deleted = items::delete(&auth.store, &id).await?;
    Ok(Json(json!({ "deleted": true, "id": deleted.id })))
}
