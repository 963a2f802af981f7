/// Generic CRUD handlers over [`Resource`] entities
///
/// Any entity that implements [`Resource`] can be mounted with
/// [`resource_routes`]; handlers talk to it only through `Service<R>`.
///
/// # Endpoints (relative to the mount point)
///
/// - `GET    /` - Paginated list, `?offset=0&limit=10` (limit capped at 100)
/// - `POST   /` - Create
/// - `GET    /trashed` - Soft-deleted records
/// - `GET    /search?field=&keyword=` - Substring search on a searchable column
/// - `GET    /:id` - Show
/// - `PUT    /:id` - Update
/// - `DELETE /:id` - Soft delete (hard when the entity has no `deleted_at`)
/// - `POST   /:id/restore` - Undo a soft delete
/// - `DELETE /:id/force` - Hard delete

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use userbase_shared::{entity::Entity, repository::Page, service::Service};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{parse_id, ApiQuery, ValidatedJson},
};

/// Default page size
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest accepted page size
pub const MAX_LIMIT: i64 = 100;

/// An entity exposed over HTTP
pub trait Resource: Entity + Serialize {
    /// Payload accepted by `POST /`
    type Create: DeserializeOwned + Validate + Send + 'static;

    /// Payload accepted by `PUT /:id`
    type Update: DeserializeOwned + Validate + Send + 'static;

    /// Singular name used in error messages
    const NAME: &'static str;

    /// Builds an unsaved record from a create payload
    fn from_create(input: Self::Create) -> Self;

    /// Applies the fields present in an update payload
    fn apply_update(&mut self, input: Self::Update);
}

/// Pagination query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Offset and limit after defaults and bounds are applied
    pub fn resolve(&self) -> (i64, i64) {
        let offset = self.offset.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        (offset, limit)
    }
}

/// Search query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub field: String,
    pub keyword: String,
}

/// Mounts every handler for `R`
pub fn resource_routes<R: Resource>() -> Router<AppState> {
    Router::new()
        .route("/", get(list::<R>).post(create::<R>))
        .route("/trashed", get(trashed::<R>))
        .route("/search", get(search::<R>))
        .route("/:id", get(show::<R>).put(update::<R>).delete(destroy::<R>))
        .route("/:id/restore", post(restore::<R>))
        .route("/:id/force", delete(force_delete::<R>))
}

fn not_found<R: Resource>() -> ApiError {
    ApiError::NotFound(format!("{} not found", R::NAME))
}

pub async fn list<R: Resource>(
    State(service): State<Service<R>>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<R>>> {
    let (offset, limit) = params.resolve();
    Ok(Json(service.paginate(offset, limit).await?))
}

pub async fn show<R: Resource>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
) -> ApiResult<Json<R>> {
    let id = parse_id::<R::Id>(&id)?;

    service
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(not_found::<R>)
}

pub async fn create<R: Resource>(
    State(service): State<Service<R>>,
    ValidatedJson(input): ValidatedJson<R::Create>,
) -> ApiResult<(StatusCode, Json<R>)> {
    let created = service.create(R::from_create(input)).await?;

    tracing::info!(resource = R::NAME, id = %created.id(), "Created");

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update<R: Resource>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<R::Update>,
) -> ApiResult<Json<R>> {
    let id = parse_id::<R::Id>(&id)?;

    let mut entity = service.find_by_id(id).await?.ok_or_else(not_found::<R>)?;
    entity.apply_update(input);

    service
        .update(entity)
        .await?
        .map(Json)
        .ok_or_else(not_found::<R>)
}

pub async fn destroy<R: Resource>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id::<R::Id>(&id)?;

    if service.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found::<R>())
    }
}

pub async fn trashed<R: Resource>(State(service): State<Service<R>>) -> ApiResult<Json<Vec<R>>> {
    Ok(Json(service.only_trashed().await?))
}

pub async fn search<R: Resource>(
    State(service): State<Service<R>>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<Vec<R>>> {
    Ok(Json(service.search(&params.field, &params.keyword).await?))
}

pub async fn restore<R: Resource>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id::<R::Id>(&id)?;

    service.restore(id).await?.ok_or_else(not_found::<R>)?;

    Ok(Json(json!({ "message": "restored" })))
}

pub async fn force_delete<R: Resource>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id::<R::Id>(&id)?;

    if service.hard_delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found::<R>())
    }
}
