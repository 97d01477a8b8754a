//! HTTP routes and handlers.

use axum::extract::{Path, State};
use axum::http::Method;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use pitstop_client::{QueryRequest, params};
use pitstop_pool::Executor;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use uuid::Uuid;

use crate::error::ApiError;
use crate::shop::{SHOP_COLUMNS, Shop, ShopPayload};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pooled query executor.
    pub executor: Executor,
}

/// Build the application router.
///
/// CORS reflects the requesting origin, matching the browsers this service
/// fronts.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/shops", get(list_shops))
        .route("/shop/:id", get(get_shop))
        .route("/shop", post(create_shop))
        .route("/addresses", patch(update_shop))
        .route("/addresses/:shop_number", delete(delete_shop))
        .layer(cors)
        .with_state(state)
}

/// `GET /shops` — every shop, ordered by shop number.
async fn list_shops(State(state): State<AppState>) -> Result<Json<Vec<Shop>>, ApiError> {
    let result = state
        .executor
        .execute(QueryRequest::new(format!(
            "select id, {SHOP_COLUMNS} from shop order by shop_number"
        )))
        .await?;

    let shops = result
        .rows()
        .iter()
        .map(Shop::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(rows = shops.len(), "listed all shops");
    Ok(Json(shops))
}

/// `GET /shop/:id` — one shop by primary key; 404 when absent.
async fn get_shop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shop>, ApiError> {
    let result = state
        .executor
        .execute(
            QueryRequest::new(format!(
                "select id, {SHOP_COLUMNS} from shop where id = $1"
            ))
            .bind(id),
        )
        .await?;

    let row = result.first().ok_or(ApiError::NotFound)?;
    let shop = Shop::from_row(row)?;
    tracing::info!(%id, shop_number = shop.shop_number, city = %shop.city, "retrieved shop");
    Ok(Json(shop))
}

/// `POST /shop` — insert a row and return its generated id.
async fn create_shop(
    State(state): State<AppState>,
    Json(payload): Json<ShopPayload>,
) -> Result<Json<Uuid>, ApiError> {
    let result = state
        .executor
        .execute(
            QueryRequest::new(format!(
                "insert into shop ({SHOP_COLUMNS}) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                 returning id"
            ))
            .values(payload.params()),
        )
        .await?;

    let id: Uuid = result
        .first()
        .ok_or_else(|| ApiError::Internal("insert returned no row".into()))?
        .try_get(0)?;
    tracing::info!(%id, shop_number = payload.shop_number, "inserted shop");
    Ok(Json(id))
}

/// `PATCH /addresses` — rewrite every column of the row named by `id`.
async fn update_shop(
    State(state): State<AppState>,
    Json(payload): Json<ShopPayload>,
) -> Result<Json<&'static str>, ApiError> {
    let id = payload
        .id
        .ok_or_else(|| ApiError::Internal("id is required".into()))?;

    let mut values = payload.params();
    values.push(id.into());
    state
        .executor
        .execute(
            QueryRequest::new(
                "update shop set shop_number = $1, address = $2, highway = $3, \
                 exit_number = $4, city = $5, state_cd = $6, zipcode = $7, phone = $8, \
                 lat = $9, lng = $10, division = $11, district = $12 \
                 where id = $13",
            )
            .values(values),
        )
        .await?;

    tracing::info!(%id, "updated shop");
    Ok(Json("Updated"))
}

/// `DELETE /addresses/:shop_number` — remove a row by shop number.
async fn delete_shop(
    State(state): State<AppState>,
    Path(shop_number): Path<i32>,
) -> Result<Json<&'static str>, ApiError> {
    state
        .executor
        .execute(
            QueryRequest::new("delete from shop where shop_number = $1")
                .values(params![shop_number]),
        )
        .await?;

    tracing::info!(shop_number, "deleted shop");
    Ok(Json("Deleted"))
}
