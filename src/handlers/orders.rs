use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::Model as OrderModel;
use crate::entities::{OrderStatus, OrderType};
use crate::errors::ServiceError;
use crate::services::order_status::is_participant;
use crate::services::orders::{CreateOrderRequest, OrderListFilter};
use crate::services::TransitionActor;
use crate::{auth::AuthUser, ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderStatusRequest {
    pub new_status: OrderStatus,
    #[validate(length(max = 500, message = "Reason is limited to 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500, message = "Reason is limited to 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrdersQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub status: Option<OrderStatus>,
    pub order_type: Option<OrderType>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// Resolve an order identifier that may be a UUID or an order number
async fn resolve_order(state: &AppState, id: &str) -> Result<OrderModel, ServiceError> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        state.services.order.get_order(uuid).await
    } else {
        state.services.order.get_order_by_number(id).await
    }
}

/// The transition actor backing an authenticated request
fn transition_actor(auth_user: &AuthUser) -> Result<TransitionActor, ServiceError> {
    let user_id = Uuid::parse_str(&auth_user.user_id)
        .map_err(|_| ServiceError::Unauthorized("Token subject is not a valid ID".to_string()))?;
    let role = auth_user.actor_role().ok_or_else(|| {
        ServiceError::Unauthorized("Token carries no platform role".to_string())
    })?;
    Ok(TransitionActor::new(user_id, role))
}

/// Create a new order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Create a new order in CONFIRMED status",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderModel>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderModel>>), ServiceError> {
    let actor = transition_actor(&auth_user)?;

    // Customers order for themselves; only admins may create on behalf of
    // another customer.
    if !actor.is_admin() && request.customer_id != actor.user_id {
        return Err(ServiceError::Forbidden(
            "Orders can only be created for your own account".to_string(),
        ));
    }

    let order = state.services.order.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// List orders with pagination and filtering
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Get a paginated list of orders. Non-admin callers only see orders they participate in.",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("order_type" = Option<String>, Query, description = "Filter by order type"),
    ),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<PaginatedResponse<OrderModel>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderModel>>>, ServiceError> {
    let actor = transition_actor(&auth_user)?;
    let limit = query.limit.clamp(1, 100);

    let filter = OrderListFilter {
        status: query.status,
        order_type: query.order_type,
        participant: if actor.is_admin() {
            None
        } else {
            Some((actor.role, actor.user_id))
        },
    };

    let result = state
        .services
        .order
        .list_orders(filter, query.page, limit)
        .await?;

    let total_pages = result.total.div_ceil(limit);
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: result.orders,
        total: result.total,
        page: result.page,
        limit,
        total_pages,
    })))
}

/// Get a single order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Fetch an order by its ID or order number",
    params(("id" = String, Path, description = "Order ID or order number")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderModel>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    let actor = transition_actor(&auth_user)?;
    let order = resolve_order(&state, &id).await?;

    if !is_participant(&order, actor.user_id, actor.role) {
        return Err(ServiceError::Forbidden(
            "You are not a participant of this order".to_string(),
        ));
    }

    Ok(Json(ApiResponse::success(order)))
}

/// Update an order's status
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Move an order along its lifecycle. The caller's role and participation are checked against the requested transition.",
    params(("id" = String, Path, description = "Order ID or order number")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderModel>),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth_user: AuthUser,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    request.validate()?;
    let actor = transition_actor(&auth_user)?;
    let order = resolve_order(&state, &id).await?;

    let updated = state
        .services
        .order_status
        .update_status(order.id, request.new_status, actor, request.reason)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}

/// Accept an order as the delivering courier
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/accept",
    summary = "Accept order",
    description = "Assign the calling courier to an unassigned order",
    params(("id" = String, Path, description = "Order ID or order number")),
    responses(
        (status = 200, description = "Courier assigned", body = ApiResponse<OrderModel>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already assigned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn accept_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    let actor = transition_actor(&auth_user)?;
    let order = resolve_order(&state, &id).await?;

    let updated = state
        .services
        .order
        .assign_courier(order.id, actor.user_id)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}

/// Cancel an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    description = "Cancel a non-terminal order, recording who cancelled and why",
    params(("id" = String, Path, description = "Order ID or order number")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderModel>),
        (status = 400, description = "Order already terminal", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth_user: AuthUser,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    request.validate()?;
    let actor = transition_actor(&auth_user)?;
    let order = resolve_order(&state, &id).await?;

    let updated = state
        .services
        .order_status
        .update_status(order.id, OrderStatus::Cancelled, actor, request.reason)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}

/// Export all orders as CSV
#[utoipa::path(
    get,
    path = "/api/v1/orders/export",
    summary = "Export orders",
    description = "Download every order as a CSV file. Admin only.",
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn export_orders(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let csv = state.services.order.export_orders_csv().await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"orders.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
