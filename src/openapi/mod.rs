use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Deliber API",
        version = "1.0.0",
        description = r#"
# Deliber Delivery Marketplace API

Order lifecycle backend for a delivery marketplace connecting customers,
suppliers, and couriers.

## Order lifecycle

Orders move through `CONFIRMED → PREPARING → EN_ROUTE → DELIVERED`, with
`CANCELLED` reachable from any non-terminal status. `SUPPLIER` orders are
prepared by a merchant before pickup; `DIRECT` orders are courier-only
errands and skip the preparation phase.

## Authentication

All API endpoints require a JWT bearer token obtained from `/auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

The API uses a consistent error response format with appropriate HTTP
status codes:

```json
{
  "error": "Bad Request",
  "message": "Invalid transition: Cannot transition from DELIVERED to PREPARING",
  "request_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
  "timestamp": "2026-01-01T00:00:00Z"
}
```

## Pagination

List endpoints support `page` (default: 1) and `limit` (default: 20,
max: 100) query parameters.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Notifications", description = "Customer notification endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::accept_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::export_orders,
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::mark_notification_read,
    ),
    components(
        schemas(
            crate::entities::order::Model,
            crate::entities::OrderStatus,
            crate::entities::OrderType,
            crate::entities::PaymentMethod,
            crate::entities::ActorRole,
            crate::services::orders::CreateOrderRequest,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::handlers::orders::CancelOrderRequest,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_covers_order_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Deliber API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/orders/{id}/status"));
        assert!(json.contains("/api/v1/notifications"));
    }
}
