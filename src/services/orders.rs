use crate::{
    db::DbPool,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
    },
    entities::{ActorRole, OrderStatus, OrderType, PaymentMethod},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request payload for creating an order
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub order_type: OrderType,
    pub supplier_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 500, message = "Delivery address is required"))]
    pub delivery_address: String,
    #[validate(length(max = 1000, message = "Notes are limited to 1000 characters"))]
    pub notes: Option<String>,
}

/// Filters applied when listing orders
#[derive(Debug, Default, Clone)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub order_type: Option<OrderType>,
    /// Restricts results to orders where this actor participates. Admins
    /// list unscoped.
    pub participant: Option<(ActorRole, Uuid)>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderModel>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing order records
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a new order in `CONFIRMED` status
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, order_type = %request.order_type))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderModel, ServiceError> {
        request.validate()?;

        match (request.order_type, request.supplier_id) {
            (OrderType::Supplier, None) => {
                return Err(ServiceError::ValidationError(
                    "SUPPLIER orders require a supplier_id".to_string(),
                ));
            }
            (OrderType::Direct, Some(_)) => {
                return Err(ServiceError::ValidationError(
                    "DIRECT orders cannot reference a supplier".to_string(),
                ));
            }
            _ => {}
        }

        if request.total_amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Total amount must be positive".to_string(),
            ));
        }

        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let customer_id = request.customer_id;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            order_type: Set(request.order_type),
            status: Set(OrderStatus::Confirmed),
            customer_id: Set(customer_id),
            supplier_id: Set(request.supplier_id),
            courier_id: Set(None),
            total_amount: Set(request.total_amount),
            payment_method: Set(request.payment_method),
            platform_fee: Set(None),
            supplier_payout: Set(None),
            courier_payout: Set(None),
            cancelled_by: Set(None),
            cancel_reason: Set(None),
            delivery_address: Set(request.delivery_address),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            prepared_at: Set(None),
            en_route_at: Set(None),
            delivered_at: Set(None),
            cancelled_at: Set(None),
            version: Set(1),
        };

        let order_model = order_active_model.insert(db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order_model.order_number, "Order created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderCreated {
                    order_id,
                    customer_id,
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        Ok(order_model)
    }

    /// Retrieves an order by ID
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Retrieves an order by its human-facing order number
    #[instrument(skip(self))]
    pub async fn get_order_by_number(&self, order_number: &str) -> Result<OrderModel, ServiceError> {
        OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, order_number, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))
    }

    /// Lists orders with filters and pagination, newest first
    #[instrument(skip(self, filter))]
    pub async fn list_orders(
        &self,
        filter: OrderListFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = OrderEntity::find();

        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(order_type) = filter.order_type {
            query = query.filter(order::Column::OrderType.eq(order_type));
        }
        if let Some((role, user_id)) = filter.participant {
            query = match role {
                ActorRole::Customer => query.filter(order::Column::CustomerId.eq(user_id)),
                ActorRole::Supplier => query.filter(order::Column::SupplierId.eq(user_id)),
                ActorRole::Courier => query.filter(order::Column::CourierId.eq(user_id)),
                ActorRole::Admin => query,
            };
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page.saturating_sub(1)).await.map_err(|e| {
            error!(error = %e, page, per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Assigns a courier to an order. Fails with a conflict when a courier
    /// already holds the order.
    #[instrument(skip(self), fields(order_id = %order_id, courier_id = %courier_id))]
    pub async fn assign_courier(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_order(order_id).await?;

        if order.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is already {}",
                order_id, order.status
            )));
        }
        if let Some(existing) = order.courier_id {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already assigned to courier {}",
                order_id, existing
            )));
        }

        let customer_id = order.customer_id;
        let mut active: OrderActiveModel = order.into();
        active.courier_id = Set(Some(courier_id));
        active.updated_at = Set(Some(Utc::now()));
        let current_version = *active.version.as_ref();
        active.version = Set(current_version + 1);

        let updated = active.update(&*self.db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to assign courier");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, courier_id = %courier_id, "Courier assigned");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::CourierAssigned {
                    order_id,
                    customer_id,
                    courier_id,
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send courier assigned event");
            }
        }

        Ok(updated)
    }

    /// Renders every order as CSV, newest first
    #[instrument(skip(self))]
    pub async fn export_orders_csv(&self) -> Result<String, ServiceError> {
        let orders = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch orders for export");
                ServiceError::DatabaseError(e)
            })?;

        let mut csv = String::from(
            "id,order_number,order_type,status,customer_id,supplier_id,courier_id,\
             total_amount,payment_method,platform_fee,supplier_payout,courier_payout,\
             cancelled_by,cancel_reason,delivery_address,created_at,delivered_at,cancelled_at\n",
        );

        for o in &orders {
            let row = [
                o.id.to_string(),
                csv_field(&o.order_number),
                o.order_type.to_string(),
                o.status.to_string(),
                o.customer_id.to_string(),
                opt_string(&o.supplier_id),
                opt_string(&o.courier_id),
                o.total_amount.to_string(),
                o.payment_method.to_string(),
                opt_string(&o.platform_fee),
                opt_string(&o.supplier_payout),
                opt_string(&o.courier_payout),
                o.cancelled_by
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_default(),
                csv_field(o.cancel_reason.as_deref().unwrap_or_default()),
                csv_field(&o.delivery_address),
                o.created_at.to_rfc3339(),
                o.delivered_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                o.cancelled_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ];
            csv.push_str(&row.join(","));
            csv.push('\n');
        }

        info!(count = orders.len(), "Orders exported");
        Ok(csv)
    }
}

/// Order numbers are short, human-readable, and collision-resistant enough
/// given the unique index on the column.
fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("DLB-{}", suffix.to_uppercase())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt_string<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(T::to_string).unwrap_or_default()
}
