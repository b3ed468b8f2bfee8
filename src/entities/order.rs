use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::user::ActorRole;

/// Lifecycle status of an order.
///
/// `CONFIRMED → PREPARING → EN_ROUTE → DELIVERED`, with `CANCELLED` reachable
/// from every non-terminal status. `DELIVERED` and `CANCELLED` are terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "PREPARING")]
    Preparing,
    #[sea_orm(string_value = "EN_ROUTE")]
    EnRoute,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Structural reachability, independent of who is asking.
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Confirmed, Preparing)
                | (Confirmed, EnRoute)
                | (Preparing, EnRoute)
                | (EnRoute, Delivered)
                | (Confirmed, Cancelled)
                | (Preparing, Cancelled)
                | (EnRoute, Cancelled)
        )
    }
}

/// Kind of delivery transaction.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Fulfilled by a merchant; a supplier reference is mandatory.
    #[sea_orm(string_value = "SUPPLIER")]
    Supplier,
    /// Courier-only errand; never has a supplier.
    #[sea_orm(string_value = "DIRECT")]
    Direct,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "CASH")]
    Cash,
    #[sea_orm(string_value = "CARD")]
    Card,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    pub order_type: OrderType,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub courier_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,

    // Commission split, populated when the order is delivered
    pub platform_fee: Option<Decimal>,
    pub supplier_payout: Option<Decimal>,
    pub courier_payout: Option<Decimal>,

    pub cancelled_by: Option<ActorRole>,
    pub cancel_reason: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Delivery address is required"))]
    pub delivery_address: String,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub en_route_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CustomerId",
        to = "super::user::Column::Id"
    )]
    Customer,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        // The type/supplier invariant holds for every row that reaches storage.
        if let (Some(order_type), Some(supplier_id)) =
            (self.order_type.try_as_ref(), self.supplier_id.try_as_ref())
        {
            match (order_type, supplier_id) {
                (OrderType::Direct, Some(_)) => {
                    return Err(DbErr::Custom(
                        "DIRECT orders cannot reference a supplier".to_string(),
                    ));
                }
                (OrderType::Supplier, None) => {
                    return Err(DbErr::Custom(
                        "SUPPLIER orders require a supplier".to_string(),
                    ));
                }
                _ => {}
            }
        }
        Ok(self)
    }
}
