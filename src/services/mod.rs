use std::sync::Arc;

use crate::notifications::NotificationService;

pub mod order_status;
pub mod orders;

pub use order_status::{OrderStatusService, TransitionActor};
pub use orders::OrderService;

/// Shared service handles wired into the router state.
#[derive(Clone)]
pub struct AppServices {
    pub order: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub notifications: Arc<dyn NotificationService>,
}

impl AppServices {
    pub fn new(
        db: Arc<crate::db::DbPool>,
        event_sender: Arc<crate::events::EventSender>,
        notifications: Arc<dyn NotificationService>,
        platform_rate: rust_decimal::Decimal,
        courier_share: rust_decimal::Decimal,
    ) -> Self {
        let order = Arc::new(OrderService::new(db.clone(), Some(event_sender.clone())));
        let order_status = Arc::new(OrderStatusService::new(
            db,
            Some(event_sender),
            platform_rate,
            courier_share,
        ));
        Self {
            order,
            order_status,
            notifications,
        }
    }
}
