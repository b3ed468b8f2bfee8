pub mod order;
pub mod user;

pub use order::{OrderStatus, OrderType, PaymentMethod};
pub use user::ActorRole;
