//! Domain models for settlement-service.

mod balance;
mod commission;
mod notification;
mod price;
mod request;
mod user;

pub use balance::UserBalance;
pub use commission::{Commission, CommissionAward, CommissionStatus, NewCommission};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use price::UserServicePrice;
pub use request::{PaymentStatus, ServiceRequest};
pub use user::{User, UserRole};
