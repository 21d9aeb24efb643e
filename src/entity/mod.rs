pub mod audit_logs;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod refunds;
pub mod sea_orm_active_enums;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use notifications::Entity as Notifications;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use refunds::Entity as Refunds;
pub use users::Entity as Users;
