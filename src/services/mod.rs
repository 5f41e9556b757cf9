//! Remote collaborators: the pool API gateway and offline notifications.

pub mod flexpool;
pub mod notifier;
pub mod pool_api;

pub use flexpool::FlexpoolClient;
pub use notifier::{Delivery, MailjetNotifier, NotificationService, OfflineNotice};
pub use pool_api::FetchGateway;
