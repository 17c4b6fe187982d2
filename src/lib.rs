pub mod api;
pub mod clients;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod utils;

pub use clients::service::{ChannelBackend, ChannelService, DeliveryFuture, DeliveryReceipt};
pub use dispatcher::{ChannelOutcome, CompositeDispatcher};
pub use error::{NotificationError, Result};
pub use models::{
    channel::ChannelType,
    notification::{Notification, NotificationHandle},
    retry::{BackoffStrategy, RetryConfig, RetryStatus},
    status::NotificationStatus,
};
pub use scheduler::{RetryFuture, RetryScheduler};
