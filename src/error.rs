use thiserror::Error;
use uuid::Uuid;

use crate::models::{channel::ChannelType, status::NotificationStatus};

pub type Result<T> = std::result::Result<T, NotificationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    /// A transition was requested from a state that does not allow it.
    #[error("Cannot {action} notification {id} while it is {status}")]
    IllegalState {
        id: Uuid,
        action: &'static str,
        status: NotificationStatus,
    },

    #[error("No channel service registered for {0}")]
    UnsupportedChannel(ChannelType),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotificationError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_illegal_state(&self) -> bool {
        matches!(self, NotificationError::IllegalState { .. })
    }
}
