pub mod channel;
pub mod circuit_breaker;
pub mod fcm;
pub mod health;
pub mod notification;
pub mod retry;
pub mod status;
pub mod validation;
