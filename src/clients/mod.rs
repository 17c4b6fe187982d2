pub mod circuit_breaker;
pub mod email;
pub mod in_app;
pub mod provider;
pub mod push;
pub mod service;
pub mod sms;
pub mod worker_pool;
