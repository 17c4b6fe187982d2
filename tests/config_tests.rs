use std::time::Duration;

use anyhow::Result;
use notification_core::{
    ChannelType, Notification, NotificationHandle, NotificationStatus,
    clients::in_app::InAppInbox, config::Config,
};

/// Test: Defaults describe a working local setup
#[test]
fn test_default_config_is_valid() -> Result<()> {
    let config = Config::default();
    config.validate()?;

    let retry = config.retry_config();
    assert_eq!(retry.base_delay, Duration::from_secs(5));
    assert_eq!(retry.max_delay, Duration::from_secs(300));
    assert_eq!(retry.backoff_multiplier, 2.0);
    assert_eq!(retry.shutdown_timeout, Duration::from_secs(60));

    let breaker = config.circuit_breaker_config();
    assert_eq!(breaker.failure_threshold, 5);
    assert_eq!(breaker.success_threshold, 2);

    Ok(())
}

/// Test: Out-of-range values are rejected
#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    let cases = [
        Config {
            sms_failure_rate: 1.5,
            ..Config::default()
        },
        Config {
            retry_max_delay_seconds: 1.0,
            ..Config::default()
        },
        Config {
            retry_backoff_multiplier: 0.5,
            ..Config::default()
        },
        Config {
            retry_jitter_ratio: 1.0,
            ..Config::default()
        },
        Config {
            worker_concurrency: 0,
            ..Config::default()
        },
        Config {
            circuit_breaker_failure_threshold: 0,
            ..Config::default()
        },
    ];

    for config in cases {
        assert!(config.validate().is_err(), "{:?} should be rejected", config);
    }

    Ok(())
}

/// Test: The configured dispatcher serves every channel
#[tokio::test]
async fn test_build_dispatcher_registers_all_channels() -> Result<()> {
    let dispatcher = Config::default().build_dispatcher(InAppInbox::default())?;

    assert_eq!(dispatcher.registered_types(), ChannelType::ALL.to_vec());
    assert_eq!(dispatcher.service(ChannelType::InApp)?.name(), "in_app");
    assert!(dispatcher.is_healthy().await);
    assert!(dispatcher.test_all_connections().await.values().all(|ok| *ok));

    Ok(())
}

/// Test: Disabled providers show up in the health report
#[tokio::test]
async fn test_disabled_channels_degrade_health() -> Result<()> {
    let config = Config {
        sms_enabled: false,
        push_enabled: false,
        ..Config::default()
    };
    let report = config
        .build_dispatcher(InAppInbox::default())?
        .get_health_report()
        .await;

    assert!(report.is_healthy());
    assert!(report.checks[&ChannelType::Sms].error.is_some());
    assert_eq!(
        serde_json::to_value(&report)?["status"],
        serde_json::json!("degraded")
    );

    Ok(())
}

/// Test: In-app deliveries through the configured dispatcher reach the caller's inbox
#[tokio::test]
async fn test_configured_in_app_inbox_is_readable() -> Result<()> {
    let inbox = InAppInbox::default();
    let dispatcher = Config::default().build_dispatcher(inbox.clone())?;

    let handles: Vec<_> = ["Welcome", "Tips"]
        .into_iter()
        .map(|title| {
            NotificationHandle::new(Notification::new("user-7", ChannelType::InApp, title, "Hello"))
        })
        .collect();
    assert_eq!(dispatcher.send_notifications(&handles).await, vec![true, true]);
    assert!(handles.iter().all(|h| h.status() == NotificationStatus::Sent));

    let entries = inbox.inbox("user-7");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].notification_id, handles[0].id());
    assert_eq!(inbox.unread_count("user-7"), 2);

    assert!(inbox.mark_read("user-7", entries[1].id));
    assert_eq!(inbox.unread_count("user-7"), 1);

    Ok(())
}
