use anyhow::Result;
use notification_core::{
    ChannelService, ChannelType, Notification, NotificationHandle, NotificationStatus,
    clients::{
        email::EmailBackend, in_app::InAppBackend, provider::ProviderSettings, push::PushBackend,
        sms::SmsBackend, worker_pool::WorkerPool,
    },
    models::circuit_breaker::CircuitBreakerConfig,
};
use serde_json::json;

const DEVICE_TOKEN: &str = "fcm:APA91bHun4MxP5egoKMwt2KZFBaFUH-1RYqx";

fn channel(backend: impl notification_core::ChannelBackend) -> ChannelService {
    ChannelService::new(backend, CircuitBreakerConfig::default(), WorkerPool::new(4))
}

fn email_service(settings: ProviderSettings) -> ChannelService {
    channel(EmailBackend::new(settings, "smtp.example.com", "noreply@example.com"))
}

fn sms_service(settings: ProviderSettings) -> ChannelService {
    channel(SmsBackend::new(
        settings,
        "https://sms.example.com/v1/messages",
        "sms-key",
        "ACME",
        0.01,
    ))
}

/// Test: Email delivery records the relay's message id
#[tokio::test]
async fn test_email_delivery() -> Result<()> {
    let service = email_service(ProviderSettings::default());
    let handle = NotificationHandle::new(Notification::new(
        "jane.doe@example.com",
        ChannelType::Email,
        "Your receipt",
        "Thanks for your order",
    ));

    assert!(service.send_notification(&handle).await);

    let notification = handle.snapshot();
    assert_eq!(notification.status(), NotificationStatus::Sent);
    let message_id = notification
        .metadata_value("message_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    assert!(message_id.starts_with('<'));
    assert!(message_id.ends_with("@smtp.example.com>"));
    assert_eq!(
        notification.metadata_value("from_address"),
        Some(&json!("noreply@example.com"))
    );

    Ok(())
}

/// Test: Email rejects malformed addresses and oversized subjects
#[tokio::test]
async fn test_email_validation() -> Result<()> {
    let service = email_service(ProviderSettings::default());

    let bad_address = Notification::new("not-an-email", ChannelType::Email, "Hi", "Body");
    assert!(!service.validate_notification(&bad_address));

    let long_subject = Notification::new("a@example.com", ChannelType::Email, "s".repeat(999), "Body");
    assert!(!service.validate_notification(&long_subject));

    let ok = Notification::new("a@example.com", ChannelType::Email, "s".repeat(998), "Body");
    assert!(service.validate_notification(&ok));

    Ok(())
}

/// Test: A disabled provider fails deliveries and reports unhealthy
#[tokio::test]
async fn test_disabled_provider() -> Result<()> {
    let service = email_service(ProviderSettings::disabled());
    let handle = NotificationHandle::new(Notification::new(
        "a@example.com",
        ChannelType::Email,
        "Hi",
        "Body",
    ));

    assert!(!service.send_notification(&handle).await);
    assert_eq!(handle.status(), NotificationStatus::Failed);
    assert_eq!(
        handle.snapshot().error_message(),
        Some("Email service is disabled")
    );
    assert!(!service.is_healthy().await);

    Ok(())
}

/// Test: A provider with a certain failure rate always fails
#[tokio::test]
async fn test_failure_rate() -> Result<()> {
    let settings = ProviderSettings {
        failure_rate: 1.0,
        ..ProviderSettings::default()
    };
    let service = email_service(settings);
    let handle = NotificationHandle::new(Notification::new(
        "a@example.com",
        ChannelType::Email,
        "Hi",
        "Body",
    ));

    assert!(!service.send_notification(&handle).await);
    assert!(
        handle
            .snapshot()
            .error_message()
            .is_some_and(|e| e.contains("timed out via smtp.example.com"))
    );
    assert!(service.is_healthy().await, "Random failures do not affect health");

    Ok(())
}

/// Test: SMS delivery reports segments and cost
#[tokio::test]
async fn test_sms_segments_and_cost() -> Result<()> {
    let service = sms_service(ProviderSettings::default());
    let handle = NotificationHandle::new(Notification::new(
        "+14155550123",
        ChannelType::Sms,
        "Alert",
        "x".repeat(161),
    ));

    assert!(service.send_notification(&handle).await);

    let notification = handle.snapshot();
    assert_eq!(notification.metadata_value("segments"), Some(&json!(2)));
    assert_eq!(notification.metadata_value("sender_id"), Some(&json!("ACME")));
    let cost = notification
        .metadata_value("cost")
        .and_then(|v| v.as_f64())
        .unwrap_or_default();
    assert!((cost - 0.02).abs() < 1e-9);
    assert!(
        notification
            .metadata_value("message_sid")
            .and_then(|v| v.as_str())
            .is_some_and(|sid| sid.starts_with("SM"))
    );

    Ok(())
}

/// Test: SMS rejects bad numbers and messages over the concatenation limit
#[tokio::test]
async fn test_sms_validation() -> Result<()> {
    let service = sms_service(ProviderSettings::default());

    let bad_number = Notification::new("555-CALL-NOW", ChannelType::Sms, "T", "M");
    assert!(!service.validate_notification(&bad_number));

    let too_long = Notification::new("+14155550123", ChannelType::Sms, "T", "x".repeat(1601));
    assert!(!service.validate_notification(&too_long));

    let local = Notification::new("4155550123", ChannelType::Sms, "T", "M");
    assert!(service.validate_notification(&local));

    Ok(())
}

/// Test: SMS health requires gateway credentials
#[tokio::test]
async fn test_sms_health_requires_credentials() -> Result<()> {
    let service = channel(SmsBackend::new(
        ProviderSettings::default(),
        "https://sms.example.com/v1/messages",
        "",
        "ACME",
        0.01,
    ));

    assert!(!service.is_healthy().await);
    assert!(sms_service(ProviderSettings::default()).is_healthy().await);

    Ok(())
}

/// Test: Push delivery returns an FCM message name under the project
#[tokio::test]
async fn test_push_delivery() -> Result<()> {
    let service = channel(PushBackend::new(ProviderSettings::default(), "demo-project"));
    let handle = NotificationHandle::new(Notification::new(
        DEVICE_TOKEN,
        ChannelType::Push,
        "New message",
        "You have a new message",
    ));

    assert!(service.send_notification(&handle).await);

    let notification = handle.snapshot();
    assert!(
        notification
            .metadata_value("fcm_message_id")
            .and_then(|v| v.as_str())
            .is_some_and(|id| id.starts_with("projects/demo-project/messages/"))
    );
    assert!(
        notification
            .metadata_value("payload_bytes")
            .and_then(|v| v.as_u64())
            .is_some_and(|bytes| bytes > 0)
    );

    Ok(())
}

/// Test: Push rejects short tokens, long titles and oversized bodies
#[tokio::test]
async fn test_push_validation() -> Result<()> {
    let service = channel(PushBackend::new(ProviderSettings::default(), "demo-project"));

    let short_token = Notification::new("abc", ChannelType::Push, "T", "M");
    assert!(!service.validate_notification(&short_token));

    let bad_chars = Notification::new("token with spaces in it!!", ChannelType::Push, "T", "M");
    assert!(!service.validate_notification(&bad_chars));

    let long_title = Notification::new(DEVICE_TOKEN, ChannelType::Push, "t".repeat(101), "M");
    assert!(!service.validate_notification(&long_title));

    let big_body = Notification::new(DEVICE_TOKEN, ChannelType::Push, "T", "b".repeat(4097));
    assert!(!service.validate_notification(&big_body));

    let ok = Notification::new(DEVICE_TOKEN, ChannelType::Push, "T", "b".repeat(4096));
    assert!(service.validate_notification(&ok));

    Ok(())
}

/// Test: In-app delivery lands in the user's inbox
#[tokio::test]
async fn test_in_app_inbox() -> Result<()> {
    let backend = InAppBackend::new(ProviderSettings::default());
    let inbox = backend.inbox();
    let service = channel(backend);

    let handle = NotificationHandle::new(Notification::new(
        "user-42",
        ChannelType::InApp,
        "Welcome",
        "Glad to have you",
    ));
    assert!(service.send_notification(&handle).await);

    let entries = inbox.inbox("user-42");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].notification_id, handle.id());
    assert_eq!(entries[0].title, "Welcome");
    assert_eq!(inbox.unread_count("user-42"), 1);
    assert_eq!(
        handle.snapshot().metadata_value("inbox_entry_id"),
        Some(&json!(entries[0].id.to_string()))
    );

    assert!(inbox.mark_read("user-42", entries[0].id));
    assert_eq!(inbox.unread_count("user-42"), 0);
    assert!(!inbox.mark_read("someone-else", entries[0].id));
    assert!(inbox.inbox("someone-else").is_empty());

    let spaced = Notification::new("user 42", ChannelType::InApp, "Welcome", "Hi");
    assert!(!service.validate_notification(&spaced));

    Ok(())
}
