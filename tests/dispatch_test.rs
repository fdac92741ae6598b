//! Integration tests for the email dispatch pipeline: validation,
//! suppression filtering, mode gating, and provider handoff outcomes.

mod common;

use std::collections::HashMap;

use serde_json::json;

use roofline_core::config::{CoreConfig, EmailMode};
use roofline_core::constants::{MAIL_AUDIT_COLLECTION, MAIL_QUEUE_COLLECTION};
use roofline_core::dispatch::{QueuePayload, QueueSkipReason};
use roofline_core::models::SuppressionReason;
use roofline_core::CoreError;

use common::TestHarness;

fn payload(to: Vec<&str>) -> QueuePayload {
    QueuePayload {
        to: to.into_iter().map(str::to_string).collect(),
        subject: "Your roof inspection offer".to_string(),
        template_name: "offer_sent".to_string(),
        template_data: HashMap::new(),
        reply_to: None,
    }
}

#[tokio::test]
async fn queue_delivers_and_persists_sent_record() {
    let h = TestHarness::new();
    h.provider.succeed_next_with("pm-123");

    let result = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["customer@example.com"]))
        .await
        .unwrap();

    assert_eq!(result.enqueued, 1);
    assert_eq!(result.suppressed, 0);
    assert!(result.provider_error.is_none());
    assert_eq!(result.message_ids.len(), 1);

    let record = h.fetch(MAIL_QUEUE_COLLECTION, &result.message_ids[0]).await;
    assert_eq!(record["status"], json!("sent"));
    assert_eq!(record["provider_message_id"], json!("pm-123"));
    assert!(record["sent_at"].is_string());
    assert_eq!(h.store.len(MAIL_AUDIT_COLLECTION), 1);
    assert_eq!(h.provider.sent_count(), 1);
}

#[tokio::test]
async fn queue_requires_a_caller() {
    let h = TestHarness::new();
    let err = h
        .pipeline
        .queue(None, payload(vec!["customer@example.com"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthenticated));
    assert_eq!(h.store.len(MAIL_QUEUE_COLLECTION), 0);
}

#[tokio::test]
async fn queue_rejects_invalid_input_before_side_effects() {
    let h = TestHarness::new();

    let err = h.pipeline.queue(Some(&h.caller()), payload(vec![])).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let err = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["not-an-address"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let mut unknown_template = payload(vec!["customer@example.com"]);
    unknown_template.template_name = "password_reset".to_string();
    let err = h
        .pipeline
        .queue(Some(&h.caller()), unknown_template)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    assert_eq!(h.store.len(MAIL_QUEUE_COLLECTION), 0);
    assert_eq!(h.provider.sent_count(), 0);
}

#[tokio::test]
async fn suppressed_recipients_are_filtered_out() {
    let h = TestHarness::new();
    h.registry
        .suppress(
            "bounced@example.com",
            SuppressionReason::HardBounce,
            None,
            None,
            None,
            "system",
        )
        .await
        .unwrap();

    let result = h
        .pipeline
        .queue(
            Some(&h.caller()),
            payload(vec!["bounced@example.com", "ok@example.com"]),
        )
        .await
        .unwrap();

    assert_eq!(result.enqueued, 1);
    assert_eq!(result.suppressed, 1);
    let record = h.fetch(MAIL_QUEUE_COLLECTION, &result.message_ids[0]).await;
    assert_eq!(record["to"], json!(["ok@example.com"]));
}

#[tokio::test]
async fn all_recipients_suppressed_is_a_success_with_nothing_enqueued() {
    let h = TestHarness::new();
    h.registry
        .suppress(
            "bounced@example.com",
            SuppressionReason::HardBounce,
            None,
            None,
            None,
            "system",
        )
        .await
        .unwrap();

    let result = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["Bounced@Example.com"]))
        .await
        .unwrap();

    assert_eq!(result.enqueued, 0);
    assert_eq!(result.suppressed, 1);
    assert_eq!(result.reason, Some(QueueSkipReason::AllRecipientsSuppressed));
    assert!(result.message_ids.is_empty());
    assert_eq!(h.store.len(MAIL_QUEUE_COLLECTION), 0);
    assert_eq!(h.provider.sent_count(), 0);
}

#[tokio::test]
async fn restricted_mode_rejects_disallowed_domains_wholesale() {
    let mut config = CoreConfig::default();
    config.email.mode = EmailMode::Restricted;
    config.email.allowed_domains = vec!["roofline.app".to_string()];
    let h = TestHarness::with_config(config);

    let result = h
        .pipeline
        .queue(
            Some(&h.caller()),
            payload(vec!["inspector@roofline.app", "customer@example.com"]),
        )
        .await
        .unwrap();

    assert_eq!(result.enqueued, 0);
    assert_eq!(result.skipped, 2);
    assert_eq!(
        result.reason,
        Some(QueueSkipReason::DevelopmentModeRestriction)
    );
    assert_eq!(h.store.len(MAIL_QUEUE_COLLECTION), 0);
}

#[tokio::test]
async fn restricted_mode_delivers_to_allowed_domains() {
    let mut config = CoreConfig::default();
    config.email.mode = EmailMode::Restricted;
    let h = TestHarness::with_config(config);

    let result = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["inspector@roofline.app"]))
        .await
        .unwrap();
    assert_eq!(result.enqueued, 1);
    assert_eq!(h.provider.sent_count(), 1);
}

#[tokio::test]
async fn disabled_mode_short_circuits_without_touching_suppressions() {
    let mut config = CoreConfig::default();
    config.email.mode = EmailMode::Disabled;
    let h = TestHarness::with_config(config);

    let result = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["customer@example.com"]))
        .await
        .unwrap();

    assert_eq!(result.enqueued, 0);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.reason, Some(QueueSkipReason::EmailDisabled));
    assert_eq!(h.store.len(MAIL_QUEUE_COLLECTION), 0);
}

#[tokio::test]
async fn provider_failure_leaves_a_failed_record_but_succeeds() {
    let h = TestHarness::new();
    h.provider.fail_next(1, "provider unavailable");

    let result = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["customer@example.com"]))
        .await
        .unwrap();

    assert_eq!(result.enqueued, 1);
    assert!(result.provider_error.is_some());

    let record = h.fetch(MAIL_QUEUE_COLLECTION, &result.message_ids[0]).await;
    assert_eq!(record["status"], json!("failed"));
    assert!(record["failed_at"].is_string());
    assert!(record["last_error"]
        .as_str()
        .unwrap()
        .contains("provider unavailable"));
}

#[tokio::test]
async fn identical_calls_produce_distinct_message_ids() {
    let h = TestHarness::new();
    let first = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["customer@example.com"]))
        .await
        .unwrap();
    let second = h
        .pipeline
        .queue(Some(&h.caller()), payload(vec!["customer@example.com"]))
        .await
        .unwrap();

    assert_ne!(first.message_ids, second.message_ids);
    assert_eq!(h.store.len(MAIL_QUEUE_COLLECTION), 2);
}

#[tokio::test]
async fn brand_fields_overwrite_caller_template_data() {
    let h = TestHarness::new();
    let mut p = payload(vec!["customer@example.com"]);
    p.template_data
        .insert("company_name".to_string(), json!("Evil Corp"));
    p.template_data.insert("offer_id".to_string(), json!("r-1"));

    let result = h.pipeline.queue(Some(&h.caller()), p).await.unwrap();
    let record = h.fetch(MAIL_QUEUE_COLLECTION, &result.message_ids[0]).await;
    assert_eq!(record["template"]["data"]["company_name"], json!("Roofline"));
    assert_eq!(record["template"]["data"]["offer_id"], json!("r-1"));
}

#[tokio::test]
async fn bulk_items_fail_independently() {
    let h = TestHarness::new();
    let items = vec![
        payload(vec!["ok@example.com"]),
        payload(vec!["broken-address"]),
        payload(vec!["also-ok@example.com"]),
    ];

    let result = h.pipeline.queue_bulk(Some(&h.caller()), items).await.unwrap();

    assert_eq!(result.enqueued, 2);
    assert_eq!(result.message_ids.len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].index, 1);
    assert_eq!(h.store.len(MAIL_QUEUE_COLLECTION), 2);
}
