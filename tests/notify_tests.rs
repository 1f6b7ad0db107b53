mod fixtures;

use std::collections::HashMap;
use std::time::Duration;

use driftwatch::config::{AlertChannel, ChannelKind};
use driftwatch::error::DriftError;
use driftwatch::notify::AlertDispatcher;
use fixtures::WebhookStub;

fn dispatcher() -> AlertDispatcher {
    AlertDispatcher::new().with_backoff_base(Duration::from_millis(10))
}

fn channel(kind: ChannelKind, webhook_url: &str) -> AlertChannel {
    AlertChannel {
        name: "ops".to_string(),
        kind,
        config: HashMap::from([("webhook_url".to_string(), webhook_url.to_string())]),
        enabled: true,
    }
}

#[tokio::test]
async fn disabled_channel_is_a_silent_success() {
    let stub = WebhookStub::start("200 OK").await;
    let mut channel = channel(ChannelKind::Slack, &stub.url());
    channel.enabled = false;

    dispatcher()
        .send(&channel, "network", "Plan: 1 to add", "output", 3)
        .await
        .unwrap();
    assert_eq!(stub.hits(), 0);
}

#[tokio::test]
async fn unsupported_channel_kinds_fail_without_retry() {
    for kind in [ChannelKind::Email, ChannelKind::Other] {
        let err = dispatcher()
            .send(
                &channel(kind, "https://unused.example.com"),
                "network",
                "summary",
                "output",
                3,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DriftError::UnsupportedChannel { .. }));
    }
}

#[tokio::test]
async fn missing_webhook_url_is_a_channel_config_error() {
    let bare = AlertChannel {
        name: "ops".to_string(),
        kind: ChannelKind::Slack,
        config: HashMap::new(),
        enabled: true,
    };
    let err = dispatcher()
        .send(&bare, "network", "summary", "output", 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DriftError::ChannelConfig { ref key, .. } if key == "webhook_url"
    ));
}

#[tokio::test]
async fn successful_delivery_uses_one_request() {
    let stub = WebhookStub::start("200 OK").await;
    dispatcher()
        .send(
            &channel(ChannelKind::Slack, &stub.url()),
            "network",
            "Plan: 1 to add",
            "output",
            3,
        )
        .await
        .unwrap();
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn teams_channel_delivers_like_slack() {
    let stub = WebhookStub::start("200 OK").await;
    dispatcher()
        .send(
            &channel(ChannelKind::Teams, &stub.url()),
            "network",
            "Plan: 1 to add",
            "output",
            3,
        )
        .await
        .unwrap();
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn persistent_failure_exhausts_all_attempts() {
    let stub = WebhookStub::start("500 Internal Server Error").await;
    let err = dispatcher()
        .send(
            &channel(ChannelKind::Slack, &stub.url()),
            "network",
            "summary",
            "output",
            3,
        )
        .await
        .unwrap_err();

    // initial attempt plus three retries
    assert_eq!(stub.hits(), 4);
    match err {
        DriftError::DeliveryFailed { attempts, source } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*source, DriftError::HttpStatus(500)));
        }
        other => panic!("expected DeliveryFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn retry_waits_double_between_attempts() {
    let stub = WebhookStub::start("500 Internal Server Error").await;
    let base = Duration::from_millis(10);

    AlertDispatcher::new()
        .with_backoff_base(base)
        .send(
            &channel(ChannelKind::Slack, &stub.url()),
            "network",
            "summary",
            "output",
            3,
        )
        .await
        .unwrap_err();

    // Four arrivals, three gaps. Sleeps guarantee lower bounds only, so
    // each gap is checked against its slot in the doubling schedule.
    let gaps = stub.hit_gaps();
    assert_eq!(gaps.len(), 3);
    assert!(gaps[0] >= base, "first gap {:?} below base", gaps[0]);
    assert!(gaps[1] >= base * 2, "second gap {:?} not doubled", gaps[1]);
    assert!(gaps[2] >= base * 4, "third gap {:?} not doubled again", gaps[2]);
}

#[tokio::test]
async fn retrying_stops_on_first_success() {
    let stub = WebhookStub::start_sequence(vec!["500 Internal Server Error", "200 OK"]).await;
    dispatcher()
        .send(
            &channel(ChannelKind::Slack, &stub.url()),
            "network",
            "summary",
            "output",
            3,
        )
        .await
        .unwrap();
    assert_eq!(stub.hits(), 2);
}
