//! Failure propagation: validation, upstream errors, timeouts, cancellation, store outages.

mod common;

use ai_gateway::gateway::Gateway;
use ai_gateway::usage::MemoryUsageStore;
use ai_gateway::{CallRequest, Endpoint, Error};
use common::{BrokenCache, BrokenUsageStore, Fixture, ScriptedUpstream, Step, FRACTIONS_REPLY};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn lesson(topic: &str) -> CallRequest {
    CallRequest::new(
        Endpoint::LessonGeneration,
        json!({ "topic": topic }),
        "student-1",
    )
}

fn chat(message: &str) -> CallRequest {
    CallRequest::new(Endpoint::Chat, json!({ "message": message }), "student-1")
}

#[tokio::test]
async fn test_invalid_request_never_reaches_upstream() {
    let fx = Fixture::new(ScriptedUpstream::always("unused"));

    let missing_topic = CallRequest::new(
        Endpoint::LessonGeneration,
        json!({"difficulty": "beginner"}),
        "student-1",
    );
    let err = fx.gateway.invoke(missing_topic).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.http_status(), 400);

    let anonymous = CallRequest::new(Endpoint::Chat, json!({"message": "hi"}), "");
    assert!(fx.gateway.invoke(anonymous).await.is_err());

    assert_eq!(fx.upstream.calls(), 0);
    let usage = fx.gateway.summarize("student-1", 7).await.unwrap();
    assert_eq!(usage.total_requests, 0);
}

#[tokio::test]
async fn test_upstream_error_is_service_unavailable_and_not_cached() {
    let fx = Fixture::new(ScriptedUpstream::new(vec![
        Step::Fail(Some(502), "bad gateway".into()),
        Step::reply("recovered answer"),
    ]));

    let err = fx.gateway.invoke(chat("hello")).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { status: Some(502), .. }));
    assert!(err.is_service_unavailable());
    assert_eq!(err.http_status(), 503);
    assert_eq!(fx.cached_entries().await, 0);
    assert_eq!(fx.gateway.stats().failures, 1);

    // Failed calls leave no usage record and no cache entry behind.
    assert_eq!(fx.gateway.summarize("student-1", 1).await.unwrap().total_requests, 0);
    let ok = fx.gateway.invoke(chat("hello")).await.unwrap();
    assert!(!ok.cached());
    assert_eq!(ok.data["response"], "recovered answer");
}

#[tokio::test]
async fn test_generation_upstream_error_is_not_retried() {
    let fx = Fixture::new(ScriptedUpstream::new(vec![Step::Fail(
        Some(500),
        "internal".into(),
    )]));
    let err = fx.gateway.invoke(lesson("Fractions")).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { status: Some(500), .. }));
    assert_eq!(fx.upstream.calls(), 1);
}

#[tokio::test]
async fn test_generation_timeouts_exhaust_all_attempts() {
    let fx = Fixture::new(ScriptedUpstream::new(vec![Step::slow(5_000, FRACTIONS_REPLY)]));

    let started = Instant::now();
    let err = fx.gateway.invoke(lesson("Fractions")).await.unwrap_err();
    match err {
        Error::UpstreamTimeout {
            attempts,
            deadline_ms,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(deadline_ms, 400);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.upstream.calls(), 3);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(fx.cached_entries().await, 0);
}

#[tokio::test]
async fn test_direct_call_gets_single_deadline() {
    let fx = Fixture::new(ScriptedUpstream::new(vec![Step::slow(5_000, "too late")]));
    let err = fx.gateway.invoke(chat("slow?")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::UpstreamTimeout {
            attempts: 1,
            deadline_ms: 300,
            ..
        }
    ));
    assert_eq!(fx.upstream.calls(), 1);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_generation() {
    let mut config = common::fast_config();
    config.retry.deadlines_ms = vec![2_000, 4_000, 8_000];
    let fx = Fixture::with_config(
        ScriptedUpstream::new(vec![Step::slow(10_000, FRACTIONS_REPLY)]),
        config,
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = fx
        .gateway
        .invoke_with_cancel(lesson("Fractions"), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(err.http_status(), 499);
    assert!(started.elapsed() < Duration::from_millis(1_500));
    assert_eq!(fx.upstream.calls(), 1);
    assert_eq!(fx.gateway.stats().failures, 0);
}

#[tokio::test]
async fn test_follower_takes_over_after_leader_cancelled() {
    let mut config = common::fast_config();
    config.direct_timeout_ms = 2_000;
    let fx = Fixture::with_config(
        ScriptedUpstream::new(vec![
            Step::slow(1_000, "leader never finishes this"),
            Step::slow(50, "follower answer"),
        ]),
        config,
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let leader = fx.gateway.invoke_with_cancel(chat("same"), cancel);
    let follower = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        fx.gateway.invoke(chat("same")).await
    };
    let cancel_later = async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    };

    let (leader_res, follower_res, _) = tokio::join!(leader, follower, cancel_later);
    assert!(matches!(leader_res, Err(Error::Cancelled)));
    let resp = follower_res.unwrap();
    assert_eq!(resp.data["response"], "follower answer");
    assert!(!resp.cached());
    assert_eq!(fx.upstream.calls(), 2);
}

#[tokio::test]
async fn test_followers_share_leader_failure() {
    // The failure is delayed so followers have time to join.
    let slow_fail = SlowFail::new(50, 503);
    let gateway = Gateway::builder()
        .config(common::fast_config())
        .upstream(slow_fail.clone())
        .build()
        .unwrap();

    let results = join_all((0..3).map(|_| gateway.invoke(chat("same")))).await;
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(Error::Upstream { status: Some(503), .. }))));
    assert_eq!(slow_fail.calls(), 1);
    assert_eq!(gateway.stats().failures, 3);
}

#[tokio::test]
async fn test_cache_outage_degrades_to_upstream() {
    let upstream = ScriptedUpstream::always(FRACTIONS_REPLY);
    let gateway = Gateway::builder()
        .config(common::fast_config())
        .upstream(upstream.clone())
        .cache_store(Arc::new(BrokenCache))
        .usage_store(Arc::new(MemoryUsageStore::new()))
        .build()
        .unwrap();

    for _ in 0..2 {
        let resp = gateway.invoke(lesson("Fractions")).await.unwrap();
        assert!(!resp.cached());
        assert_eq!(resp.data["title"], "Fractions");
    }
    assert_eq!(upstream.calls(), 2);
    assert!(gateway.cache_stats().errors >= 2);

    // Operator-triggered invalidation reports the outage instead of hiding it.
    assert!(matches!(
        gateway.clear_by_pattern("ai_cache:*").await,
        Err(Error::Store { .. })
    ));
}

#[tokio::test]
async fn test_usage_outage_does_not_fail_calls() {
    let upstream = ScriptedUpstream::always("fine answer");
    let gateway = Gateway::builder()
        .config(common::fast_config())
        .upstream(upstream.clone())
        .usage_store(Arc::new(BrokenUsageStore))
        .build()
        .unwrap();

    assert!(!gateway.invoke(chat("hi")).await.unwrap().cached());
    assert!(gateway.invoke(chat("hi")).await.unwrap().cached());
    assert!(gateway.summarize("student-1", 7).await.is_err());
}

/// Upstream that fails with `status` after `delay_ms`, counting calls.
struct SlowFail {
    delay: Duration,
    status: u16,
    calls: std::sync::atomic::AtomicUsize,
}

impl SlowFail {
    fn new(delay_ms: u64, status: u16) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            status,
            calls: Default::default(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ai_gateway::transport::Upstream for SlowFail {
    async fn call(
        &self,
        _endpoint: Endpoint,
        _payload: &serde_json::Value,
    ) -> ai_gateway::Result<ai_gateway::transport::UpstreamReply> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(Error::upstream(Some(self.status), "overloaded"))
    }

    fn name(&self) -> &'static str {
        "slow-fail"
    }
}
