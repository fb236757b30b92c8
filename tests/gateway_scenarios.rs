//! End-to-end gateway behaviour against a scripted in-process upstream.

mod common;

use ai_gateway::cache::CachePolicy;
use ai_gateway::structured::ExpectedShape;
use ai_gateway::{CallRequest, Endpoint, RecoveryQuality, ResponseSource};
use common::{Fixture, ScriptedUpstream, Step, FRACTIONS_REPLY};
use futures::future::join_all;
use serde_json::json;
use std::time::Duration;

fn fractions_request() -> CallRequest {
    CallRequest::new(
        Endpoint::LessonGeneration,
        json!({"topic": "Fractions", "difficulty": "beginner"}),
        "student-1",
    )
}

fn chat(message: &str) -> CallRequest {
    CallRequest::new(Endpoint::Chat, json!({ "message": message }), "student-1")
}

#[tokio::test]
async fn test_lesson_is_recovered_then_served_from_cache() {
    let fx = Fixture::new(ScriptedUpstream::always(FRACTIONS_REPLY));

    let first = fx.gateway.invoke(fractions_request()).await.unwrap();
    assert!(!first.cached());
    assert_eq!(first.source, ResponseSource::Upstream);
    assert_eq!(first.data["title"], "Fractions");
    assert_eq!(first.data["exercises"][0]["answer"], "4");
    assert!(ExpectedShape::lesson().conforms(&first.data));
    assert_eq!(first.to_caller_json()["cached"], false);

    let second = fx.gateway.invoke(fractions_request()).await.unwrap();
    assert!(second.cached());
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.data, first.data);
    assert_eq!(second.quality, first.quality);
    assert_eq!(second.to_caller_json()["cached"], true);
    assert_eq!(fx.upstream.calls(), 1);

    let usage = fx.gateway.summarize("student-1", 7).await.unwrap();
    assert_eq!(usage.total_requests, 2);
    assert_eq!(usage.cached_requests, 1);
    assert_eq!(usage.cache_hit_rate, 0.5);
    assert!(usage.estimated_cost > 0.0);
    // The hit is charged nothing; what it would have cost shows up as savings.
    assert!((usage.estimated_savings - usage.estimated_cost).abs() < 1e-12);

    let lesson = &usage.by_endpoint[&Endpoint::LessonGeneration];
    assert_eq!((lesson.requests, lesson.cached_requests), (2, 1));

    let stats = fx.gateway.stats();
    assert_eq!(stats.upstream_calls, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn test_trailing_comma_reply_is_marked_repaired() {
    let fx = Fixture::new(ScriptedUpstream::always(FRACTIONS_REPLY));
    let resp = fx.gateway.invoke(fractions_request()).await.unwrap();
    assert_eq!(resp.quality, Some(RecoveryQuality::Repaired));
    assert!(resp.is_degraded());
    assert_eq!(fx.gateway.stats().degraded_recoveries, 1);
}

#[tokio::test]
async fn test_clear_by_pattern_removes_only_matching_keys() {
    let fx = Fixture::new(ScriptedUpstream::always(FRACTIONS_REPLY));

    for msg in ["what is a fraction?", "what is a half?", "what is a third?"] {
        fx.gateway.invoke(chat(msg)).await.unwrap();
    }
    for topic in ["Fractions", "Decimals"] {
        let req = CallRequest::new(
            Endpoint::LessonGeneration,
            json!({ "topic": topic }),
            "student-1",
        );
        fx.gateway.invoke(req).await.unwrap();
    }
    assert_eq!(fx.cached_entries().await, 5);

    let cleared = fx.gateway.clear_by_pattern("ai_cache:chat:*").await.unwrap();
    assert_eq!(cleared.keys_cleared, 3);
    assert_eq!(cleared.pattern, "ai_cache:chat:*");
    assert_eq!(
        serde_json::to_value(&cleared).unwrap(),
        json!({"keysCleared": 3, "pattern": "ai_cache:chat:*"})
    );
    assert_eq!(fx.cached_entries().await, 2);

    let calls_before = fx.upstream.calls();
    let again = fx.gateway.invoke(chat("what is a fraction?")).await.unwrap();
    assert!(!again.cached());
    assert_eq!(fx.upstream.calls(), calls_before + 1);

    let lesson = CallRequest::new(
        Endpoint::LessonGeneration,
        json!({"topic": "Decimals"}),
        "student-1",
    );
    assert!(fx.gateway.invoke(lesson).await.unwrap().cached());
}

#[tokio::test]
async fn test_clear_by_pattern_rejects_empty_pattern() {
    let fx = Fixture::new(ScriptedUpstream::always("ok"));
    let err = fx.gateway.clear_by_pattern("  ").await.unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn test_streaming_and_inline_binary_are_never_written() {
    let fx = Fixture::new(ScriptedUpstream::always("a streamed answer"));

    for _ in 0..2 {
        let resp = fx
            .gateway
            .invoke(chat("tell me a story").streaming(true))
            .await
            .unwrap();
        assert!(!resp.cached());
    }

    let inline = format!("data:image/png;base64,{}", "iVBORw0KGgo".repeat(40));
    for _ in 0..2 {
        let req = CallRequest::new(
            Endpoint::ImageAnalysis,
            json!({ "image": inline }),
            "student-1",
        )
        .detect_media();
        assert!(req.contains_binary);
        assert!(!fx.gateway.invoke(req).await.unwrap().cached());
    }

    assert_eq!(fx.upstream.calls(), 4);
    assert_eq!(fx.cached_entries().await, 0);
}

#[tokio::test]
async fn test_media_analysis_cached_only_with_stable_reference() {
    let fx = Fixture::new(ScriptedUpstream::always("a cat sitting on a mat"));
    let by_url = || {
        CallRequest::new(
            Endpoint::ImageAnalysis,
            json!({"imageUrl": "https://cdn.example.com/cat.png"}),
            "student-1",
        )
        .detect_media()
    };

    assert!(!fx.gateway.invoke(by_url()).await.unwrap().cached());
    assert!(fx.gateway.invoke(by_url()).await.unwrap().cached());

    // Same payload without the stable-reference signal bypasses the cache.
    let unsignalled = CallRequest::new(
        Endpoint::ImageAnalysis,
        json!({"imageUrl": "https://cdn.example.com/cat.png"}),
        "student-1",
    );
    assert!(!fx.gateway.invoke(unsignalled).await.unwrap().cached());
    assert_eq!(fx.upstream.calls(), 2);
}

#[tokio::test]
async fn test_unshaped_endpoint_returns_reply_text() {
    let fx = Fixture::new(ScriptedUpstream::always("Half of eight is four."));
    let resp = fx.gateway.invoke(chat("half of 8?")).await.unwrap();
    assert_eq!(resp.data, json!({"response": "Half of eight is four."}));
    assert_eq!(resp.quality, None);
    assert_eq!(
        resp.to_caller_json(),
        json!({"response": "Half of eight is four.", "cached": false})
    );
}

#[tokio::test]
async fn test_concurrent_identical_misses_share_one_upstream_call() {
    let fx = Fixture::new(ScriptedUpstream::new(vec![Step::slow(
        100,
        "One shared answer for everybody.",
    )]));

    let results = join_all((0..5).map(|_| fx.gateway.invoke(chat("same question")))).await;
    let responses: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(fx.upstream.calls(), 1);
    assert_eq!(
        responses.iter().filter(|r| r.source == ResponseSource::Upstream).count(),
        1
    );
    assert_eq!(
        responses.iter().filter(|r| r.source == ResponseSource::Coalesced).count(),
        4
    );
    assert!(responses.iter().all(|r| r.data == responses[0].data));
    assert_eq!(fx.gateway.stats().coalesced, 4);

    let usage = fx.gateway.summarize("student-1", 1).await.unwrap();
    assert_eq!(usage.total_requests, 5);
    assert_eq!(usage.cached_requests, 4);
}

#[tokio::test]
async fn test_coalescing_can_be_disabled() {
    let mut config = common::fast_config();
    config.single_flight = false;
    let fx = Fixture::with_config(
        ScriptedUpstream::new(vec![Step::slow(50, "independent answer")]),
        config,
    );

    let results = join_all((0..3).map(|_| fx.gateway.invoke(chat("same question")))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(fx.upstream.calls(), 3);
}

#[tokio::test]
async fn test_generation_retries_through_escalating_deadlines() {
    let fx = Fixture::new(ScriptedUpstream::new(vec![
        Step::slow(1_000, FRACTIONS_REPLY),
        Step::reply("{}"),
        Step::reply(FRACTIONS_REPLY),
    ]));

    let resp = fx.gateway.invoke(fractions_request()).await.unwrap();
    assert_eq!(resp.data["title"], "Fractions");
    assert_eq!(fx.upstream.calls(), 3);
    assert_eq!(fx.gateway.stats().upstream_calls, 3);
}

#[tokio::test]
async fn test_unparseable_lesson_is_synthesized_and_flagged() {
    let fx = Fixture::new(ScriptedUpstream::always(
        "I'm sorry, the lesson \"title\": \"Fractions\" could not be completed because the model is busy.",
    ));

    let resp = fx.gateway.invoke(fractions_request()).await.unwrap();
    assert_eq!(resp.quality, Some(RecoveryQuality::Synthesized));
    assert!(resp.is_degraded());
    assert_eq!(resp.data["title"], "Fractions");
    assert!(ExpectedShape::lesson().conforms(&resp.data));
    assert_eq!(fx.gateway.stats().degraded_recoveries, 1);
}

#[tokio::test]
async fn test_synthesized_lesson_is_not_cached() {
    let fx = Fixture::new(ScriptedUpstream::new(vec![
        Step::reply("The lesson service is busy right now, please try again in a few minutes."),
        Step::reply(FRACTIONS_REPLY),
    ]));

    let first = fx.gateway.invoke(fractions_request()).await.unwrap();
    assert_eq!(first.quality, Some(RecoveryQuality::Synthesized));
    assert_eq!(fx.cached_entries().await, 0);

    let second = fx.gateway.invoke(fractions_request()).await.unwrap();
    assert!(!second.cached());
    assert_eq!(second.data["title"], "Fractions");
    assert_eq!(fx.upstream.calls(), 2);

    // A real lesson replaces the fallback and is cached as usual.
    assert!(fx.gateway.invoke(fractions_request()).await.unwrap().cached());
    assert_eq!(fx.upstream.calls(), 2);
}

#[tokio::test]
async fn test_lesson_with_code_blocks_is_clean_and_cached() {
    let lesson = json!({
        "title": "Python",
        "description": "Printing values",
        "content": "Example:\n```python\nprint(1)\n```\nThen run ```print(2)```.",
        "objectives": ["Call print"],
        "exercises": []
    });
    let raw = format!(
        "```json\n{}\n```",
        serde_json::to_string_pretty(&lesson).unwrap()
    );
    let fx = Fixture::new(ScriptedUpstream::always(raw));

    let req = CallRequest::new(
        Endpoint::LessonGeneration,
        json!({"topic": "Python"}),
        "student-1",
    );
    let first = fx.gateway.invoke(req.clone()).await.unwrap();
    assert_eq!(first.quality, Some(RecoveryQuality::Clean));
    assert_eq!(first.data, lesson);
    assert!(fx.gateway.invoke(req).await.unwrap().cached());
}

#[tokio::test]
async fn test_custom_shape_registered_on_builder() {
    use ai_gateway::structured::FieldSpec;

    let upstream = ScriptedUpstream::always(r#"{"summary": "A cat on a mat", "confidence": 0.9}"#);
    let gateway = ai_gateway::Gateway::builder()
        .config(common::fast_config())
        .upstream(upstream.clone())
        .shape(
            Endpoint::ImageAnalysis,
            ExpectedShape::new("image_summary")
                .with_field(FieldSpec::string("summary"))
                .with_field(FieldSpec::array("labels")),
        )
        .build()
        .unwrap();

    let req = CallRequest::new(
        Endpoint::ImageAnalysis,
        json!({"imageUrl": "https://cdn.example.com/cat.png"}),
        "student-1",
    );
    let resp = gateway.invoke(req).await.unwrap();
    assert_eq!(resp.data["summary"], "A cat on a mat");
    assert_eq!(resp.data["labels"], json!([]));
    assert_eq!(resp.quality, Some(RecoveryQuality::Repaired));
}

#[tokio::test]
async fn test_reloaded_policy_ttl_applies_to_new_entries() {
    let fx = Fixture::new(ScriptedUpstream::always("short lived answer"));
    fx.gateway
        .reload_policy(CachePolicy::new().with_ttl(Endpoint::Chat, 1));
    assert_eq!(fx.gateway.policy().ttl_seconds(Endpoint::Chat), 1);

    fx.gateway.invoke(chat("ttl?")).await.unwrap();
    assert!(fx.gateway.invoke(chat("ttl?")).await.unwrap().cached());

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(!fx.gateway.invoke(chat("ttl?")).await.unwrap().cached());
    assert_eq!(fx.upstream.calls(), 2);
}

#[tokio::test]
async fn test_keys_are_scoped_per_user() {
    let fx = Fixture::new(ScriptedUpstream::always("answer"));
    fx.gateway.invoke(chat("hello")).await.unwrap();

    let other_user = CallRequest::new(Endpoint::Chat, json!({"message": "hello"}), "student-2");
    assert!(!fx.gateway.invoke(other_user.clone()).await.unwrap().cached());
    assert_ne!(fx.gateway.cache_key(&chat("hello")), fx.gateway.cache_key(&other_user));
}
