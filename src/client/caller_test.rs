use super::*;
use crate::backend::test_helpers::{ScriptedBackend, models};
use crate::client::test_helpers::MemoryHistoryStore;
use crate::rate_limit::RateLimitConfig;
use mockito::{Matcher, Server};
use std::sync::atomic::{AtomicUsize, Ordering};

fn caller(proxy_url: String) -> AiCaller<MemoryHistoryStore> {
    caller_with(proxy_url, |_| {})
}

fn caller_with(
    proxy_url: String,
    tweak: impl FnOnce(&mut CallerConfig),
) -> AiCaller<MemoryHistoryStore> {
    let mut config = CallerConfig::new(proxy_url);
    config.retry = RetryPolicy::proxy().with_backoff(Duration::from_millis(5));
    config.fallback_retry = RetryPolicy::direct_backend().with_backoff(Duration::from_millis(5));
    tweak(&mut config);

    let limiter = ClientRateLimiter::new(MemoryHistoryStore::new(), RateLimitConfig::CLIENT);
    AiCaller::new(reqwest::Client::new(), limiter, config, "default system")
}

#[tokio::test]
async fn returns_proxy_text_and_sends_default_system() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/gemini")
        .match_body(Matcher::Json(serde_json::json!({
            "userPrompt": "What projects?",
            "systemInstruction": "default system"
        })))
        .with_status(200)
        .with_body(r#"{"text":"Plenty."}"#)
        .create_async()
        .await;

    let answer = caller(format!("{}/api/gemini", server.url()))
        .ask("What projects?", None)
        .await;

    assert_eq!(answer, "Plenty.");
    mock.assert_async().await;
}

#[tokio::test]
async fn blank_and_oversized_prompts_never_hit_the_network() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/gemini")
        .expect(0)
        .create_async()
        .await;
    let caller = caller(format!("{}/api/gemini", server.url()));

    assert_eq!(caller.ask("   \n", None).await, "Please enter a prompt before sending.");
    assert_eq!(
        caller.ask(&"x".repeat(2001), None).await,
        "Prompt too long. Keep it under 2000 characters."
    );
    assert_eq!(
        caller.ask(&"😀".repeat(1001), None).await,
        "Prompt too long. Keep it under 2000 characters."
    );
    // no limiter slot was used either
    assert!(caller.limiter().admit().is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn rate_limited_twice_means_one_retry_only() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/gemini")
        .with_status(429)
        .with_body(r#"{"error":"Rate limit exceeded for this minute."}"#)
        .expect(2)
        .create_async()
        .await;

    let answer = caller(format!("{}/api/gemini", server.url()))
        .ask("hello", None)
        .await;

    assert_eq!(answer, "AI rate limit reached. Please retry in a moment.");
    mock.assert_async().await;
}

#[tokio::test]
async fn key_restrictions_get_their_own_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gemini")
        .with_status(403)
        .with_body(r#"{"error":"API key not valid"}"#)
        .create_async()
        .await;

    let answer = caller(format!("{}/api/gemini", server.url()))
        .ask("hello", Some("custom"))
        .await;
    assert_eq!(answer, "AI is blocked by API key restrictions on the server.");
}

#[tokio::test]
async fn other_failures_read_as_offline() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/gemini")
        .with_status(503)
        .with_body(r#"{"error":"No available Gemini model responded."}"#)
        .expect(1)
        .create_async()
        .await;

    let answer = caller(format!("{}/api/gemini", server.url()))
        .ask("hello", None)
        .await;

    assert_eq!(answer, "System offline due to API/network issue. Please try again later.");
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_proxy_reads_as_offline_and_frees_the_slot() {
    // nothing listens on the discard port
    let caller = caller("http://127.0.0.1:9/api/gemini".to_string());

    let answer = caller.ask("hello", None).await;

    assert_eq!(answer, "System offline due to API/network issue. Please try again later.");
    assert!(!caller.limiter().is_in_flight());
}

#[tokio::test]
async fn silent_proxy_times_out_then_retries_once() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = connections.clone();
    tokio::spawn(async move {
        // keep sockets open so the client sees a timeout, not a reset
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    let caller = caller_with(format!("http://{addr}/api/gemini"), |config| {
        config.request_timeout = Duration::from_millis(200);
    });
    let answer = caller.ask("hello", None).await;

    assert_eq!(answer, "System offline due to API/network issue. Please try again later.");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert!(!caller.limiter().is_in_flight());
}

#[tokio::test]
async fn success_without_text_is_unavailable() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gemini")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let answer = caller(format!("{}/api/gemini", server.url()))
        .ask("hello", None)
        .await;
    assert_eq!(answer, "AI model unavailable right now. Please try again shortly.");
}

#[tokio::test]
async fn local_limiter_rejection_becomes_the_answer() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/gemini")
        .with_status(200)
        .with_body(r#"{"text":"first"}"#)
        .expect(1)
        .create_async()
        .await;
    let caller = caller(format!("{}/api/gemini", server.url()));

    assert_eq!(caller.ask("one", None).await, "first");
    let second = caller.ask("two", None).await;

    assert!(second.starts_with("You're sending requests too quickly."), "{second}");
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_route_without_dev_flag_is_offline() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gemini")
        .with_status(404)
        .create_async()
        .await;
    let backend = Arc::new(ScriptedBackend::new().reply("m", Ok(Some("direct".into()))));

    let answer = caller(format!("{}/api/gemini", server.url()))
        .with_direct_backend(backend.clone())
        .ask("hello", None)
        .await;

    assert_eq!(answer, "System offline due to API/network issue. Please try again later.");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn missing_route_in_dev_calls_backend_directly() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gemini")
        .with_status(404)
        .create_async()
        .await;
    let backend = Arc::new(
        ScriptedBackend::new()
            .reply("b", Err(BackendError::Timeout))
            .reply("b", Ok(Some("direct answer".into()))),
    );

    let answer = caller_with(format!("{}/api/gemini", server.url()), |config| {
        config.allow_direct_backend_fallback = true;
        config.fallback_models = models(&["a", "b"]);
    })
    .with_direct_backend(backend.clone())
    .ask("hello", None)
    .await;

    assert_eq!(answer, "direct answer");
    assert_eq!(backend.calls(), vec!["a", "b", "b"]);
}

#[tokio::test]
async fn dev_fallback_failures_are_explained() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gemini")
        .with_status(404)
        .create_async()
        .await;
    let url = format!("{}/api/gemini", server.url());
    let dev = |config: &mut CallerConfig| {
        config.allow_direct_backend_fallback = true;
        config.fallback_models = models(&["a"]);
    };

    let no_key = caller_with(url.clone(), dev).ask("hello", None).await;
    assert_eq!(
        no_key,
        "Local API route is unavailable and Gemini fallback failed: Missing VITE_GEMINI_KEY in local .env."
    );

    let exhausted = caller_with(url.clone(), dev)
        .with_direct_backend(Arc::new(ScriptedBackend::new()))
        .ask("hello", None)
        .await;
    assert!(exhausted.ends_with("No available Gemini model responded in local fallback."));

    let rejected = caller_with(url, dev)
        .with_direct_backend(Arc::new(
            ScriptedBackend::new().reply("a", Err(BackendError::Api { status: 400, message: None })),
        ))
        .ask("hello", None)
        .await;
    assert!(rejected.ends_with("Gemini error 400"), "{rejected}");
}
