use super::test_helpers::{ScriptedBackend, models};
use super::*;
use std::time::Duration;

fn fast_timeout_retry() -> RetryPolicy {
    RetryPolicy::direct_backend().with_backoff(Duration::from_millis(1))
}

#[test]
fn attempt_list_puts_preferred_first_and_dedups() {
    assert_eq!(
        model_attempt_list(Some("gemini-2.0-pro")),
        vec!["gemini-2.0-pro", "gemini-2.5-flash", "gemini-1.5-flash"]
    );
    assert_eq!(
        model_attempt_list(Some("gemini-1.5-flash")),
        vec!["gemini-1.5-flash", "gemini-2.5-flash"]
    );
}

#[test]
fn attempt_list_drops_blank_preferred() {
    assert_eq!(model_attempt_list(Some("  ")), model_attempt_list(None));
    assert_eq!(model_attempt_list(None), vec!["gemini-2.5-flash", "gemini-1.5-flash"]);
}

#[tokio::test]
async fn not_found_moves_to_next_model_and_stops_on_text() {
    let backend = ScriptedBackend::new()
        .reply("b", Ok(Some("hello".into())))
        .reply("c", Ok(Some("unused".into())));

    let text = generate_with_fallback(&backend, &models(&["a", "b", "c"]), "hi", "sys", &RetryPolicy::none())
        .await
        .unwrap();

    assert_eq!(text, "hello");
    assert_eq!(backend.calls(), vec!["a", "b"]);
}

#[tokio::test]
async fn empty_completion_is_skipped() {
    let backend = ScriptedBackend::new()
        .reply("a", Ok(None))
        .reply("b", Ok(Some("second".into())));

    let text = generate_with_fallback(&backend, &models(&["a", "b"]), "hi", "sys", &RetryPolicy::none())
        .await
        .unwrap();
    assert_eq!(text, "second");
}

#[tokio::test]
async fn every_model_missing_is_exhaustion() {
    let backend = ScriptedBackend::new();

    let err = generate_with_fallback(&backend, &models(&["a", "b", "c"]), "hi", "sys", &RetryPolicy::none())
        .await
        .unwrap_err();

    assert!(matches!(err, FallbackError::Exhausted));
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test]
async fn other_failures_stop_the_walk() {
    let backend = ScriptedBackend::new()
        .reply("a", Err(BackendError::Api { status: 403, message: Some("key restricted".into()) }))
        .reply("b", Ok(Some("never".into())));

    let err = generate_with_fallback(&backend, &models(&["a", "b"]), "hi", "sys", &RetryPolicy::none())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FallbackError::Backend(BackendError::Api { status: 403, .. })
    ));
    assert_eq!(backend.calls(), vec!["a"]);
}

#[tokio::test]
async fn timeout_is_retried_once_per_model() {
    let backend = ScriptedBackend::new()
        .reply("a", Err(BackendError::Timeout))
        .reply("a", Ok(Some("late".into())));

    let text = generate_with_fallback(&backend, &models(&["a"]), "hi", "sys", &fast_timeout_retry())
        .await
        .unwrap();

    assert_eq!(text, "late");
    assert_eq!(backend.calls(), vec!["a", "a"]);
}

#[tokio::test]
async fn second_timeout_is_terminal() {
    let backend = ScriptedBackend::new()
        .reply("a", Err(BackendError::Timeout))
        .reply("a", Err(BackendError::Timeout))
        .reply("b", Ok(Some("unused".into())));

    let err = generate_with_fallback(&backend, &models(&["a", "b"]), "hi", "sys", &fast_timeout_retry())
        .await
        .unwrap_err();

    assert!(matches!(err, FallbackError::Backend(BackendError::Timeout)));
    assert_eq!(backend.calls(), vec!["a", "a"]);
}
