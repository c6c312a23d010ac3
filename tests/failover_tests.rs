// Provider manager failover tests over real adapters and wiremock upstreams

mod mocks;

use llm_broker::error::{AppError, ErrorKind};
use llm_broker::manager::{OverallHealth, ProviderManager, ProviderStatus};
use llm_broker::models::{ChatMessage, ChatRequest};
use llm_broker::providers::{LlmProvider, OpenAIProvider};
use mocks::{openai_instance, setup_openai_error_mock, setup_openai_mock};
use reqwest::Client;
use std::sync::Arc;
use wiremock::MockServer;

fn provider(name: &str, server: &MockServer) -> Arc<dyn LlmProvider> {
    Arc::new(OpenAIProvider::new("openai", openai_instance(name, server), Client::new()))
}

fn request() -> ChatRequest {
    ChatRequest::new("gpt-4", vec![ChatMessage::user("ping")])
}

#[tokio::test]
async fn test_failover_to_healthy_provider() {
    let broken = setup_openai_error_mock(503, 200, None).await;
    let healthy = setup_openai_mock("pong", Some(1)).await;

    let manager = ProviderManager::new(vec![provider("broken", &broken), provider("healthy", &healthy)]);

    let response = manager.generate(&request(), None).await.unwrap();
    assert_eq!(response.provider, "healthy");
    assert_eq!(response.content, "pong");

    let snapshots = manager.provider_stats().await;
    let healthy_stats = &snapshots.iter().find(|s| s.name == "healthy").unwrap().stats;
    assert_eq!(healthy_stats.successful_requests, 1);
    assert_eq!(healthy_stats.failed_requests, 0);
}

#[tokio::test]
async fn test_all_providers_failed_lists_every_failure() {
    let first = setup_openai_error_mock(503, 200, None).await;
    let second = setup_openai_error_mock(502, 200, None).await;
    let third = setup_openai_error_mock(429, 200, None).await;

    let manager = ProviderManager::with_seed(
        vec![provider("a", &first), provider("b", &second), provider("c", &third)],
        7,
    );

    match manager.generate(&request(), None).await {
        Err(AppError::AllProvidersFailed { failures }) => {
            assert_eq!(failures.len(), 3);
            let mut names: Vec<_> = failures.iter().map(|f| f.provider.as_str()).collect();
            names.sort_unstable();
            assert_eq!(names, vec!["a", "b", "c"]);

            let rate_limited = failures.iter().find(|f| f.provider == "c").unwrap();
            assert_eq!(rate_limited.kind, ErrorKind::RateLimited);
        }
        other => panic!("expected aggregate failure, got {:?}", other),
    }

    // Each provider is tried exactly once
    for server in [&first, &second, &third] {
        let chat_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/v1/chat/completions")
            .count();
        assert_eq!(chat_calls, 1);
    }
}

#[tokio::test]
async fn test_pinned_provider_is_not_failed_over() {
    let pinned = setup_openai_error_mock(503, 200, None).await;
    let other = setup_openai_mock("unused", Some(0)).await;

    let manager = ProviderManager::new(vec![provider("pinned", &pinned), provider("other", &other)]);

    let error = manager.generate(&request(), Some("pinned")).await.unwrap_err();
    assert!(matches!(error, AppError::ServiceUnavailable { ref provider, .. } if provider == "pinned"));
}

#[tokio::test]
async fn test_inactive_preference_falls_back_to_selection() {
    let rejected = setup_openai_error_mock(200, 401, None).await;
    let healthy = setup_openai_mock("pong", Some(1)).await;

    let manager = ProviderManager::new(vec![provider("rejected", &rejected), provider("healthy", &healthy)]);

    let response = manager.generate(&request(), Some("rejected")).await.unwrap();
    assert_eq!(response.provider, "healthy");
}

#[tokio::test]
async fn test_failed_initialization_excludes_provider() {
    let rejected = setup_openai_error_mock(200, 401, None).await;
    let healthy = setup_openai_mock("pong", None).await;

    let manager = ProviderManager::new(vec![provider("rejected", &rejected), provider("healthy", &healthy)]);

    let report = manager.health_check().await;
    assert_eq!(report.overall, OverallHealth::Degraded);
    assert_eq!(report.total_providers, 2);
    assert_eq!(report.active_providers, 1);

    let rejected_health = report.providers.iter().find(|p| p.name == "rejected").unwrap();
    assert!(!rejected_health.healthy);
    assert!(rejected_health.error.is_some());

    for _ in 0..5 {
        let response = manager.generate(&request(), None).await.unwrap();
        assert_eq!(response.provider, "healthy");
    }

    let snapshots = manager.provider_stats().await;
    let rejected_stats = &snapshots.iter().find(|s| s.name == "rejected").unwrap().stats;
    assert!(matches!(rejected_stats.status, ProviderStatus::Error(_)));
    assert_eq!(rejected_stats.total_requests, 0);
}

#[tokio::test]
async fn test_no_healthy_providers() {
    let first = setup_openai_error_mock(200, 401, None).await;
    let second = setup_openai_error_mock(200, 403, None).await;

    let manager = ProviderManager::new(vec![provider("a", &first), provider("b", &second)]);

    let error = manager.generate(&request(), None).await.unwrap_err();
    assert!(matches!(error, AppError::NoHealthyProviders(_)));
    assert_eq!(manager.health_check().await.overall, OverallHealth::Unhealthy);
}

#[tokio::test]
async fn test_non_retryable_error_stops_failover() {
    let bad_request = setup_openai_error_mock(400, 200, None).await;

    let manager = ProviderManager::new(vec![provider("strict", &bad_request)]);

    let error = manager.generate(&request(), None).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::BadRequest);
}
