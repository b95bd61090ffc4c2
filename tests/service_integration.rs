use cv_analyzer::core::{AnalysisSession, ConnectionProber, Endpoint, ErrorKind, Phase};
use cv_analyzer::{ClientConfig, ResumeFile};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server_uri: &str) -> ClientConfig {
    let mut config = ClientConfig::default().with_base_url(format!("{}/api/v1/", server_uri));
    config.retry_delay_ms = 10;
    config
}

fn resume() -> ResumeFile {
    ResumeFile::from_bytes("resume.pdf", b"%PDF-1.4 test resume".to_vec())
}

fn analysis_body() -> serde_json::Value {
    json!({
        "success": true,
        "data": {
            "atsScore": 72,
            "matchPercentage": 68,
            "missingKeywords": ["Python", "SQL"],
            "strengths": ["Leadership"],
            "recommendations": ["Add Python experience"]
        }
    })
}

#[tokio::test]
async fn analyze_success_publishes_exact_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/analyze"))
        .and(header("accept", "application/json"))
        .and(body_string_contains("name=\"job_description\""))
        .and(body_string_contains("name=\"resume\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis_body()))
        .expect(1)
        .mount(&server)
        .await;

    let session = AnalysisSession::from_config(&config_for(&server.uri())).unwrap();
    let envelope = session.analyze("Python data engineer", resume()).await.unwrap();

    let result = envelope.data().unwrap();
    assert_eq!(result.ats_score, 72);
    assert_eq!(result.match_percentage, 68);
    assert_eq!(result.missing_keywords, vec!["Python", "SQL"]);
    assert_eq!(result.strengths, vec!["Leadership"]);
    assert_eq!(result.recommendations, vec!["Add Python experience"]);

    let state = session.analyze_mutation().state();
    assert_eq!(state.phase, Phase::Success);
    assert_eq!(state.data.as_ref(), Some(&envelope));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn oversized_upload_is_classified_as_file_too_large() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/analyze"))
        .respond_with(ResponseTemplate::new(413))
        .mount(&server)
        .await;

    let session = AnalysisSession::from_config(&config_for(&server.uri())).unwrap();
    let err = session.analyze("job", resume()).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::FileTooLarge);
    assert_eq!(err.status, Some(413));
    assert!(err.message.contains("5MB"));

    let state = session.analyze_mutation().state();
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.error.as_ref().map(|e| e.kind), Some(ErrorKind::FileTooLarge));
    assert!(state.data.is_none());
}

#[tokio::test]
async fn history_is_served_from_cache_within_stale_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{
                "id": "a-1",
                "fileName": "resume.pdf",
                "createdAt": "2024-05-01T10:00:00Z",
                "atsScore": 80,
                "matchPercentage": 75,
                "missingKeywords": [],
                "strengths": [],
                "recommendations": []
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = AnalysisSession::from_config(&config_for(&server.uri())).unwrap();
    let first = session.history().await.unwrap();
    let second = session.history().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.data().unwrap()[0].result.as_ref().map(|r| r.ats_score),
        Some(80)
    );
}

#[tokio::test]
async fn malformed_envelope_is_unknown_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let session = AnalysisSession::from_config(&config_for(&server.uri())).unwrap();
    let err = session.check_health().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::UnknownError);
    assert!(err.details.is_some());
}

#[tokio::test]
async fn probe_reports_unreachable_backend() {
    // Bind then release a port so nothing is listening on it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = AnalysisSession::from_config(&config_for(&format!("http://{}", addr))).unwrap();
    let result = ConnectionProber::new(session.api().clone()).probe().await;

    assert!(!result.backend_reachable);
    assert!(!result.health_check);
    assert!(!result.endpoint(Endpoint::Analyze));
    assert!(!result.endpoint(Endpoint::Upload));
    assert!(result.error_messages[0].starts_with("Health check failed"));
    assert!(result.suggestions.iter().any(|s| s.contains("running")));
    assert!(result
        .suggestions
        .iter()
        .any(|s| s == &format!("Check if backend is running on port {}", addr.port())));
}

#[tokio::test]
async fn probe_checks_endpoints_even_when_health_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("OPTIONS"))
        .and(path("/api/v1/analyze"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("OPTIONS"))
        .and(path("/api/v1/upload"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let session = AnalysisSession::from_config(&config_for(&server.uri())).unwrap();
    let result = ConnectionProber::new(session.api().clone()).probe().await;

    assert!(!result.backend_reachable);
    assert!(!result.endpoint(Endpoint::Health));
    assert!(result.endpoint(Endpoint::Analyze));
    assert!(result.endpoint(Endpoint::Upload));
    assert_eq!(
        result.error_messages,
        vec!["Health check failed: Server error. Please try again later.".to_string()]
    );
}
