use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deadcheck_core::config::PagerDutyConfig;
use deadcheck_core::FixedTimeSource;

use super::*;

fn config(server: &MockServer) -> PagerDutyConfig {
    PagerDutyConfig {
        api_key: "test-key".to_string(),
        escalation_policy: "PPOLICY".to_string(),
        from: "oncall@example.com".to_string(),
        routing_key: None,
        base_url: Some(server.uri()),
    }
}

fn client(server: &MockServer) -> PagerDutyClient {
    let clock = FixedTimeSource::new(Utc.with_ymd_and_hms(2026, 10, 19, 11, 58, 0).unwrap());
    PagerDutyClient::new(&config(server))
        .unwrap()
        .with_time_source(Arc::new(clock))
}

fn service() -> Service {
    Service {
        id: "PSVC1".to_string(),
        name: "nightly-batch".to_string(),
    }
}

fn policy() -> EscalationPolicy {
    EscalationPolicy {
        id: "PPOLICY".to_string(),
        name: "Platform".to_string(),
    }
}

fn incident(status: IncidentStatus) -> Incident {
    Incident {
        id: "PINC1".to_string(),
        title: "deadcheck: nightly-batch missed its check-in".to_string(),
        status,
        service_id: "PSVC1".to_string(),
    }
}

#[tokio::test]
async fn connect_sends_auth_headers_and_accepts_abilities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/abilities"))
        .and(header("Authorization", "Token token=test-key"))
        .and(header("Accept", "application/vnd.pagerduty+json;version=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "abilities": ["sso", "teams"] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PagerDutyClient::connect(&config(&server)).await;
    assert!(client.is_ok());
}

#[tokio::test]
async fn connect_rejects_empty_abilities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/abilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "abilities": [] })))
        .mount(&server)
        .await;

    let err = PagerDutyClient::connect(&config(&server)).await.unwrap_err();
    assert!(matches!(err, ProviderError::Config(_)), "{err:?}");
}

#[tokio::test]
async fn connect_surfaces_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/abilities"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    match PagerDutyClient::connect(&config(&server)).await.unwrap_err() {
        ProviderError::Status { status, operation, .. } => {
            assert_eq!(status, 401);
            assert_eq!(operation, "list abilities");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[test]
fn empty_api_key_is_rejected() {
    let config = PagerDutyConfig {
        api_key: "  ".to_string(),
        escalation_policy: "PPOLICY".to_string(),
        from: "oncall@example.com".to_string(),
        routing_key: None,
        base_url: None,
    };
    let err = PagerDutyClient::new(&config).unwrap_err();
    assert!(err.to_string().contains("apiKey"));
}

#[tokio::test]
async fn existing_service_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .and(query_param("query", "nightly-batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [
                { "id": "PSVC0", "name": "nightly-batch-old" },
                { "id": "PSVC1", "name": "nightly-batch" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let found = client(&server).find_or_create_service("nightly-batch", &policy()).await.unwrap();
    assert_eq!(found, service());
}

#[tokio::test]
async fn missing_service_is_created_in_maintenance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "services": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services"))
        .and(header("From", "oncall@example.com"))
        .and(body_partial_json(json!({
            "service": {
                "name": "nightly-batch",
                "escalation_policy": { "id": "PPOLICY" }
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "service": { "id": "PSVC1", "name": "nightly-batch" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/maintenance_windows"))
        .and(body_partial_json(json!({
            "maintenance_window": {
                "start_time": "2026-10-19T11:58:00Z",
                "end_time": "2026-10-19T12:03:00Z",
                "services": [{ "id": "PSVC1" }]
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server).find_or_create_service("nightly-batch", &policy()).await.unwrap();
    assert_eq!(created, service());
}

#[tokio::test]
async fn service_is_routed_to_policy_configured_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalation_policies/Platform"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/escalation_policies"))
        .and(query_param("query", "Platform"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "escalation_policies": [{ "id": "PPOLICY", "name": "Platform" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "services": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services"))
        .and(body_partial_json(json!({
            "service": { "escalation_policy": { "id": "PPOLICY", "type": "escalation_policy_reference" } }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "service": { "id": "PSVC1", "name": "nightly-batch" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/maintenance_windows"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;

    let mut by_name = config(&server);
    by_name.escalation_policy = "Platform".to_string();
    let client = PagerDutyClient::new(&by_name).unwrap();

    let resolved = client.find_escalation_policy(&by_name.escalation_policy).await.unwrap();
    let created = client.find_or_create_service("nightly-batch", &resolved).await.unwrap();
    assert_eq!(created, service());
}

#[tokio::test]
async fn escalation_policy_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalation_policies/PPOLICY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "escalation_policy": { "id": "PPOLICY", "name": "Platform" }
        })))
        .mount(&server)
        .await;

    let policy = client(&server).find_escalation_policy("PPOLICY").await.unwrap();
    assert_eq!(policy.id, "PPOLICY");
    assert_eq!(policy.name, "Platform");
}

#[tokio::test]
async fn escalation_policy_falls_back_to_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalation_policies/Platform"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": { "code": 2100 } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/escalation_policies"))
        .and(query_param("query", "Platform"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "escalation_policies": [{ "id": "PPOLICY", "name": "Platform" }]
        })))
        .mount(&server)
        .await;

    let policy = client(&server).find_escalation_policy("Platform").await.unwrap();
    assert_eq!(policy.id, "PPOLICY");
}

#[tokio::test]
async fn unknown_escalation_policy_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalation_policies/Nobody"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/escalation_policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "escalation_policies": [] })))
        .mount(&server)
        .await;

    let err = client(&server).find_escalation_policy("Nobody").await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn open_incident_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/incidents"))
        .and(query_param("service_ids[]", "PSVC1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "incidents": [{
                "id": "PINC1",
                "title": "deadcheck: nightly-batch missed its check-in",
                "status": "acknowledged",
                "service": { "id": "PSVC1" }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/incidents"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let found = client(&server).find_or_create_incident(&service(), &policy()).await.unwrap();
    assert_eq!(found, incident(IncidentStatus::Acknowledged));
}

#[tokio::test]
async fn missing_incident_is_created() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/incidents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "incidents": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/incidents"))
        .and(header("From", "oncall@example.com"))
        .and(body_partial_json(json!({
            "incident": {
                "service": { "id": "PSVC1" },
                "escalation_policy": { "id": "PPOLICY" }
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "incident": {
                "id": "PINC1",
                "title": "deadcheck: nightly-batch missed its check-in",
                "status": "triggered",
                "service": { "id": "PSVC1" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server).find_or_create_incident(&service(), &policy()).await.unwrap();
    assert_eq!(created.status, IncidentStatus::Triggered);
}

#[tokio::test]
async fn snooze_acknowledges_triggered_incident_first() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/incidents/PINC1"))
        .and(body_json(json!({
            "incident": { "type": "incident_reference", "status": "acknowledged" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/incidents/PINC1/snooze"))
        .and(header("From", "oncall@example.com"))
        .and(body_json(json!({ "duration": 3600 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let from = Utc.with_ymd_and_hms(2026, 10, 19, 11, 0, 0).unwrap();
    client(&server)
        .snooze_incident(&incident(IncidentStatus::Triggered), &service(), from, Duration::from_secs(3_600))
        .await
        .unwrap();
}

#[tokio::test]
async fn snooze_skips_acknowledge_when_already_acknowledged() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/incidents/PINC1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/incidents/PINC1/snooze"))
        .and(body_json(json!({ "duration": 1 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let from = Utc.with_ymd_and_hms(2026, 10, 19, 11, 0, 0).unwrap();
    client(&server)
        .snooze_incident(&incident(IncidentStatus::Acknowledged), &service(), from, Duration::ZERO)
        .await
        .unwrap();
}

#[tokio::test]
async fn resolve_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/incidents/PINC1"))
        .and(body_partial_json(json!({ "incident": { "status": "resolved" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/services/PSVC1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.resolve_incident(&incident(IncidentStatus::Acknowledged)).await.unwrap();
    client.delete_service(&service()).await.unwrap();
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).find_or_create_service("nightly-batch", &policy()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Decode { operation: "list services", .. }), "{err:?}");
}
