//! Azure accessor tests with HTTP mocking.

use crate::error::Error;
use crate::providers::{
    ARecord, AzureDnsAccessor, ClientSecretCredential, ETag, RecordSet, ZoneRecordAccessor,
    ZoneRef,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECORD_PATH: &str =
    "/subscriptions/sub-1/resourceGroups/dns-rg/providers/Microsoft.Network/dnsZones/example.com/A/home";

fn zone() -> ZoneRef {
    ZoneRef {
        subscription_id: "sub-1".to_string(),
        resource_group: "dns-rg".to_string(),
        zone_name: "example.com".to_string(),
    }
}

fn accessor(server: &MockServer) -> AzureDnsAccessor {
    let credential = ClientSecretCredential::new(
        server.uri(),
        "tenant-1".to_string(),
        "client-1".to_string(),
        "secret".to_string(),
        format!("{}/.default", server.uri()),
    )
    .unwrap();

    AzureDnsAccessor::new(credential, server.uri(), "2018-05-01".to_string()).unwrap()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "test-token"
        })))
        .mount(server)
        .await;
}

fn record_set_body(etag: &str, addresses: &[&str]) -> serde_json::Value {
    let records: Vec<serde_json::Value> = addresses
        .iter()
        .map(|ip| json!({ "ipv4Address": ip }))
        .collect();

    json!({
        "id": RECORD_PATH,
        "name": "home",
        "type": "Microsoft.Network/dnszones/A",
        "etag": etag,
        "properties": {
            "metadata": { "owner": "dynip" },
            "TTL": 300,
            "fqdn": "home.example.com.",
            "provisioningState": "Succeeded",
            "ARecords": records
        }
    })
}

#[tokio::test]
async fn test_fetch_record_set() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .and(query_param("api-version", "2018-05-01"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(record_set_body("etag-1", &["203.0.113.4"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record_set = accessor(&server).fetch(&zone(), "home").await.unwrap();

    assert_eq!(record_set.name, "home");
    assert_eq!(record_set.ttl, Some(300));
    assert_eq!(record_set.fqdn.as_deref(), Some("home.example.com."));
    assert_eq!(record_set.etag, ETag("etag-1".to_string()));
    assert_eq!(record_set.first_address().as_deref(), Some("203.0.113.4"));
    assert_eq!(record_set.metadata.get("owner").map(String::as_str), Some("dynip"));
}

#[tokio::test]
async fn test_fetch_empty_record_set() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(record_set_body("etag-1", &[])))
        .mount(&server)
        .await;

    let record_set = accessor(&server).fetch(&zone(), "home").await.unwrap();
    assert!(record_set.a_records.is_empty());
    assert_eq!(record_set.first_address(), None);
}

#[tokio::test]
async fn test_fetch_zone_not_found() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": "ParentResourceNotFound",
                "message": "Can not perform requested operation on nested resource. Parent resource 'example.com' not found."
            }
        })))
        .mount(&server)
        .await;

    let result = accessor(&server).fetch(&zone(), "home").await;
    assert!(matches!(result, Err(Error::ZoneNotFound { ref zone }) if zone == "example.com"));
}

#[tokio::test]
async fn test_fetch_record_set_not_found() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "NotFound",
            "message": "The resource record 'home' does not exist in resource group 'dns-rg'."
        })))
        .mount(&server)
        .await;

    let result = accessor(&server).fetch(&zone(), "home").await;
    assert!(matches!(result, Err(Error::RecordSetNotFound { .. })));
}

#[tokio::test]
async fn test_fetch_forbidden() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "client does not have authorization" }
        })))
        .mount(&server)
        .await;

    let result = accessor(&server).fetch(&zone(), "home").await;
    match result {
        Err(Error::Authorization(msg)) => assert!(msg.contains("does not have authorization")),
        other => panic!("expected authorization error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_failure_skips_dns_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = accessor(&server).fetch(&zone(), "home").await;
    match result {
        Err(Error::Authorization(msg)) => assert!(msg.starts_with("invalid_client")),
        other => panic!("expected authorization error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "test-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(record_set_body("etag-1", &["203.0.113.4"])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let accessor = accessor(&server);
    accessor.fetch(&zone(), "home").await.unwrap();
    accessor.fetch(&zone(), "home").await.unwrap();
}

#[tokio::test]
async fn test_fetch_reuses_credential_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "test-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(record_set_body("etag-1", &["203.0.113.4"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let accessor = accessor(&server);
    assert_eq!(accessor.credential().token().await.unwrap(), "test-token");
    accessor.fetch(&zone(), "home").await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_is_requested_again() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "revoked-token"
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "InvalidAuthenticationToken", "message": "The access token is invalid." }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let accessor = accessor(&server);
    let first = accessor.fetch(&zone(), "home").await;
    let second = accessor.fetch(&zone(), "home").await;

    assert!(matches!(first, Err(Error::Authorization(_))));
    assert!(matches!(second, Err(Error::Authorization(_))));
}

#[tokio::test]
async fn test_forbidden_keeps_cached_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "test-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "client does not have authorization" }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let accessor = accessor(&server);
    assert!(accessor.fetch(&zone(), "home").await.is_err());
    assert!(accessor.fetch(&zone(), "home").await.is_err());
}

#[tokio::test]
async fn test_token_with_oversized_lifetime() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 1_000_000_000_000_000_i64,
            "access_token": "test-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(record_set_body("etag-1", &["203.0.113.4"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record_set = accessor(&server).fetch(&zone(), "home").await.unwrap();
    assert_eq!(record_set.etag, ETag("etag-1".to_string()));
}

#[tokio::test]
async fn test_update_is_conditional() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("PATCH"))
        .and(path(RECORD_PATH))
        .and(query_param("api-version", "2018-05-01"))
        .and(header("Authorization", "Bearer test-token"))
        .and(header("If-Match", "etag-1"))
        .and(body_string_contains(r#""ipv4Address":"203.0.113.5""#))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(record_set_body("etag-2", &["203.0.113.5"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut record_set = RecordSet {
        name: "home".to_string(),
        fqdn: Some("home.example.com.".to_string()),
        ttl: Some(300),
        metadata: HashMap::new(),
        a_records: vec![ARecord::new(Ipv4Addr::new(203, 0, 113, 4))],
        etag: ETag("etag-1".to_string()),
    };
    record_set.replace_addresses(Ipv4Addr::new(203, 0, 113, 5));

    let updated = accessor(&server)
        .update(&zone(), "home", &record_set, &ETag("etag-1".to_string()))
        .await
        .unwrap();

    assert_eq!(updated.a_records.len(), 1);
    assert_eq!(updated.first_address().as_deref(), Some("203.0.113.5"));
    assert_eq!(updated.etag, ETag("etag-2".to_string()));
}

#[tokio::test]
async fn test_update_with_stale_etag() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("PATCH"))
        .and(path(RECORD_PATH))
        .and(header("If-Match", "etag-stale"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "code": "PreconditionFailed",
            "message": "The Record set home has been modified (etag mismatch)."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record_set = RecordSet {
        name: "home".to_string(),
        fqdn: None,
        ttl: Some(300),
        metadata: HashMap::new(),
        a_records: vec![ARecord::new(Ipv4Addr::new(203, 0, 113, 5))],
        etag: ETag("etag-stale".to_string()),
    };

    let err = accessor(&server)
        .update(&zone(), "home", &record_set, &ETag("etag-stale".to_string()))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(err.to_string().contains("etag-stale"));
}

#[tokio::test]
async fn test_server_error_is_provider_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let result = accessor(&server).fetch(&zone(), "home").await;
    assert!(matches!(result, Err(Error::Provider { status: 503, .. })));
}

#[test]
fn test_normalized_address() {
    let padded = ARecord {
        ipv4_address: Some(" 203.0.113.5 ".to_string()),
    };
    assert_eq!(padded.normalized_address().as_deref(), Some("203.0.113.5"));

    let garbage = ARecord {
        ipv4_address: Some("not-an-ip".to_string()),
    };
    assert_eq!(garbage.normalized_address().as_deref(), Some("not-an-ip"));

    let missing = ARecord { ipv4_address: None };
    assert_eq!(missing.normalized_address(), None);
}
