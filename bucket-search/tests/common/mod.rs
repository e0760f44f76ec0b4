#![allow(dead_code)]

use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_service_account_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test_service_account_pub.pem");
pub const TEST_CLIENT_EMAIL: &str = "indexer@test-project.iam.gserviceaccount.com";

pub fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "client_email": TEST_CLIENT_EMAIL,
        "private_key": TEST_PRIVATE_KEY,
        "token_uri": token_uri,
    })
    .to_string()
}

/// Writes a service-account key pointing at `server`'s `/token` route.
pub fn write_service_account(dir: &TempDir, server: &MockServer) -> PathBuf {
    let path = dir.path().join("service-account.json");
    std::fs::write(&path, service_account_json(&format!("{}/token", server.uri())))
        .expect("write service account file");
    path
}

/// Mounts a token endpoint that accepts any JWT-bearer assertion.
pub async fn mount_token_endpoint(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}
