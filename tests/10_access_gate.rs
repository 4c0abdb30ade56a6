mod common;

use anyhow::Result;
use chrono::Duration;
use common::TestServer;
use datashare_api::types::Role;
use reqwest::StatusCode;
use serde_json::Value;

async fn error_code(resp: reqwest::Response) -> Result<(StatusCode, String)> {
    let status = resp.status();
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);
    Ok((status, body["code"].as_str().unwrap_or_default().to_string()))
}

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let server = TestServer::without_database().await?;

    let body: Value = server.client.get(server.url("/")).send().await?.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Datashare API");
    Ok(())
}

#[tokio::test]
async fn missing_token_is_rejected() -> Result<()> {
    let server = TestServer::without_database().await?;

    for path in ["/api/profile", "/api/datasets", "/api/stats", "/api/admin/users"] {
        let resp = server.client.get(server.url(path)).send().await?;
        let (status, code) = error_code(resp).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(code, "NO_TOKEN", "{}", path);
    }
    Ok(())
}

#[tokio::test]
async fn malformed_and_forged_tokens_are_invalid() -> Result<()> {
    let server = TestServer::without_database().await?;

    let forged = datashare_api::auth::TokenService::new("some-other-secret", Duration::minutes(5), Duration::minutes(5))
        .issue_session(1, "someone@example.test", Role::Admin)?;

    for token in ["not-a-jwt", forged.as_str()] {
        let resp = server
            .client
            .get(server.url("/api/profile"))
            .bearer_auth(token)
            .send()
            .await?;
        let (status, code) = error_code(resp).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "TOKEN_INVALID");
    }
    Ok(())
}

#[tokio::test]
async fn expired_token_has_its_own_code() -> Result<()> {
    let server = TestServer::without_database().await?;
    let token = server
        .tokens()
        .issue_session_with_ttl(1, "someone@example.test", Role::User, Duration::seconds(-60))?;

    let resp = server
        .client
        .get(server.url("/api/profile"))
        .bearer_auth(&token)
        .send()
        .await?;
    let (status, code) = error_code(resp).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "TOKEN_EXPIRED");
    Ok(())
}

#[tokio::test]
async fn reset_token_does_not_authenticate_requests() -> Result<()> {
    let server = TestServer::without_database().await?;
    let token = server.tokens().issue_reset(1)?;

    let resp = server
        .client
        .get(server.url("/api/profile"))
        .bearer_auth(&token)
        .send()
        .await?;
    let (status, code) = error_code(resp).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "TOKEN_INVALID");
    Ok(())
}

#[tokio::test]
async fn non_admin_is_forbidden_on_admin_routes() -> Result<()> {
    let server = TestServer::without_database().await?;
    let token = server.tokens().issue_session(42, "user@example.test", Role::User)?;

    let requests = [
        server.client.get(server.url("/api/admin/users")),
        server.client.get(server.url("/api/admin/datasets/pending")),
        server.client.patch(server.url("/api/admin/datasets/1/status")),
        server.client.delete(server.url("/api/admin/datasets/1")),
        server.client.delete(server.url("/api/admin/users/1")),
    ];

    for request in requests {
        let resp = request.bearer_auth(&token).send().await?;
        let (status, code) = error_code(resp).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "FORBIDDEN");
    }
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_json_not_found() -> Result<()> {
    let server = TestServer::without_database().await?;
    let resp = server.client.get(server.url("/api/nope")).send().await?;
    let (status, code) = error_code(resp).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code, "NOT_FOUND");

    let resp = server.client.put(server.url("/api/login")).send().await?;
    let (status, code) = error_code(resp).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(code, "METHOD_NOT_ALLOWED");
    Ok(())
}

#[tokio::test]
async fn non_multipart_uploads_get_json_errors() -> Result<()> {
    let server = TestServer::without_database().await?;
    let token = server.tokens().issue_session(42, "user@example.test", Role::User)?;

    for path in ["/api/datasets/upload", "/api/profile/picture"] {
        let resp = server
            .client
            .post(server.url(path))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "datasetName": "not multipart" }))
            .send()
            .await?;
        let (status, code) = error_code(resp).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(code, "BAD_REQUEST", "{}", path);
    }
    Ok(())
}

#[tokio::test]
async fn undecodable_reset_token_gets_json_error() -> Result<()> {
    let server = TestServer::without_database().await?;
    let resp = server
        .client
        .post(server.url("/api/reset-password/%FF%FE"))
        .json(&serde_json::json!({ "new_password": "whatever" }))
        .send()
        .await?;
    let (status, code) = error_code(resp).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code, "BAD_REQUEST");
    Ok(())
}
