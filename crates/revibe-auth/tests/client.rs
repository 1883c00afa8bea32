//! Integration tests for the auth client.
//!
//! These tests run a one-shot HTTP responder on a local port so the client
//! can be exercised without a real auth server.

#![allow(clippy::unwrap_used)]

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use revibe_auth::{AuthClient, AuthEvent, Error, RemoteAuthority, Session, User, UserUpdate};

/// Serves a single canned response and returns the raw request it received.
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;

        let response = format!(
            "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        request
    });

    (url, handle)
}

/// Serves one canned response per connection, in order, and returns the
/// raw requests received.
async fn serve_sequence(
    responses: Vec<(u16, &'static str)>,
) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut stream).await);

            let response = format!(
                "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        requests
    });

    (url, handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let lower = line.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8(data).unwrap()
}

const TOKEN_BODY: &str = r#"{
    "access_token": "access-1",
    "token_type": "bearer",
    "expires_in": 3600,
    "expires_at": 4102444800,
    "refresh_token": "refresh-1",
    "user": {"id": "user-1", "email": "me@example.com", "role": "authenticated"}
}"#;

#[tokio::test]
async fn test_sign_in_with_password() {
    let (url, server) = serve_once(200, TOKEN_BODY).await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    let mut events = client.on_auth_state_change();

    let session = client
        .sign_in_with_password("me@example.com", "hunter2")
        .await
        .unwrap();

    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.expires_at, Some(4_102_444_800));
    assert_eq!(session.user.as_ref().unwrap().id, "user-1");

    let change = events.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedIn);
    assert_eq!(change.session.as_ref(), Some(&session));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /auth/v1/token?grant_type=password"));
    assert!(request.to_ascii_lowercase().contains("apikey: anon-key"));
    assert!(request.contains(r#""email":"me@example.com""#));
}

#[tokio::test]
async fn test_sign_in_rejected() {
    let (url, _server) = serve_once(
        400,
        r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
    )
    .await;
    let client = AuthClient::new(&url, "anon-key").unwrap();

    let err = client
        .sign_in_with_password("me@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth { ref code, .. } if code == "invalid_grant"));
    assert!(!err.is_unreachable());
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn test_current_session_refreshes_expired_token() {
    let (url, server) = serve_once(200, TOKEN_BODY).await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    client
        .restore(Some(
            Session::new("old-access")
                .with_expires_at(0)
                .with_refresh_token("old-refresh"),
        ))
        .await;
    let mut events = client.on_auth_state_change();

    let session = client.get_current_session().await.unwrap().unwrap();

    assert_eq!(session.access_token, "access-1");
    assert_eq!(events.recv().await.unwrap().event, AuthEvent::TokenRefreshed);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /auth/v1/token?grant_type=refresh_token"));
    assert!(request.contains(r#""refresh_token":"old-refresh""#));
}

#[tokio::test]
async fn test_current_session_refreshes_inside_cache_margin() {
    let (url, server) = serve_once(200, TOKEN_BODY).await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    client
        .restore(Some(
            Session::new("old-access")
                .with_expires_at(chrono::Utc::now().timestamp() + 200)
                .with_refresh_token("old-refresh"),
        ))
        .await;

    let session = client.get_current_session().await.unwrap().unwrap();

    assert_eq!(session.access_token, "access-1");
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /auth/v1/token?grant_type=refresh_token"));
}

#[tokio::test]
async fn test_current_session_kept_outside_margin() {
    let client = AuthClient::new("http://127.0.0.1:9", "anon-key").unwrap();
    let held = Session::new("still-good")
        .with_expires_at(chrono::Utc::now().timestamp() + 3600)
        .with_refresh_token("r");
    client.restore(Some(held.clone())).await;

    assert_eq!(client.get_current_session().await.unwrap(), Some(held));
}

#[tokio::test]
async fn test_rejected_refresh_signs_out() {
    let (url, _server) = serve_once(
        400,
        r#"{"error_code":"refresh_token_not_found","msg":"Invalid Refresh Token"}"#,
    )
    .await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    client
        .restore(Some(
            Session::new("old").with_expires_at(0).with_refresh_token("gone"),
        ))
        .await;
    let mut events = client.on_auth_state_change();

    assert!(client.get_current_session().await.is_err());
    assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedOut);
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn test_sign_up_awaiting_confirmation() {
    let (url, server) = serve_once(200, r#"{"id":"user-2","email":"new@example.com"}"#).await;
    let client = AuthClient::new(&url, "anon-key").unwrap();

    let session = client.sign_up("new@example.com", "longpassword").await.unwrap();

    assert!(session.is_none());
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /auth/v1/signup"));
}

#[tokio::test]
async fn test_sign_out_revokes_and_clears() {
    let (url, server) = serve_once(204, "").await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    client.restore(Some(Session::new("access-9"))).await;
    let mut events = client.on_auth_state_change();

    client.sign_out().await.unwrap();

    assert!(client.session().await.is_none());
    let change = events.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedOut);
    assert!(change.session.is_none());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /auth/v1/logout"));
    assert!(request.contains("Bearer access-9"));
}

#[tokio::test]
async fn test_get_user() {
    let (url, server) =
        serve_once(200, r#"{"id":"user-1","email":"me@example.com"}"#).await;
    let client = AuthClient::new(&url, "anon-key").unwrap();

    assert!(matches!(client.get_user().await, Err(Error::NotSignedIn)));

    client.restore(Some(Session::new("access-1"))).await;
    let user = client.get_user().await.unwrap();
    assert_eq!(user.email.as_deref(), Some("me@example.com"));

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /auth/v1/user"));
}

const UPDATED_USER_BODY: &str = r#"{
    "id": "user-1",
    "email": "me@example.com",
    "user_metadata": {"username": "greenthumb"}
}"#;

fn signed_in(token: &str) -> Session {
    Session::new(token)
        .with_expires_at(4_102_444_800)
        .with_user(User::new("user-1").with_email("me@example.com"))
}

#[tokio::test]
async fn test_update_username() {
    let (url, server) = serve_once(200, UPDATED_USER_BODY).await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    client.restore(Some(signed_in("access-1"))).await;
    let mut events = client.on_auth_state_change();

    let user = client.update_username("  greenthumb ").await.unwrap();

    assert_eq!(user.username(), Some("greenthumb"));
    let change = events.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::UserUpdated);
    let session = change.session.unwrap();
    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.user.as_ref().and_then(User::username), Some("greenthumb"));
    assert_eq!(client.session().await, Some(session));

    let request = server.await.unwrap();
    assert!(request.starts_with("PUT /auth/v1/user"));
    assert!(request.contains("Bearer access-1"));
    assert!(request.contains(r#"{"data":{"username":"greenthumb"}}"#));
}

#[tokio::test]
async fn test_update_username_rejects_blank_name() {
    let client = AuthClient::new("http://127.0.0.1:9", "anon-key").unwrap();
    client.restore(Some(signed_in("access-1"))).await;

    let err = client.update_username("   ").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_update_user_requires_session() {
    let client = AuthClient::new("http://127.0.0.1:9", "anon-key").unwrap();

    let err = client
        .update_user(&UserUpdate::username("someone"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSignedIn));
}

#[tokio::test]
async fn test_update_password_confirms_current_password() {
    let (url, server) = serve_sequence(vec![(200, TOKEN_BODY), (200, UPDATED_USER_BODY)]).await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    client.restore(Some(signed_in("access-0"))).await;
    let mut events = client.on_auth_state_change();

    client.update_password("old-pass", "new-pass").await.unwrap();

    assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedIn);
    assert_eq!(events.recv().await.unwrap().event, AuthEvent::UserUpdated);

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /auth/v1/token?grant_type=password"));
    assert!(requests[0].contains(r#""email":"me@example.com""#));
    assert!(requests[0].contains(r#""password":"old-pass""#));
    assert!(requests[1].starts_with("PUT /auth/v1/user"));
    assert!(requests[1].contains("Bearer access-1"));
    assert!(requests[1].contains(r#"{"password":"new-pass"}"#));
}

#[tokio::test]
async fn test_update_password_with_wrong_current_password() {
    let (url, _server) = serve_once(
        400,
        r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
    )
    .await;
    let client = AuthClient::new(&url, "anon-key").unwrap();
    client.restore(Some(signed_in("access-0"))).await;

    let err = client
        .update_password("wrong", "new-pass")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth { ref code, .. } if code == "invalid_credentials"));
    assert_eq!(client.session().await, Some(signed_in("access-0")));
}

#[tokio::test]
async fn test_unreachable_server() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = AuthClient::new(&url, "anon-key").unwrap();
    let err = client
        .sign_in_with_password("me@example.com", "pw")
        .await
        .unwrap_err();
    assert!(err.is_unreachable());
}
