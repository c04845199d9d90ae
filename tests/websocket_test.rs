//! End-to-end WebSocket behavior against a running gateway.

use push_gateway::session::IdentityId;

mod common;
use common::*;

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let gateway = start_gateway(test_config()).await;

    let mut client = connect(&gateway.ws_url(None)).await;
    let (code, reason) = expect_close(&mut client).await;

    assert_eq!(code, 1007);
    assert_eq!(reason, "Token is required");
    assert_eq!(gateway.state.registry.count(), 0);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_insufficient_role_is_rejected() {
    let gateway = start_gateway(test_config()).await;

    let token = token(2, "bob", &["ROLE_viewer"]);
    let mut client = connect(&gateway.ws_url(Some(&token))).await;
    let (code, reason) = expect_close(&mut client).await;

    assert_eq!(code, 1003);
    assert_eq!(reason, "Permission denied");
    assert_eq!(gateway.state.registry.count(), 0);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let gateway = start_gateway(test_config()).await;

    let mut client = connect(&gateway.ws_url(Some("not-a-jwt"))).await;
    let (code, reason) = expect_close(&mut client).await;

    assert_eq!(code, 1011);
    assert_eq!(reason, "Authentication failed");
    assert_eq!(gateway.state.registry.count(), 0);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_admitted_connection_gets_welcome() {
    let gateway = start_gateway(test_config()).await;

    let token = token(1, "alice", &["ROLE_operator"]);
    let mut client = connect(&gateway.ws_url(Some(&token))).await;
    let welcome = next_json(&mut client).await;

    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["userId"], "1");
    assert_eq!(welcome["username"], "alice");
    assert!(welcome["timestamp"].as_i64().unwrap() > 0);
    assert!(gateway.state.registry.is_live(&IdentityId::from(1u64)));
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_bearer_prefix_is_stripped() {
    let gateway = start_gateway(test_config()).await;

    let token = format!("Bearer%20{}", token(5, "erin", &["ROLE_admin"]));
    let mut client = connect(&gateway.ws_url(Some(&token))).await;

    assert_eq!(next_json(&mut client).await["userId"], "5");
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_reconnect_supersedes_old_connection() {
    let gateway = start_gateway(test_config()).await;

    let mut first = connect_admitted(&gateway, 7, "grace").await;
    let mut second = connect_admitted(&gateway, 7, "grace").await;

    let (code, reason) = expect_close(&mut first).await;
    assert_eq!(code, 1000);
    assert_eq!(reason, "Replaced by new connection");
    assert_eq!(gateway.state.registry.count(), 1);

    // The superseded connection closing must not evict the new session.
    drop(first);
    let report = gateway.state.delivery.broadcast(&serde_json::json!({ "n": 1 })).await;
    assert_eq!(report.success_count, 1);
    assert_eq!(next_json(&mut second).await["data"]["n"], 1);
    assert!(gateway.state.registry.is_live(&IdentityId::from(7u64)));
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_ping_gets_pong_without_registry_change() {
    let gateway = start_gateway(test_config()).await;
    let mut client = connect_admitted(&gateway, 3, "carol").await;

    send_text(&mut client, "ping").await;
    assert_eq!(next_text(&mut client).await, "pong");

    send_text(&mut client, r#"{"type":"ping"}"#).await;
    assert_eq!(next_json(&mut client).await["type"], "pong");

    assert_eq!(gateway.state.registry.count(), 1);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_broadcast_reaches_every_client() {
    let gateway = start_gateway(test_config()).await;
    let mut a = connect_admitted(&gateway, 1, "alice").await;
    let mut b = connect_admitted(&gateway, 2, "bob").await;

    let payload = serde_json::json!({ "level": "critical", "msg": "disk full" });
    let report = gateway.state.delivery.broadcast(&payload).await;
    assert_eq!((report.success_count, report.fail_count), (2, 0));

    for client in [&mut a, &mut b] {
        let alert = next_json(client).await;
        assert_eq!(alert["type"], "alert");
        assert_eq!(alert["data"], payload);
    }
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_client_disconnect_removes_session() {
    let gateway = start_gateway(test_config()).await;
    let mut client = connect_admitted(&gateway, 11, "kim").await;

    client.close(None).await.unwrap();
    drop(client);

    let registry = gateway.state.registry.clone();
    assert!(eventually(|| registry.count() == 0).await);
    assert!(!gateway.state.delivery.push_to_one(&IdentityId::from(11u64), &serde_json::json!({})).await);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_closes_sessions_going_away() {
    let gateway = start_gateway(test_config()).await;
    let mut client = connect_admitted(&gateway, 4, "dave").await;

    gateway.shutdown.trigger();
    let (code, reason) = expect_close(&mut client).await;
    assert_eq!(code, 1001);
    assert_eq!(reason, "Server shutting down");
    drop(client);

    let result = tokio::time::timeout(std::time::Duration::from_secs(10), gateway.server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_reloaded_policy_applies_to_new_connections() {
    let gateway = start_gateway(test_config()).await;

    let mut next = test_config();
    next.websocket.allowed_roles = vec!["ROLE_viewer".into()];
    gateway.config_updates.send(next).unwrap();

    let admission = gateway.state.admission.clone();
    assert!(eventually(|| admission.policy().allowed_roles == vec!["ROLE_viewer".to_string()]).await);

    let mut viewer = connect(&gateway.ws_url(Some(&token(2, "bob", &["ROLE_viewer"])))).await;
    assert_eq!(next_json(&mut viewer).await["type"], "welcome");

    let mut admin = connect(&gateway.ws_url(Some(&token(1, "alice", &["ROLE_admin"])))).await;
    assert_eq!(expect_close(&mut admin).await.0, 1003);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_connection_limit_refuses_upgrade() {
    let mut config = test_config();
    config.listener.max_connections = 1;
    let gateway = start_gateway(config).await;

    let _held = connect_admitted(&gateway, 1, "alice").await;
    let err = tokio_tungstenite::connect_async(gateway.ws_url(Some(&token(2, "bob", &["ROLE_admin"]))))
        .await
        .unwrap_err();

    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status().as_u16(), 503)
        }
        other => panic!("expected HTTP 503, got {:?}", other),
    }
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_unacknowledged_close_releases_slot() {
    let mut config = test_config();
    config.listener.max_connections = 2;
    config.websocket.close_grace_ms = 200;
    let gateway = start_gateway(config).await;

    // Never polled again, so the close frame is never answered.
    let _silent = connect_admitted(&gateway, 1, "alice").await;
    let _current = connect_admitted(&gateway, 1, "alice").await;
    assert_eq!(gateway.state.connection_slots.available_permits(), 0);

    let slots = gateway.state.connection_slots.clone();
    assert!(eventually(|| slots.available_permits() == 1).await);

    let mut next = connect_admitted(&gateway, 2, "bob").await;
    send_text(&mut next, "ping").await;
    assert_eq!(next_text(&mut next).await, "pong");
    gateway.shutdown.trigger();
}
