//! End-to-end gateway tests: handshake, relay, multicast, presence.

use beacon_core::{ActionError, IdentityId, RoomKey, RESOLVE_IDENTITY_ACTION};
use beacon_gateway::admin::RoomTarget;
use futures_util::SinkExt;
use integration_tests::{
    bad_token, eventually, expect_silence, recv_json, send_action, sync, token_for, TestGateway,
};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{self, Message};

#[tokio::test]
async fn valid_credential_connects_joins_private_room_and_registers_presence() {
    let gateway = TestGateway::spawn().await.unwrap();
    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();

    let handle = gateway.handle();
    let alice = IdentityId::new("alice");

    // Presence record exists once the server finishes connection setup
    assert!(
        eventually(
            || async { gateway.handle().is_online(&IdentityId::new("alice")).await.unwrap() },
            2000
        )
        .await
    );

    // Auto-join into the identity-private room: a unicast reaches the socket
    handle
        .unicast("user", &alice, "settings.update", json!({"theme": "dark"}))
        .await;

    let frame = recv_json(&mut ws).await.unwrap();
    assert_eq!(frame["eventName"], "notify:user.settings.update");
    assert_eq!(frame["payload"]["theme"], "dark");
}

#[tokio::test]
async fn invalid_credential_is_refused_before_upgrade() {
    let gateway = TestGateway::spawn().await.unwrap();

    let err = gateway.connect(&bad_token()).await.unwrap_err();
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected HTTP refusal, got {other:?}"),
    }

    // No room join and no presence record happened
    assert!(!gateway
        .handle()
        .is_online(&IdentityId::new("alice"))
        .await
        .unwrap());
    assert_eq!(gateway.handle().connection_count(), 0);
}

#[tokio::test]
async fn missing_credential_is_refused() {
    let gateway = TestGateway::spawn().await.unwrap();

    let url = format!("ws://{}/gateway", gateway.addr);
    let err = tokio_tungstenite::connect_async(url).await.unwrap_err();
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 401),
        other => panic!("expected HTTP refusal, got {other:?}"),
    }
}

#[tokio::test]
async fn denylisted_action_never_invokes_backend() {
    let gateway = TestGateway::spawn_with(|router| {
        router.register("gateway.internal.danger", |_p, _m| async move {
            Ok(json!("must never run"))
        });
    })
    .await
    .unwrap();

    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();

    send_action(&mut ws, "gateway.internal.danger", json!({}), Some(json!(1)))
        .await
        .unwrap();

    let reply = recv_json(&mut ws).await.unwrap();
    assert_eq!(reply["ackId"], 1);
    assert_eq!(reply["success"], false);
    assert_eq!(reply["message"], "not allowed");

    assert_eq!(gateway.backend.invocation_count("gateway.internal.danger"), 0);
}

#[tokio::test]
async fn handler_failure_replies_and_keeps_connection_usable() {
    let gateway = TestGateway::spawn_with(|router| {
        router.register("chat.message.send", |_p, _m| async move {
            Err(ActionError::Handler("converse not found".to_string()))
        });
        router.register("chat.echo", |payload: Value, _m| async move { Ok(payload) });
    })
    .await
    .unwrap();

    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();

    send_action(&mut ws, "chat.message.send", json!({"text": "hi"}), Some(json!(1)))
        .await
        .unwrap();
    let reply = recv_json(&mut ws).await.unwrap();
    assert_eq!(reply["success"], false);
    assert_eq!(reply["message"], "converse not found");

    // The connection survived the handler error and relays again
    send_action(&mut ws, "chat.echo", json!({"n": 2}), Some(json!(2)))
        .await
        .unwrap();
    let reply = recv_json(&mut ws).await.unwrap();
    assert_eq!(reply["ackId"], 2);
    assert_eq!(reply["success"], true);
    assert_eq!(reply["data"]["n"], 2);
}

#[tokio::test]
async fn fire_and_forget_action_sends_no_reply() {
    let gateway = TestGateway::spawn_with(|router| {
        router.register("chat.typing", |_p, _m| async move { Ok(json!(null)) });
    })
    .await
    .unwrap();

    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();

    send_action(&mut ws, "chat.typing", json!({}), None).await.unwrap();

    // The backend ran, but no reply frame was written
    assert!(
        eventually(
            || async { gateway.backend.invocation_count("chat.typing") == 1 },
            1000
        )
        .await
    );
    assert!(expect_silence(&mut ws, 200).await);
}

#[tokio::test]
async fn roomcast_reaches_exactly_the_joined_identities() {
    let gateway = TestGateway::spawn().await.unwrap();
    let mut ws_a = gateway.connect(&token_for("a")).await.unwrap();
    let mut ws_b = gateway.connect(&token_for("b")).await.unwrap();
    let mut ws_c = gateway.connect(&token_for("c")).await.unwrap();
    sync(&mut ws_a).await.unwrap();
    sync(&mut ws_b).await.unwrap();
    sync(&mut ws_c).await.unwrap();

    let handle = gateway.handle();
    let room = RoomKey::new("group-1").unwrap();

    handle
        .join_room(RoomTarget::Identity(IdentityId::new("a")), room.clone())
        .await
        .unwrap();
    handle
        .join_room(RoomTarget::Identity(IdentityId::new("b")), room.clone())
        .await
        .unwrap();

    handle
        .roomcast("group", room, "add", json!({"groupId": "group-1"}))
        .await;

    for ws in [&mut ws_a, &mut ws_b] {
        let frame = recv_json(ws).await.unwrap();
        assert_eq!(frame["eventName"], "notify:group.add");
        assert_eq!(frame["payload"]["groupId"], "group-1");
    }

    // c never joined and receives nothing
    assert!(expect_silence(&mut ws_c, 200).await);
}

#[tokio::test]
async fn broadcast_reaches_every_socket() {
    let gateway = TestGateway::spawn().await.unwrap();
    let mut ws_a = gateway.connect(&token_for("a")).await.unwrap();
    let mut ws_b = gateway.connect(&token_for("b")).await.unwrap();
    assert!(eventually(|| async { gateway.handle().connection_count() == 2 }, 2000).await);

    gateway
        .handle()
        .broadcast("system", "maintenance", json!({"at": "soon"}))
        .await;

    for ws in [&mut ws_a, &mut ws_b] {
        let frame = recv_json(ws).await.unwrap();
        assert_eq!(frame["eventName"], "notify:system.maintenance");
    }
}

#[tokio::test]
async fn listcast_reaches_only_listed_identities() {
    let gateway = TestGateway::spawn().await.unwrap();
    let mut ws_a = gateway.connect(&token_for("a")).await.unwrap();
    let mut ws_b = gateway.connect(&token_for("b")).await.unwrap();
    let mut ws_c = gateway.connect(&token_for("c")).await.unwrap();
    sync(&mut ws_a).await.unwrap();
    sync(&mut ws_b).await.unwrap();
    sync(&mut ws_c).await.unwrap();

    gateway
        .handle()
        .listcast(
            "friend",
            &[IdentityId::new("a"), IdentityId::new("b")],
            "request",
            json!({"from": "c"}),
        )
        .await;

    for ws in [&mut ws_a, &mut ws_b] {
        let frame = recv_json(ws).await.unwrap();
        assert_eq!(frame["eventName"], "notify:friend.request");
    }
    assert!(expect_silence(&mut ws_c, 200).await);
}

#[tokio::test]
async fn presence_tracks_multi_device_disconnects() {
    let gateway = TestGateway::spawn().await.unwrap();
    let handle = gateway.handle();
    let carol = IdentityId::new("carol");

    let mut first = gateway.connect(&token_for("carol")).await.unwrap();
    let mut second = gateway.connect(&token_for("carol")).await.unwrap();
    sync(&mut first).await.unwrap();
    sync(&mut second).await.unwrap();
    assert!(handle.is_online(&carol).await.unwrap());

    // First device leaves; carol is still online through the second
    first.close(None).await.unwrap();
    assert!(
        eventually(
            || async { gateway.handle().connection_count() == 1 },
            2000
        )
        .await
    );
    assert!(handle.is_online(&carol).await.unwrap());

    // Second device leaves; carol goes offline
    second.close(None).await.unwrap();
    assert!(
        eventually(
            || async {
                !gateway
                    .handle()
                    .is_online(&IdentityId::new("carol"))
                    .await
                    .unwrap()
            },
            2000
        )
        .await
    );
}

#[tokio::test]
async fn disconnect_clears_room_membership() {
    let gateway = TestGateway::spawn().await.unwrap();
    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();
    sync(&mut ws).await.unwrap();

    let handle = gateway.handle();
    let room = RoomKey::new("group-1").unwrap();
    handle
        .join_room(RoomTarget::Identity(IdentityId::new("alice")), room.clone())
        .await
        .unwrap();

    drop(ws);
    assert!(eventually(|| async { gateway.handle().connection_count() == 0 }, 2000).await);

    // The room was garbage collected with its last member
    assert!(gateway.state.connections().members_of(&room).is_empty());
}

#[tokio::test]
async fn malformed_frame_closes_the_connection() {
    let gateway = TestGateway::spawn().await.unwrap();
    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();

    ws.send(Message::Text("this is not json".to_string().into()))
        .await
        .unwrap();

    assert!(eventually(|| async { gateway.handle().connection_count() == 0 }, 2000).await);
}

#[tokio::test]
async fn relay_injects_identity_metadata() {
    let gateway = TestGateway::spawn_with(|router| {
        router.register("chat.whoami", |_p, meta: beacon_core::ActionMetadata| async move {
            Ok(json!({
                "identity": meta.identity_id.map(|id| id.as_str().to_string()),
                "hasConnection": meta.connection_id.is_some(),
            }))
        });
    })
    .await
    .unwrap();

    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();
    send_action(&mut ws, "chat.whoami", json!({}), Some(json!("ack-1")))
        .await
        .unwrap();

    let reply = recv_json(&mut ws).await.unwrap();
    assert_eq!(reply["ackId"], "ack-1");
    assert_eq!(reply["data"]["identity"], "alice");
    assert_eq!(reply["data"]["hasConnection"], true);
}

#[tokio::test]
async fn unknown_action_is_a_failure_reply_not_a_disconnect() {
    let gateway = TestGateway::spawn().await.unwrap();
    let mut ws = gateway.connect(&token_for("alice")).await.unwrap();

    send_action(&mut ws, "no.such.action", json!({}), Some(json!(1)))
        .await
        .unwrap();

    let reply = recv_json(&mut ws).await.unwrap();
    assert_eq!(reply["success"], false);
    assert_eq!(gateway.handle().connection_count(), 1);
}

#[tokio::test]
async fn resolve_identity_runs_once_per_handshake() {
    let gateway = TestGateway::spawn().await.unwrap();
    let _ws = gateway.connect(&token_for("alice")).await.unwrap();
    assert_eq!(gateway.backend.invocation_count(RESOLVE_IDENTITY_ACTION), 1);
}
