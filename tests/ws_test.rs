//! End-to-end WebSocket tests: connect-time auth, connect-time notification
//! replay, live push on contact requests, and the ephemeral chat flow.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use redema_server::auth::verifier::JwtVerifier;
use redema_server::chat::RoomTable;
use redema_server::db::DbPool;
use redema_server::state::AppState;
use redema_server::ws::ConnectionRegistry;
use redema_server::{db, directory, routes};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;
type WsRead = futures_util::stream::SplitStream<WsStream>;
type WsWrite = futures_util::stream::SplitSink<WsStream, Message>;

struct TestServer {
    base_url: String,
    addr: SocketAddr,
    db: DbPool,
    verifier: Arc<JwtVerifier>,
}

async fn start_test_server() -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = db::init_db(&data_dir).expect("Failed to init DB");
    let verifier = Arc::new(JwtVerifier::new(vec![42u8; 32]));

    let state = AppState {
        db: db.clone(),
        connections: ConnectionRegistry::new(),
        rooms: RoomTable::new(),
        verifier: verifier.clone(),
    };

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        db,
        verifier,
    }
}

fn seed_user(db: &DbPool, identity: &str, name: &str) -> String {
    let conn = db.lock().unwrap();
    directory::create_user(
        &conn,
        identity,
        name,
        &format!("{identity}@example.com"),
        Some("+54"),
        Some("1155550000"),
    )
    .unwrap()
}

fn seed_publication(db: &DbPool, owner_id: &str, title: &str) -> String {
    let conn = db.lock().unwrap();
    directory::create_publication(&conn, owner_id, title).unwrap()
}

async fn connect_ws(server: &TestServer, token: &str) -> (WsWrite, WsRead) {
    let url = format!("ws://{}/ws?token={}", server.addr, token);
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("WS connect failed");
    stream.split()
}

/// Next JSON event from the stream, skipping transport frames.
/// None on timeout or stream end.
async fn next_event(read: &mut WsRead) -> Option<Value> {
    loop {
        match tokio::time::timeout(Duration::from_secs(3), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(&text).expect("valid event JSON"))
            }
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

async fn send_client_event(write: &mut WsWrite, event: Value) {
    write
        .send(Message::Text(event.to_string().into()))
        .await
        .expect("WS send failed");
}

/// Drain events until the connect acknowledgement arrives.
async fn expect_connected(read: &mut WsRead) {
    let event = next_event(read).await.expect("expected connect status");
    assert_eq!(event["event"], "status");
    assert_eq!(event["data"]["message"], "conectado");
}

#[tokio::test]
async fn invalid_token_is_rejected_with_close_code() {
    let server = start_test_server().await;

    let url = format!("ws://{}/ws?token=garbage", server.addr);
    let (mut stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("upgrade should succeed before the close");

    match tokio::time::timeout(Duration::from_secs(3), stream.next()).await {
        Ok(Some(Ok(Message::Close(Some(frame))))) => {
            assert_eq!(u16::from(frame.code), 4002);
        }
        other => panic!("Expected close frame, got {:?}", other),
    }
}

#[tokio::test]
async fn connect_replays_pending_notifications() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let owner_id = seed_user(&server.db, "uid-owner", "Valentina");
    seed_user(&server.db, "uid-commenter", "Lautaro");
    let publication = seed_publication(&server.db, &owner_id, "perro marron perdido");

    let commenter_token = server.verifier.issue_token("uid-commenter", "Lautaro").unwrap();

    // Notification created while the owner is offline
    let resp = client
        .post(format!("{}/api/comments", server.base_url))
        .bearer_auth(&commenter_token)
        .json(&json!({ "id_publicacion": &publication, "descripcion": "lo vi en el parque" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Owner connects later and catches up without polling
    let owner_token = server.verifier.issue_token("uid-owner", "Valentina").unwrap();
    let (_write, mut read) = connect_ws(&server, &owner_token).await;
    expect_connected(&mut read).await;

    let event = next_event(&mut read).await.expect("expected replayed notification");
    assert_eq!(event["event"], "notification");
    assert_eq!(event["data"]["titulo"], "Lautaro comentó tu publicación");
    assert_eq!(event["data"]["id_publicacion"], Value::String(publication));
    assert!(event["data"]["id_notificacion"].is_string());
}

#[tokio::test]
async fn contact_request_is_pushed_to_online_owner() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let owner_id = seed_user(&server.db, "uid-owner", "Valentina");
    seed_user(&server.db, "uid-finder", "Marcos");
    let publication = seed_publication(&server.db, &owner_id, "perro marron perdido");

    let owner_token = server.verifier.issue_token("uid-owner", "Valentina").unwrap();
    let (_write, mut read) = connect_ws(&server, &owner_token).await;
    expect_connected(&mut read).await;

    let finder_token = server.verifier.issue_token("uid-finder", "Marcos").unwrap();
    let resp = client
        .post(format!("{}/api/contact", server.base_url))
        .bearer_auth(&finder_token)
        .json(&json!({
            "id_publicacion": publication,
            "tipo": "whatsapp",
            "mensaje": "Lo encontré",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // The push carries the same reference id the polled record has
    let event = next_event(&mut read).await.expect("expected live push");
    assert_eq!(event["event"], "notification");
    assert_eq!(event["data"]["titulo"], "Nueva solicitud de contacto");
    let pushed_ref = event["data"]["id_referencia"].as_str().unwrap().to_string();

    let polled: Vec<Value> = client
        .get(format!("{}/api/notifications", server.base_url))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(polled[0]["id_referencia"].as_str().unwrap(), pushed_ref);
}

#[tokio::test]
async fn chat_invite_message_and_reconnect_replay() {
    let server = start_test_server().await;

    let token_a = server.verifier.issue_token("uid-a", "Ana").unwrap();
    let token_b = server.verifier.issue_token("uid-b", "Bruno").unwrap();

    let (mut write_a, mut read_a) = connect_ws(&server, &token_a).await;
    expect_connected(&mut read_a).await;
    let (mut write_b, mut read_b) = connect_ws(&server, &token_b).await;
    expect_connected(&mut read_b).await;

    // A opens a room and invites B
    send_client_event(
        &mut write_a,
        json!({ "event": "joinRoom", "data": { "room": "sala-uid-a", "inviteeIdentity": "uid-b" } }),
    )
    .await;

    let invite = next_event(&mut read_b).await.expect("expected invite signal");
    assert_eq!(invite["event"], "solicitudMensaje");
    assert_eq!(invite["data"]["room"], "sala-uid-a");

    // B joins; A gets the join acknowledgement
    send_client_event(
        &mut write_b,
        json!({ "event": "joinRoom", "data": { "room": "sala-uid-a" } }),
    )
    .await;
    let ack = next_event(&mut read_a).await.expect("expected join ack");
    assert_eq!(ack["event"], "status");

    // A sends; B receives live
    send_client_event(
        &mut write_a,
        json!({ "event": "sendMessage", "data": { "room": "sala-uid-a", "body": "hola!" } }),
    )
    .await;
    let msg = next_event(&mut read_b).await.expect("expected live message");
    assert_eq!(msg["event"], "message");
    assert_eq!(msg["data"]["sender"], "uid-a");
    assert_eq!(msg["data"]["body"], "hola!");

    // B drops; A keeps talking into the buffer
    write_b.close().await.unwrap();
    drop(read_b);
    // Give the server a moment to process the disconnect
    tokio::time::sleep(Duration::from_millis(100)).await;

    for body in ["sigues ahi?", "te espero"] {
        send_client_event(
            &mut write_a,
            json!({ "event": "sendMessage", "data": { "room": "sala-uid-a", "body": body } }),
        )
        .await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // B reconnects and the full buffer is replayed in send order
    let (_write_b2, mut read_b2) = connect_ws(&server, &token_b).await;
    expect_connected(&mut read_b2).await;

    let mut replayed = Vec::new();
    for _ in 0..3 {
        let event = next_event(&mut read_b2).await.expect("expected replayed message");
        assert_eq!(event["event"], "message");
        replayed.push(event["data"]["body"].as_str().unwrap().to_string());
    }
    assert_eq!(replayed, vec!["hola!", "sigues ahi?", "te espero"]);
}

#[tokio::test]
async fn message_to_unknown_room_is_dropped_silently() {
    let server = start_test_server().await;

    let token = server.verifier.issue_token("uid-a", "Ana").unwrap();
    let (mut write, mut read) = connect_ws(&server, &token).await;
    expect_connected(&mut read).await;

    send_client_event(
        &mut write,
        json!({ "event": "sendMessage", "data": { "room": "no-existe", "body": "eco" } }),
    )
    .await;

    // No error event, no echo — fire and forget
    assert!(next_event(&mut read).await.is_none());
}

#[tokio::test]
async fn malformed_event_gets_status_reply() {
    let server = start_test_server().await;

    let token = server.verifier.issue_token("uid-a", "Ana").unwrap();
    let (mut write, mut read) = connect_ws(&server, &token).await;
    expect_connected(&mut read).await;

    send_client_event(&mut write, json!({ "event": "noSuchEvent", "data": {} })).await;

    let event = next_event(&mut read).await.expect("expected status reply");
    assert_eq!(event["event"], "status");
    assert_eq!(event["data"]["message"], "evento no reconocido");
}
