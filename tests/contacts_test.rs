//! Integration tests for the contact-request workflow: pending/accepted/
//! rejected transitions, validation, and the notifications each transition
//! produces.

use std::net::SocketAddr;
use std::sync::Arc;

use redema_server::auth::verifier::JwtVerifier;
use redema_server::chat::RoomTable;
use redema_server::db::DbPool;
use redema_server::state::AppState;
use redema_server::ws::ConnectionRegistry;
use redema_server::{db, directory, routes};
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
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
        db,
        verifier,
    }
}

fn seed_user(db: &DbPool, identity: &str, name: &str, phone: Option<&str>) -> String {
    let conn = db.lock().unwrap();
    directory::create_user(
        &conn,
        identity,
        name,
        &format!("{identity}@example.com"),
        phone.map(|_| "+54"),
        phone,
    )
    .unwrap()
}

fn seed_publication(db: &DbPool, owner_id: &str, title: &str) -> String {
    let conn = db.lock().unwrap();
    directory::create_publication(&conn, owner_id, title).unwrap()
}

async fn send_request(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    publication_id: &str,
) -> reqwest::Response {
    client
        .post(format!("{base_url}/api/contact"))
        .bearer_auth(token)
        .json(&json!({
            "id_publicacion": publication_id,
            "tipo": "whatsapp",
            "mensaje": "Hola, encontré a tu perro",
        }))
        .send()
        .await
        .unwrap()
}

async fn notifications_for(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
) -> Vec<Value> {
    client
        .get(format!("{base_url}/api/notifications"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn contact_request_validations() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let owner_id = seed_user(&server.db, "uid-owner", "Valentina", Some("1155550000"));
    seed_user(&server.db, "uid-finder", "Marcos", Some("1155551111"));
    seed_user(&server.db, "uid-nophone", "SinTel", None);
    let publication = seed_publication(&server.db, &owner_id, "perro marron perdido");

    let owner_token = server.verifier.issue_token("uid-owner", "Valentina").unwrap();
    let finder_token = server.verifier.issue_token("uid-finder", "Marcos").unwrap();
    let nophone_token = server.verifier.issue_token("uid-nophone", "SinTel").unwrap();

    // Unknown publication
    let resp = send_request(&client, &server.base_url, &finder_token, "no-such-pub").await;
    assert_eq!(resp.status(), 404);

    // Contacting yourself
    let resp = send_request(&client, &server.base_url, &owner_token, &publication).await;
    assert_eq!(resp.status(), 400);

    // Whatsapp without a phone on file
    let resp = send_request(&client, &server.base_url, &nophone_token, &publication).await;
    assert_eq!(resp.status(), 400);

    // One pending request per requester/publication pair
    let resp = send_request(&client, &server.base_url, &finder_token, &publication).await;
    assert_eq!(resp.status(), 201);
    let resp = send_request(&client, &server.base_url, &finder_token, &publication).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn accept_exchanges_contact_data() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let owner_id = seed_user(&server.db, "uid-owner", "Valentina", Some("1155550000"));
    seed_user(&server.db, "uid-finder", "Marcos", Some("1155551111"));
    let publication = seed_publication(&server.db, &owner_id, "perro marron perdido");

    let owner_token = server.verifier.issue_token("uid-owner", "Valentina").unwrap();
    let finder_token = server.verifier.issue_token("uid-finder", "Marcos").unwrap();

    let resp = send_request(&client, &server.base_url, &finder_token, &publication).await;
    assert_eq!(resp.status(), 201);

    // Owner's pending notification carries the request id for accept/reject
    let owner_notis = notifications_for(&client, &server.base_url, &owner_token).await;
    assert_eq!(owner_notis.len(), 1);
    let noti = &owner_notis[0];
    assert_eq!(noti["tipo"], "solicitud_contacto");
    assert_eq!(noti["leido"], false);
    let request_id = noti["id_referencia"].as_str().unwrap().to_string();
    assert!(noti["descripcion"]
        .as_str()
        .unwrap()
        .contains("Marcos quiere contactarte"));

    // Accept: response carries the requester's datum for the immediate toast
    let resp = client
        .patch(format!("{}/api/contact/{}", server.base_url, request_id))
        .bearer_auth(&owner_token)
        .json(&json!({ "accion": "aceptar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["dato_contacto"], "+54 1155551111");
    assert_eq!(body["tipo_contacto"], "whatsapp");

    // Requester gets an unread acceptance with the owner's datum
    let finder_notis = notifications_for(&client, &server.base_url, &finder_token).await;
    assert_eq!(finder_notis.len(), 1);
    assert_eq!(finder_notis[0]["tipo"], "contacto_aceptado");
    assert_eq!(finder_notis[0]["leido"], false);
    assert!(finder_notis[0]["descripcion"]
        .as_str()
        .unwrap()
        .contains("+54 1155550000"));

    // Owner keeps a born-read history entry with the requester's datum
    let owner_notis = notifications_for(&client, &server.base_url, &owner_token).await;
    assert_eq!(owner_notis.len(), 2);
    let history = owner_notis
        .iter()
        .find(|n| n["tipo"] == "info_contacto")
        .expect("history entry");
    assert_eq!(history["leido"], true);
    assert!(history["descripcion"]
        .as_str()
        .unwrap()
        .contains("+54 1155551111"));

    // Resolved requests are terminal
    let resp = client
        .patch(format!("{}/api/contact/{}", server.base_url, request_id))
        .bearer_auth(&owner_token)
        .json(&json!({ "accion": "rechazar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn reject_is_silent_and_terminal() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let owner_id = seed_user(&server.db, "uid-owner", "Valentina", Some("1155550000"));
    seed_user(&server.db, "uid-finder", "Marcos", Some("1155551111"));
    let publication = seed_publication(&server.db, &owner_id, "gata siamesa");

    let owner_token = server.verifier.issue_token("uid-owner", "Valentina").unwrap();
    let finder_token = server.verifier.issue_token("uid-finder", "Marcos").unwrap();

    send_request(&client, &server.base_url, &finder_token, &publication).await;
    let owner_notis = notifications_for(&client, &server.base_url, &owner_token).await;
    let request_id = owner_notis[0]["id_referencia"].as_str().unwrap().to_string();

    let resp = client
        .patch(format!("{}/api/contact/{}", server.base_url, request_id))
        .bearer_auth(&owner_token)
        .json(&json!({ "accion": "rechazar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["dato_contacto"], Value::Null);

    // No notification for the requester on rejection
    let finder_notis = notifications_for(&client, &server.base_url, &finder_token).await;
    assert!(finder_notis.is_empty());

    // Terminal: responding again conflicts
    let resp = client
        .patch(format!("{}/api/contact/{}", server.base_url, request_id))
        .bearer_auth(&owner_token)
        .json(&json!({ "accion": "aceptar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn only_the_owner_may_respond() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let owner_id = seed_user(&server.db, "uid-owner", "Valentina", Some("1155550000"));
    seed_user(&server.db, "uid-finder", "Marcos", Some("1155551111"));
    let publication = seed_publication(&server.db, &owner_id, "loro verde");

    let owner_token = server.verifier.issue_token("uid-owner", "Valentina").unwrap();
    let finder_token = server.verifier.issue_token("uid-finder", "Marcos").unwrap();

    send_request(&client, &server.base_url, &finder_token, &publication).await;
    let owner_notis = notifications_for(&client, &server.base_url, &owner_token).await;
    let request_id = owner_notis[0]["id_referencia"].as_str().unwrap().to_string();

    // The requester cannot resolve their own request
    let resp = client
        .patch(format!("{}/api/contact/{}", server.base_url, request_id))
        .bearer_auth(&finder_token)
        .json(&json!({ "accion": "aceptar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Unknown request id
    let resp = client
        .patch(format!("{}/api/contact/no-such-request", server.base_url))
        .bearer_auth(&owner_token)
        .json(&json!({ "accion": "aceptar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
