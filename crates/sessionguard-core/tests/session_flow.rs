use std::sync::Arc;

use sessionguard_core::{
    AccessCredential, ApiClient, ClientConfig, CredentialStore, FileSlot, SessionContext,
    SessionPhase,
};
use wiremock::matchers::{body_json, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_auth_endpoints(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "csrftoken=csrf-A; Path=/")
                .set_body_json(serde_json::json!({"csrfToken": "csrf-A"})),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(header("x-csrftoken", "csrf-A"))
        .and(body_json(serde_json::json!({"email": "a@b.com", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refresh_token=R1; Path=/api/auth/; HttpOnly")
                .set_body_json(serde_json::json!({"access": "T1"})),
        )
        .expect(1)
        .mount(server)
        .await;

    // Refresh only works when the session cookie from login comes back
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(header("x-csrftoken", "csrf-A"))
        .and(header_regex("cookie", "refresh_token=R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "T2"})))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "email": "a@b.com",
            "nome": "Ana",
            "telefone": "",
            "is_active": true
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(header("x-csrftoken", "csrf-A"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_expiry_refresh_logout() {
    let server = MockServer::start().await;
    mount_auth_endpoints(&server).await;

    // T1 has expired by the time the first business call goes out
    Mock::given(method("GET"))
        .and(path("/api/clientes/"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/clientes/"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "c1", "nome": "Condomínio Azul"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(FileSlot::new(dir.path().to_path_buf()));
    let config = ClientConfig::default().with_base_url(server.uri());
    let session = Arc::new(SessionContext::new(ApiClient::new(&config, store.clone()).unwrap()));

    session.login("a@b.com", "pw").await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Authenticated);
    assert!(!session.loading());
    assert_eq!(session.user().unwrap().name, "Ana");

    let clientes: Vec<serde_json::Value> = session.client().get_json("/api/clientes/").await.unwrap();
    assert_eq!(clientes[0]["nome"], "Condomínio Azul");

    // The refreshed credential is what the store now holds, on disk
    assert_eq!(store.get().unwrap(), Some(AccessCredential::from("T2")));
    let reopened = CredentialStore::new(FileSlot::new(dir.path().to_path_buf()));
    assert_eq!(reopened.get().unwrap(), Some(AccessCredential::from("T2")));

    session.logout().await;
    assert_eq!(session.phase(), SessionPhase::Anonymous);
    assert!(session.user().is_none());
    assert!(store.get().unwrap().is_none());
}

#[tokio::test]
async fn test_revoked_session_surfaces_401_without_refresh_storm() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "csrftoken=csrf-A; Path=/"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "T2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/financeiro/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    store.set(&AccessCredential::from("T1")).unwrap();
    let config = ClientConfig::default().with_base_url(server.uri());
    let client = ApiClient::new(&config, store).unwrap();

    let err = client
        .get_json::<serde_json::Value>("/api/financeiro/")
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}
