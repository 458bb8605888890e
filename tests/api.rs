use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use urlencoding::{decode, encode};

use clinica::app::build_app;
use clinica::auth::password::hash_password;
use clinica::auth::repo::Usuario;
use clinica::config::{AppConfig, SessionConfig};
use clinica::state::AppState;

const ADMIN_PASSWORD: &str = "senha-secreta";

async fn test_app() -> Router {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("migrations");

    let hash = hash_password(ADMIN_PASSWORD).expect("hash");
    Usuario::create(&db, "admin", &hash, true)
        .await
        .expect("seed admin");

    let config = Arc::new(AppConfig {
        database_url: "sqlite::memory:".into(),
        session: SessionConfig {
            secret: "segredo-de-teste".into(),
            issuer: "clinica".into(),
            audience: "clinica-users".into(),
            ttl_minutes: 60,
        },
        admin_username: None,
        admin_password: None,
    });
    build_app(AppState::from_parts(db, config))
}

fn get(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = session {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: String, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = session {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn location(res: &Response<Body>) -> &str {
    res.headers()
        .get(header::LOCATION)
        .expect("redirect location")
        .to_str()
        .unwrap()
}

/// Flash message carried on a redirect, decoded from its Set-Cookie.
fn flash_message(res: &Response<Body>) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let raw = v.to_str().ok()?.strip_prefix("flash=")?;
            let value = raw.split(';').next()?;
            let decoded = decode(value).ok()?.into_owned();
            Some(decoded.split_once('|')?.1.to_string())
        })
}

async fn json_body(res: Response<Body>) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// Log in and return the session cookie pair for subsequent requests.
async fn login(app: &Router) -> String {
    let body = format!("username=admin&password={}", encode(ADMIN_PASSWORD));
    let res = app
        .clone()
        .oneshot(post_form("/login", body, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    let set = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let s = v.to_str().ok()?;
            s.starts_with("clinica_session=").then(|| s.to_string())
        })
        .expect("session cookie");
    set.split(';').next().unwrap().to_string()
}

fn paciente_form(nome: &str, cpf: &str, telefone: &str, email: &str) -> String {
    format!(
        "nome={}&cpf={}&telefone={}&email={}",
        encode(nome),
        encode(cpf),
        encode(telefone),
        encode(email)
    )
}

fn atendimento_form(paciente_id: i64, data: &str, descricao: &str) -> String {
    format!(
        "paciente_id={}&data={}&descricao={}",
        paciente_id,
        encode(data),
        encode(descricao)
    )
}

async fn register_paciente(app: &Router, session: &str, nome: &str, cpf: &str) -> i64 {
    let res = app
        .clone()
        .oneshot(post_form(
            "/pacientes/cadastrar",
            paciente_form(nome, cpf, "11988888888", "novo@teste.com"),
            Some(session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/pacientes");

    let res = app
        .clone()
        .oneshot(get("/pacientes", Some(session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    body["pacientes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["nome"] == nome)
        .expect("registered paciente")["id"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn unauthenticated_requests_redirect_to_login() {
    let app = test_app().await;
    for uri in ["/", "/pacientes", "/atendimentos", "/logout"] {
        let res = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&res), "/login", "{uri}");
    }
    let res = app
        .clone()
        .oneshot(post_form(
            "/pacientes/cadastrar",
            paciente_form("Fulano", "98765432109", "11", "a@b.co"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login");
}

#[tokio::test]
async fn health_and_login_pages_are_public() {
    let app = test_app().await;
    let res = app.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.clone().oneshot(get("/login", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_with_wrong_credentials_flashes_error() {
    let app = test_app().await;
    for body in [
        "username=admin&password=errada".to_string(),
        "username=ninguem&password=errada".to_string(),
    ] {
        let res = app
            .clone()
            .oneshot(post_form("/login", body, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");
        assert_eq!(
            flash_message(&res).as_deref(),
            Some("Usuário ou senha inválidos")
        );
    }
}

#[tokio::test]
async fn login_and_logout_roundtrip() {
    let app = test_app().await;
    let session = login(&app).await;

    let res = app.clone().oneshot(get("/", Some(&session))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["username"], "admin");

    let res = app
        .clone()
        .oneshot(get("/logout", Some(&session)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login");
    let cleared = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| {
            let s = v.to_str().unwrap_or("");
            s.starts_with("clinica_session=") && s.contains("Max-Age=0")
        });
    assert!(cleared, "session cookie should be expired");
}

#[tokio::test]
async fn register_and_schedule_end_to_end() {
    let app = test_app().await;
    let session = login(&app).await;

    let res = app
        .clone()
        .oneshot(post_form(
            "/pacientes/cadastrar",
            paciente_form("Novo Paciente", "98765432109", "11988888888", "novo@teste.com"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/pacientes");
    assert_eq!(
        flash_message(&res).as_deref(),
        Some("Paciente cadastrado com sucesso!")
    );

    let res = app
        .clone()
        .oneshot(get("/pacientes", Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    let paciente = &body["pacientes"][0];
    assert_eq!(paciente["nome"], "Novo Paciente");
    assert_eq!(paciente["cpf"], "98765432109");
    assert_eq!(paciente["cpf_formatado"], "987.654.321-09");
    assert_eq!(paciente["email"], "novo@teste.com");
    let id = paciente["id"].as_i64().unwrap();

    // Two visits; the later one must come first in the descending list.
    for (data, descricao) in [
        ("2027-01-10T09:00", "Retorno"),
        ("2027-03-05T14:30", "Sessão inicial"),
    ] {
        let res = app
            .clone()
            .oneshot(post_form(
                "/atendimentos/agendar",
                atendimento_form(id, data, descricao),
                Some(&session),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/atendimentos");
    }

    let res = app
        .clone()
        .oneshot(get(&format!("/pacientes/{}", id), Some(&session)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    let atendimentos = body["atendimentos"].as_array().unwrap();
    assert_eq!(atendimentos.len(), 2);
    assert_eq!(atendimentos[0]["descricao"], "Sessão inicial");
    assert_eq!(atendimentos[0]["data"], "2027-03-05T14:30");
    assert_eq!(atendimentos[1]["descricao"], "Retorno");
}

#[tokio::test]
async fn duplicate_cpf_is_rejected_regardless_of_formatting() {
    let app = test_app().await;
    let session = login(&app).await;
    register_paciente(&app, &session, "Paciente Um", "98765432109").await;

    let res = app
        .clone()
        .oneshot(post_form(
            "/pacientes/cadastrar",
            paciente_form("Paciente Dois", "987.654.321-09", "11977777777", "dois@teste.com"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/pacientes/cadastrar");
    assert_eq!(
        flash_message(&res).as_deref(),
        Some("CPF já cadastrado no sistema")
    );

    let res = app
        .clone()
        .oneshot(get("/pacientes", Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert_eq!(body["pacientes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cpf_is_immutable_on_edit() {
    let app = test_app().await;
    let session = login(&app).await;
    let id = register_paciente(&app, &session, "Paciente Um", "98765432109").await;

    let res = app
        .clone()
        .oneshot(post_form(
            &format!("/pacientes/editar/{}", id),
            paciente_form("Paciente Um", "11122233344", "11988888888", "novo@teste.com"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/pacientes/editar/{}", id));
    assert_eq!(
        flash_message(&res).as_deref(),
        Some("Não é permitido alterar o CPF")
    );

    // Same CPF in display formatting is accepted; other fields change.
    let res = app
        .clone()
        .oneshot(post_form(
            &format!("/pacientes/editar/{}", id),
            paciente_form("Paciente Renomeado", "987.654.321-09", "11900000000", "Outro@Teste.com"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/pacientes");

    let res = app
        .clone()
        .oneshot(get(&format!("/pacientes/{}", id), Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert_eq!(body["paciente"]["cpf"], "98765432109");
    assert_eq!(body["paciente"]["nome"], "Paciente Renomeado");
    assert_eq!(body["paciente"]["telefone"], "11900000000");
    assert_eq!(body["paciente"]["email"], "outro@teste.com");
}

#[tokio::test]
async fn invalid_patient_forms_flash_back_to_the_form() {
    let app = test_app().await;
    let session = login(&app).await;

    let cases = [
        (
            paciente_form("Fulano", "123", "11988888888", "a@b.co"),
            "CPF deve ter 11 dígitos",
        ),
        (
            paciente_form("Fulano", "11111111111", "11988888888", "a@b.co"),
            "CPF inválido",
        ),
        (
            paciente_form("ab", "98765432109", "11988888888", "a@b.co"),
            "Nome deve ter entre 3 e 100 caracteres",
        ),
        (
            paciente_form("Fulano", "98765432109", "11988888888", "sem-arroba"),
            "Email inválido",
        ),
    ];
    for (body, expected) in cases {
        let res = app
            .clone()
            .oneshot(post_form("/pacientes/cadastrar", body, Some(&session)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/pacientes/cadastrar");
        assert_eq!(flash_message(&res).as_deref(), Some(expected));
    }

    let res = app
        .clone()
        .oneshot(get("/pacientes", Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert!(body["pacientes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn scheduling_for_missing_paciente_creates_nothing() {
    let app = test_app().await;
    let session = login(&app).await;

    let res = app
        .clone()
        .oneshot(post_form(
            "/atendimentos/agendar",
            atendimento_form(999, "2027-01-10T09:00", "Sessão inicial"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/atendimentos/agendar");
    assert_eq!(
        flash_message(&res).as_deref(),
        Some("Paciente não encontrado")
    );

    let res = app
        .clone()
        .oneshot(get("/atendimentos", Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert!(body["atendimentos"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rescheduling_can_reassign_the_paciente() {
    let app = test_app().await;
    let session = login(&app).await;
    let a = register_paciente(&app, &session, "Paciente A", "98765432109").await;
    let b = register_paciente(&app, &session, "Paciente B", "12345678901").await;

    let res = app
        .clone()
        .oneshot(post_form(
            "/atendimentos/agendar",
            atendimento_form(a, "2027-01-10T09:00", "Sessão inicial"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = app
        .clone()
        .oneshot(get("/atendimentos", Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    let atendimento_id = body["atendimentos"][0]["id"].as_i64().unwrap();

    let res = app
        .clone()
        .oneshot(post_form(
            &format!("/atendimentos/editar/{}", atendimento_id),
            atendimento_form(b, "2027-02-01T11:00", "Transferido"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/atendimentos");

    let res = app
        .clone()
        .oneshot(get("/atendimentos", Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    let atendimento = &body["atendimentos"][0];
    assert_eq!(atendimento["paciente_id"].as_i64().unwrap(), b);
    assert_eq!(atendimento["paciente_nome"], "Paciente B");
    assert_eq!(atendimento["descricao"], "Transferido");

    // Editing a missing atendimento is a plain 404.
    let res = app
        .clone()
        .oneshot(post_form(
            "/atendimentos/editar/999",
            atendimento_form(b, "2027-02-01T11:00", "x"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_paciente_cascades_to_its_atendimentos() {
    let app = test_app().await;
    let session = login(&app).await;
    let id = register_paciente(&app, &session, "Paciente Um", "98765432109").await;

    let res = app
        .clone()
        .oneshot(post_form(
            "/atendimentos/agendar",
            atendimento_form(id, "2027-01-10T09:00", "Sessão inicial"),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = app
        .clone()
        .oneshot(post_form(
            &format!("/pacientes/excluir/{}", id),
            String::new(),
            Some(&session),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/pacientes");

    let res = app
        .clone()
        .oneshot(get(&format!("/pacientes/{}", id), Some(&session)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .clone()
        .oneshot(get("/atendimentos", Some(&session)))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert!(body["atendimentos"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_matches_substring_across_fields_case_insensitively() {
    let app = test_app().await;
    let session = login(&app).await;
    register_paciente(&app, &session, "Novo Paciente", "98765432109").await;

    // ASCII case-insensitive (SQLite LIKE); matches nome, cpf and email.
    for termo in ["novo", "PACIENTE", "98765", "teste.com"] {
        let res = app
            .clone()
            .oneshot(post_form(
                "/pacientes/buscar",
                format!("termo={}", encode(termo)),
                Some(&session),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(
            body["pacientes"].as_array().unwrap().len(),
            1,
            "termo {termo:?}"
        );
        assert_eq!(body["termo"], termo);
    }

    let res = app
        .clone()
        .oneshot(post_form(
            "/pacientes/buscar",
            "termo=inexistente".to_string(),
            Some(&session),
        ))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert!(body["pacientes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn flash_message_is_consumed_by_the_next_view() {
    let app = test_app().await;
    let session = login(&app).await;

    let res = app
        .clone()
        .oneshot(post_form(
            "/pacientes/cadastrar",
            paciente_form("Novo Paciente", "98765432109", "11988888888", "novo@teste.com"),
            Some(&session),
        ))
        .await
        .unwrap();
    let flash_cookie = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let s = v.to_str().ok()?;
            s.starts_with("flash=").then(|| s.split(';').next().unwrap().to_string())
        })
        .expect("flash cookie");

    let cookie = format!("{}; {}", session, flash_cookie);
    let res = app.clone().oneshot(get("/pacientes", Some(&cookie))).await.unwrap();
    let cleared = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap_or("").starts_with("flash=;"));
    assert!(cleared, "view should expire the flash cookie");
    let body = json_body(res).await;
    assert_eq!(body["flash"]["level"], "success");
    assert_eq!(body["flash"]["message"], "Paciente cadastrado com sucesso!");
}
