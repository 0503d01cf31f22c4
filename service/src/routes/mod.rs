//! HTTP route handlers (spec.md §4.7, §6), mirroring `sign/api/routes.py`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Multipart, State};
use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, ReadBuf};

use signd_backend::{SigningBackend, UploadSource};
use signd_openpgp::DigestAlgorithm;

use crate::auth::jwt::{extract_bearer_token, Jwt};
use crate::db::{Db, User};
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub jwt: Arc<Jwt>,
    pub db: Arc<Db>,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponseBody {
    pub token: String,
    pub user_id: i64,
    pub exp: i64,
}

#[derive(Serialize)]
pub struct FileSignResult {
    pub filename: String,
    pub success: bool,
    pub signature: Option<String>,
}

#[derive(Serialize)]
pub struct BatchSignResponse {
    pub results: Vec<FileSignResult>,
    pub total: usize,
    pub successful: usize,
}

/// Adapts a fully-buffered multipart field to `AsyncRead`. Upload size
/// is already bounded by `RequestBodyLimitLayer` ahead of the
/// handlers; reads here never block since the bytes are resident.
struct MemoryReader {
    cursor: std::io::Cursor<Bytes>,
}

impl AsyncRead for MemoryReader {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let n = std::io::Read::read(&mut self.cursor, buf.initialize_unfilled())?;
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

fn upload_source(filename: String, bytes: Bytes) -> UploadSource {
    UploadSource { filename, reader: Box::pin(MemoryReader { cursor: std::io::Cursor::new(bytes) }) }
}

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponseBody>, ApiError> {
    let user = state.db.get_user(&req.email).await.map_err(|_| ApiError::Unauthorized)?;
    if !crate::auth::hash::verify_password(&req.password, &user.password) {
        return Err(ApiError::Unauthorized);
    }
    let issued = state.jwt.encode(user.id, &user.email).map_err(|_| ApiError::Internal)?;
    Ok(Json(TokenResponseBody { token: issued.token, user_id: issued.user_id, exp: issued.exp }))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Forbidden("Could not validate credentials".to_string()))?;
    let claims = state
        .jwt
        .decode(extract_bearer_token(header))
        .map_err(|_| ApiError::Forbidden("Could not validate credentials".to_string()))?;
    state.db.get_user(&claims.email).await.map_err(|_| ApiError::Unauthorized)
}

struct SignParams {
    keyid: Option<String>,
    detached: bool,
    digest_algo: DigestAlgorithm,
    files: Vec<(String, Bytes)>,
}

async fn collect_multipart(mut multipart: Multipart, files_field: &str) -> Result<SignParams, ApiError> {
    let mut keyid = None;
    let mut sign_type = "detach-sign".to_string();
    let mut sign_algo = "SHA256".to_string();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(e.to_string()))? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "keyid" => keyid = Some(field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?),
            "sign_type" => sign_type = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?,
            "sign_algo" => sign_algo = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?,
            name if name == files_field => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                files.push((filename, bytes));
            }
            _ => {}
        }
    }

    Ok(SignParams {
        keyid,
        detached: sign_type == "detach-sign",
        digest_algo: DigestAlgorithm::parse_lenient(&sign_algo),
        files,
    })
}

pub async fn sign(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<String, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let params = collect_multipart(multipart, "file").await?;
    let keyid = params.keyid.ok_or_else(|| ApiError::bad_request("keyid is required"))?;

    let backend = signd_backend::global();
    if !backend.key_exists(&keyid) {
        return Err(ApiError::bad_request(format!("key {keyid} does not exists")));
    }
    let (filename, bytes) = params.files.into_iter().next().ok_or_else(|| ApiError::bad_request("file is required"))?;
    let upload = upload_source(filename.clone(), bytes);

    let signature = backend.sign(&keyid, upload, params.detached, params.digest_algo).await?;
    tracing::info!(user = %user.email, filename = %filename, keyid = %keyid, "signed file");
    Ok(signature)
}

pub async fn sign_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<BatchSignResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let params = collect_multipart(multipart, "files").await?;
    let keyid = params.keyid.ok_or_else(|| ApiError::bad_request("keyid is required"))?;

    if params.files.is_empty() {
        return Err(ApiError::bad_request("No files provided for signing"));
    }

    let backend = signd_backend::global();
    if !backend.key_exists(&keyid) {
        return Err(ApiError::bad_request(format!("key {keyid} does not exist")));
    }

    tracing::info!(
        user = %user.email,
        count = params.files.len(),
        keyid = %keyid,
        "initiated batch signing"
    );

    let total = params.files.len();
    let uploads: Vec<UploadSource> =
        params.files.into_iter().map(|(name, bytes)| upload_source(name, bytes)).collect();

    let signed = backend.sign_batch(&keyid, uploads, params.detached, params.digest_algo).await?;

    let results = signed
        .into_iter()
        .map(|(filename, signature)| {
            tracing::info!(user = %user.email, filename = %filename, keyid = %keyid, "signed file in batch");
            FileSignResult { filename, success: true, signature: Some(signature) }
        })
        .collect::<Vec<_>>();
    let successful = results.len();

    Ok(Json(BatchSignResponse { results, total, successful }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, SigningBackendKind};
    use crate::db::Db;
    use std::path::PathBuf;

    fn in_memory_settings() -> Settings {
        Settings {
            gpg_binary: PathBuf::from("/usr/bin/gpg2"),
            keyring: PathBuf::from("/tmp/keyring"),
            locks_dir: PathBuf::from("/tmp/locks"),
            max_upload_bytes: 100_000_000,
            pass_db_dev_mode: true,
            pass_db_dev_pass: "dev".into(),
            tmp_dir: PathBuf::from("/tmp"),
            pgp_keys: Vec::new(),
            db_url: "sqlite::memory:".into(),
            db_pool_size: 1,
            db_max_overflow: 0,
            db_pool_recycle: 60,
            db_pool_pre_ping: false,
            db_echo: false,
            jwt_secret_key: "test-secret".into(),
            jwt_expire_minutes: 30,
            jwt_algorithm: "HS256".into(),
            root_url: String::new(),
            service: "signd-test".into(),
            signing_backend: SigningBackendKind::Gpg,
            kms_region: None,
            kms_signing_algorithm: "RSASSA_PKCS1_V1_5_SHA_256".into(),
            kms_max_workers: 1,
            kms_keys: Vec::new(),
            bind_addr: "127.0.0.1:0".into(),
        }
    }

    async fn state_with_user(email: &str, password: &str) -> AppState {
        let settings = in_memory_settings();
        let db = Db::connect(&settings).await.unwrap();
        db.create_tables().await.unwrap();
        let hashed = crate::auth::hash::hash_password(password).unwrap();
        db.create_user(email, &hashed).await.unwrap();
        let jwt = Jwt::new(settings.jwt_secret_key, settings.jwt_expire_minutes, &settings.jwt_algorithm).unwrap();
        AppState { jwt: Arc::new(jwt), db: Arc::new(db) }
    }

    #[tokio::test]
    async fn ping_returns_pong() {
        assert_eq!(ping().await, "pong");
    }

    #[tokio::test]
    async fn token_issues_a_jwt_carrying_the_email_claim() {
        let state = state_with_user("test@test.ru", "test").await;
        let response = token(
            State(state),
            Json(TokenRequest { email: "test@test.ru".to_string(), password: "test".to_string() }),
        )
        .await
        .unwrap();
        assert_eq!(response.0.user_id, 1);
        assert!(response.0.exp > 0);
    }

    #[tokio::test]
    async fn token_rejects_wrong_password() {
        let state = state_with_user("test@test.ru", "test").await;
        let err = token(
            State(state),
            Json(TokenRequest { email: "test@test.ru".to_string(), password: "wrong".to_string() }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn authenticate_rejects_missing_authorization_header() {
        let state = state_with_user("test@test.ru", "test").await;
        let err = authenticate(&state, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(detail) if detail == "Could not validate credentials"));
    }

    #[tokio::test]
    async fn authenticate_accepts_a_freshly_issued_token() {
        let state = state_with_user("test@test.ru", "test").await;
        let issued = state.jwt.encode(1, "test@test.ru").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", issued.token).parse().unwrap(),
        );

        let user = authenticate(&state, &headers).await.unwrap();
        assert_eq!(user.email, "test@test.ru");
    }
}
