//! `signd`: the multi-tenant file signing HTTP service (spec.md §1).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use signd_service::config::{Settings, SigningBackendKind};
use signd_service::routes::{self, AppState};
use signd_service::{auth, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;

    let db = Arc::new(db::Db::connect(&settings).await?);
    init_backend(&settings).await?;

    let jwt = Arc::new(auth::jwt::Jwt::new(
        settings.jwt_secret_key.clone(),
        settings.jwt_expire_minutes,
        &settings.jwt_algorithm,
    )?);
    let state = AppState { jwt, db };

    let body_limit = (settings.max_upload_bytes as usize).saturating_add(1024 * 1024);
    let app = Router::new()
        .route("/ping", get(routes::ping))
        .route("/token", post(routes::token))
        .route("/sign", post(routes::sign))
        .route("/sign-batch", post(routes::sign_batch))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        );

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "signd listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Resolves and installs the process-wide signing backend singleton
/// (spec.md §4.6). Must run exactly once, before the router accepts
/// any request.
async fn init_backend(settings: &Settings) -> anyhow::Result<()> {
    match settings.signing_backend {
        SigningBackendKind::Gpg => {
            let gpg = signd_ipc::Gpg::new(settings.gpg_binary.clone(), settings.keyring.clone());
            let source = if settings.pass_db_dev_mode {
                signd_ipc::PassphraseSource::Development(settings.pass_db_dev_pass.clone())
            } else {
                signd_ipc::PassphraseSource::Interactive
            };
            let passphrase_db = signd_ipc::PassphraseDb::init(&gpg, &settings.pgp_keys, source)?;
            let audit = signd_backend::AuditLog::new(settings.service.clone());
            let backend = signd_backend::GpgBackend::new(
                gpg,
                passphrase_db,
                settings.locks_dir.clone(),
                settings.tmp_dir.clone(),
                settings.max_upload_bytes,
                audit,
            );
            signd_backend::install(signd_backend::Backend::Gpg(backend))?;
        }
        SigningBackendKind::Kms => {
            let kms_config = signd_kms::KmsConfig {
                key_ids: settings.kms_key_ids(),
                gpg_fingerprints: settings.kms_fingerprints(),
                region: settings.kms_region.clone(),
                signing_algorithm: settings.kms_signing_algorithm.clone(),
                max_upload_bytes: settings.max_upload_bytes,
                max_workers: settings.kms_max_workers,
            };
            let kms = signd_kms::Kms::init(kms_config).await?;
            let audit = signd_backend::AuditLog::new(settings.service.clone());
            let backend = signd_backend::KmsBackend::new(kms, settings.max_upload_bytes, audit);
            signd_backend::install(signd_backend::Backend::Kms(backend))?;
        }
    }
    Ok(())
}
