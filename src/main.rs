//! # confdesk 웹 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 연결 풀 생성과 마이그레이션
//! 4. 배정 도구의 데이터 소스 선택 (원격 API 또는 내장 DB)
//! 5. 오프라인 게이트웨이 설치/활성화 (업스트림이 설정된 경우)
//! 6. 라우터 구성과 HTTP 서버 시작

mod config;
mod db;
mod error;
mod models;
mod offline;
mod routes;
mod services;

use anyhow::Result;
use config::Config;
use offline::{CacheStorage, HttpFetcher, OfflinePolicy, OfflineWorker, DEFAULT_STATIC_ASSETS};
use reqwest::Url;
use routes::AppState;
use services::{
    remote::{ConferenceApi, HttpApi, LocalApi},
    workspace::ToolRegistry,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{str::FromStr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 파일이 없어도 계속 진행
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confdesk=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Starting confdesk server on {}:{}", config.host, config.port);

    // ── 데이터베이스 ──
    let connect = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    tokio::fs::create_dir_all(&config.local_store_dir).await?;

    // ── 배정 도구 데이터 소스 ──
    let api: Arc<dyn ConferenceApi> = match &config.api_base {
        Some(base) => {
            tracing::info!("Using remote conference API at {}", base);
            Arc::new(HttpApi::new(
                base.clone(),
                config.primary_data_path.clone(),
                config.fetch_timeout,
            )?)
        }
        None => {
            tracing::info!("Using built-in database and {}", config.sessions_path);
            Arc::new(LocalApi::new(pool.clone(), &config.sessions_path))
        }
    };
    let tools = ToolRegistry::new(api, &config.local_store_dir);

    // ── 오프라인 게이트웨이 ──
    let worker = match &config.upstream_origin {
        Some(origin) => Some(start_worker(&config, origin).await?),
        None => {
            tracing::info!("No upstream origin, serving static files from {}", config.static_dir);
            None
        }
    };

    let state = AppState {
        pool,
        config: config.clone(),
        tools,
        worker,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// 게이트웨이를 만들고 설치/활성화합니다.
///
/// 설치에 실패해도 서버는 뜹니다. 이때 게이트웨이는 폐기 상태로 요청을 그대로 통과시킵니다.
async fn start_worker(config: &Config, origin: &str) -> Result<OfflineWorker> {
    let origin = Url::parse(origin)?;
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
    let policy = OfflinePolicy::new(
        fetcher,
        CacheStorage::new(),
        origin.clone(),
        &config.cache_version,
        &config.primary_data_path,
        DEFAULT_STATIC_ASSETS,
    )?;

    let worker = OfflineWorker::new(policy);
    match worker.install().await {
        Ok(count) => {
            worker.activate().await?;
            tracing::info!(%origin, count, "Offline gateway active");
        }
        Err(e) => tracing::warn!(%origin, "Offline gateway disabled, passing requests through: {e}"),
    }
    Ok(worker)
}
