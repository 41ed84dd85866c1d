//! # 라우트 핸들러 모듈
//!
//! 각 하위 모듈:
//! - `health`: 서버 상태 확인
//! - `users`, `assignments`: 학회 사용자/배정 데이터 API (DB 기반)
//! - `sessions`: 세션 목록 필터링과 수동 업로드
//! - `tool`: 배정 도구 (`/tool/*`)
//! - `bookmarks`: 세션 북마크
//! - `offline`: 오프라인 게이트웨이 제어 (`/sw/*`)와 프록시 fallback

pub mod assignments;
pub mod bookmarks;
pub mod health;
pub mod offline;
pub mod sessions;
pub mod tool;
pub mod users;

use crate::{
    config::Config,
    error::AppError,
    offline::OfflineWorker,
    services::workspace::{AttendanceTool, Notice, ToolRegistry},
};
use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;

/// 애플리케이션 공유 상태
///
/// 모든 핸들러가 `State(state): State<AppState>`로 접근합니다.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    /// 학회별 배정 도구
    pub tools: ToolRegistry,
    /// `UPSTREAM_ORIGIN`이 설정된 경우에만 존재
    pub worker: Option<OfflineWorker>,
}

/// `?confid=` 또는 `?conference_id=` (앞쪽 우선)
#[derive(Debug, Default, Deserialize)]
pub struct ConferenceQuery {
    pub confid: Option<String>,
    pub conference_id: Option<String>,
}

impl ConferenceQuery {
    pub fn resolve(&self, default: &str) -> String {
        self.confid
            .as_deref()
            .or(self.conference_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(default)
            .to_string()
    }
}

impl AppState {
    /// 쿼리가 가리키는 학회의 도구. 처음 요청되면 로드합니다.
    pub async fn tool(&self, query: &ConferenceQuery) -> Result<Arc<Mutex<AttendanceTool>>, AppError> {
        let conference_id = query.resolve(&self.config.default_conference_id);
        self.tools.get(&conference_id).await
    }
}

/// 직렬화 가능한 값을 JSON 응답으로 바꿉니다.
pub(crate) fn to_json<T: Serialize>(value: T) -> Result<Json<Value>, AppError> {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {e}")))
}

/// 객체 응답에 `notices` 필드를 붙입니다.
pub(crate) fn with_notices<T: Serialize>(
    value: T,
    notices: Vec<Notice>,
) -> Result<Json<Value>, AppError> {
    let Json(mut body) = to_json(value)?;
    if let Value::Object(map) = &mut body {
        map.insert("notices".to_string(), to_json(notices)?.0);
    }
    Ok(Json(body))
}

/// 전체 라우터를 구성합니다.
///
/// 업스트림이 있으면 매칭되지 않은 요청은 오프라인 게이트웨이로,
/// 없으면 `STATIC_DIR`의 정적 파일로 넘어갑니다.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/conferences/{id}/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/conferences/{id}/assignments",
            get(assignments::get_assignments).post(assignments::save_assignments),
        )
        .route(
            "/conferences/{id}/assignments/bulk",
            post(assignments::save_assignments),
        )
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/upload", post(sessions::upload_sessions))
        .route("/bookmarks", get(bookmarks::list_bookmarks))
        .route("/bookmarks/{session_id}", post(bookmarks::toggle_bookmark));

    let tool_routes = Router::new()
        .route("/state", get(tool::get_state))
        .route("/reload", post(tool::reload))
        .route("/users", post(tool::add_user))
        .route("/select", delete(tool::clear_selection))
        .route("/select/{user_id}", post(tool::select_user))
        .route("/clear", post(tool::clear_all))
        .route("/toggle", post(tool::toggle))
        .route("/confirm", post(tool::confirm))
        .route(
            "/assignments/{session_id}/{user_id}",
            delete(tool::remove_assignment),
        )
        .route("/users/{user_id}/assignments", get(tool::user_assignments))
        .route("/export", get(tool::export))
        .route("/report", get(tool::report));

    let sw_routes = Router::new()
        .route("/status", get(offline::status))
        .route("/message", post(offline::message))
        .route("/sync/{tag}", post(offline::sync))
        .route("/push", post(offline::push))
        .route("/notification-click", post(offline::notification_click))
        .route("/events", get(offline::events));

    let app = Router::new()
        .nest("/api", api_routes)
        .nest("/tool", tool_routes)
        .nest("/sw", sw_routes);

    let app = if state.worker.is_some() {
        app.fallback(offline::gateway)
    } else {
        app.fallback_service(ServeDir::new(&state.config.static_dir))
    };

    app.with_state(state)
}
