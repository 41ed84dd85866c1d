//! # 배정 도구 핸들러 (`/tool/*`)
//!
//! 모든 엔드포인트는 `?confid=` 또는 `?conference_id=`로 학회를 고릅니다.
//! 핸들러는 학회 도구의 잠금을 잡은 채로 작업을 끝내고,
//! 그동안 쌓인 알림을 응답의 `notices`로 돌려줍니다.
//!
//! | 메서드 | 경로 | 설명 |
//! |--------|------|------|
//! | GET | /tool/state | 전체 상태 |
//! | POST | /tool/reload | 원격/로컬 데이터 다시 읽기 |
//! | POST | /tool/users | 사용자 추가 |
//! | POST | /tool/select/{user_id} | 사용자 선택 |
//! | DELETE | /tool/select | 선택 해제 |
//! | POST | /tool/clear | 전체 초기화 |
//! | POST | /tool/toggle | 배정 토글 |
//! | POST | /tool/confirm | 열린 확인에 응답 |
//! | DELETE | /tool/assignments/{session_id}/{user_id} | 배정 하나 삭제 |
//! | GET | /tool/users/{user_id}/assignments | 사용자 일정 |
//! | GET | /tool/export | JSON 번들 |
//! | GET | /tool/report | 텍스트 보고서 |
//!
//! ## 잠금 패턴
//! 모든 핸들러는 같은 순서를 따릅니다:
//! 1. `state.tool(&conference)`로 학회 도구를 꺼냄 (처음이면 로드)
//! 2. `tool.lock().await`로 잠금을 잡음
//! 3. 작업 후 `take_notices()`로 쌓인 알림을 꺼내 응답에 붙임

// ── 의존성 가져오기 ──
use crate::{
    error::AppError,                                        // 에러 타입 (HTTP 에러 응답으로 자동 변환)
    models::{EntityId, NewUserRequest},                     // 요청 구조체와 ID 타입
    routes::{to_json, with_notices, AppState, ConferenceQuery}, // 공유 상태와 응답 도우미
    services::export::{export_bundle, text_report},         // 내보내기 서비스
};
use axum::{
    extract::{Path, Query, State}, // 추출자: URL 파라미터, 쿼리 문자열, 앱 상태
    http::{header, StatusCode},    // 응답 헤더 이름과 상태 코드 (201 Created 등)
    response::IntoResponse,        // 튜플 응답을 HTTP 응답으로 변환
    Json,                          // JSON 요청/응답 처리
};
use chrono::Utc; // 내보내기 파일 이름의 날짜
use serde::Deserialize; // 요청 본문 역직렬화
use serde_json::{json, Value}; // JSON 객체 생성용 매크로와 범용 JSON 타입

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub session_id: EntityId,
    #[serde(default)]
    pub user_id: Option<EntityId>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub accept: bool,
}

pub async fn get_state(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    let notices = tool.take_notices();
    to_json(tool.state(notices))
}

/// 사용자와 배정, 세션을 다시 읽습니다. 열린 확인은 버려집니다.
///
/// `POST /tool/reload` → `get_state`와 같은 형태
pub async fn reload(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    tool.reload().await;
    let notices = tool.take_notices();
    to_json(tool.state(notices))
}

/// 사용자를 추가합니다. 원격 등록이 돌려준 ID가 응답의 `user.id`입니다.
///
/// `POST /tool/users` + `{ "name": "...", "email": "..." }` → 201
pub async fn add_user(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Json(req): Json<NewUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    let user = tool.add_user(req).await?;
    let notices = tool.take_notices();
    Ok((StatusCode::CREATED, with_notices(json!({ "user": user }), notices)?))
}

pub async fn select_user(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    tool.select_user(Some(EntityId::new(user_id))).await?;
    let notices = tool.take_notices();
    let selected = tool.engine().selected_user().cloned();
    with_notices(json!({ "selected_user": selected }), notices)
}

pub async fn clear_selection(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    tool.select_user(None).await?;
    let notices = tool.take_notices();
    with_notices(json!({ "selected_user": Value::Null }), notices)
}

pub async fn clear_all(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    tool.clear_all().await?;
    let notices = tool.take_notices();
    with_notices(json!({ "success": true }), notices)
}

/// 확인이 필요하면 `{ "outcome": "needs_confirmation", "confirmation": ... }`를 200으로 돌려줍니다.
pub async fn toggle(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    // user_id가 없으면 선택된 사용자로 토글합니다
    let outcome = tool.toggle(req.session_id, req.user_id).await?;
    let notices = tool.take_notices();
    with_notices(outcome, notices)
}

pub async fn confirm(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    let outcome = tool.confirm(req.accept).await?;
    let notices = tool.take_notices();
    with_notices(outcome, notices)
}

pub async fn remove_assignment(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Path((session_id, user_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    let removed = tool
        .remove(&EntityId::new(session_id), &EntityId::new(user_id))
        .await?;
    let notices = tool.take_notices();
    with_notices(json!({ "removed": removed }), notices)
}

/// 사용자의 일정. 목록에 없는 세션은 `missing: true` 자리표시자로 나옵니다.
pub async fn user_assignments(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let tool = tool.lock().await;
    let user_id = EntityId::new(user_id);
    let user = tool
        .engine()
        .find_user(&user_id)
        .ok_or_else(|| AppError::NotFound(format!("User not found: {user_id}")))?;
    let sessions = tool.user_sessions(&user_id);
    Ok(Json(json!({ "user": user, "sessions": sessions })))
}

pub async fn export(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tool = state.tool(&conference).await?;
    let tool = tool.lock().await;
    let body = to_json(export_bundle(tool.engine()))?;
    // Content-Disposition: 브라우저가 파일로 내려받게 합니다
    let filename = format!(
        "attachment; filename=\"conference-assignments-{}.json\"",
        Utc::now().format("%Y-%m-%d")
    );
    Ok(([(header::CONTENT_DISPOSITION, filename)], body))
}

pub async fn report(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tool = state.tool(&conference).await?;
    let tool = tool.lock().await;
    let report = text_report(tool.engine())?;
    let filename = format!(
        "attachment; filename=\"conference-report-{}.txt\"",
        Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        report,
    ))
}
