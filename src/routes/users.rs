//! # 학회 사용자 API
//!
//! - `GET  /api/conferences/{id}/users` → 활성 사용자 배열 (성, 이름 순)
//! - `POST /api/conferences/{id}/users` → 사용자 등록

// ── 의존성 가져오기 ──
use crate::{
    db::{self, ConferenceUser, NewConferenceUser}, // 사용자 쿼리와 요청/응답 구조체
    error::AppError,                               // 에러 타입 (HTTP 에러 응답으로 자동 변환)
    routes::AppState,                              // 애플리케이션 공유 상태 (DB 풀 등)
};
use axum::{
    extract::{Path, State}, // Axum 추출자: URL 파라미터, 앱 상태 추출
    http::StatusCode,       // HTTP 상태 코드 (201 Created)
    Json,                   // JSON 요청/응답 처리
};

/// 학회의 활성 사용자 목록을 조회합니다.
///
/// 응답은 객체로 감싸지 않은 배열입니다. (`HttpApi::fetch_users`가 이 형태를 기대함)
pub async fn list_users(
    State(state): State<AppState>,
    Path(conference_id): Path<String>,
) -> Result<Json<Vec<ConferenceUser>>, AppError> {
    let users = db::list_conference_users(&state.pool, &conference_id).await?;
    Ok(Json(users))
}

/// 사용자를 등록합니다.
///
/// `POST /api/conferences/{id}/users` + `{ "firstname", "lastname", "email", ... }` → 201
///
/// 배정 도구의 사용자 추가(`HttpApi::create_user`)도 이 엔드포인트를 씁니다.
pub async fn create_user(
    State(state): State<AppState>,
    Path(conference_id): Path<String>,
    Json(req): Json<NewConferenceUser>,
) -> Result<(StatusCode, Json<ConferenceUser>), AppError> {
    let user = db::insert_conference_user(&state.pool, &conference_id, &req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
