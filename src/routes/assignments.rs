//! # 학회 배정 API
//!
//! - `GET  /api/conferences/{id}/assignments` → `{ "assignments": { sessionId: [userId] } }`
//! - `POST /api/conferences/{id}/assignments` (또는 `.../bulk`) → 배정 전체 교체
//!
//! 저장 본문의 `assignments`는 맵 형태와 `{ session_id, user_id }` 목록 형태 모두 받습니다.

// ── 의존성 가져오기 ──
use crate::{
    db,                             // 데이터베이스 쿼리 모듈
    error::AppError,                // 에러 타입 (HTTP 에러 응답으로 자동 변환)
    models::SaveAssignmentsRequest, // 저장 요청 본문 (맵 또는 쌍 목록)
    routes::AppState,               // 애플리케이션 공유 상태 (DB 풀 등)
};
use axum::{
    extract::{Path, State}, // Axum 추출자: URL 파라미터, 앱 상태 추출
    Json,                   // JSON 요청/응답 처리
};
use serde_json::{json, Value}; // JSON 객체 생성용 매크로와 범용 JSON 타입

/// 학회의 배정 맵을 조회합니다.
///
/// `GET /api/conferences/{id}/assignments`
///
/// ID는 모두 문자열로 나갑니다. (`{ "101": ["7", "9"] }`)
pub async fn get_assignments(
    State(state): State<AppState>,
    Path(conference_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let assignments = db::get_assignments(&state.pool, &conference_id).await?;
    Ok(Json(json!({ "assignments": assignments })))
}

/// 배정을 통째로 교체합니다. `count`는 제출된 쌍의 수입니다.
pub async fn save_assignments(
    State(state): State<AppState>,
    Path(conference_id): Path<String>,
    Json(req): Json<SaveAssignmentsRequest>,
) -> Result<Json<Value>, AppError> {
    // assignments 필드 자체가 없으면 400 (빈 맵은 "전부 삭제"로 유효함)
    let body = req
        .assignments
        .ok_or_else(|| AppError::BadRequest("No assignments data provided".to_string()))?;

    // 맵/목록 어느 형태든 (session_id, user_id) 쌍으로 펼칩니다
    let pairs = body.into_pairs();
    let count = pairs.len();
    db::replace_assignments(&state.pool, &conference_id, &pairs).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Assignments saved successfully",
        "count": count,
    })))
}
