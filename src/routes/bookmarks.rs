//! # 북마크 핸들러
//!
//! - `GET  /api/bookmarks` → 북마크한 세션 ID 목록 (추가 순)
//! - `POST /api/bookmarks/{session_id}` → 토글

// ── 의존성 가져오기 ──
use crate::{
    error::AppError,                     // 에러 타입
    models::EntityId,                    // 세션 ID
    routes::{AppState, ConferenceQuery}, // 공유 상태와 학회 선택 쿼리
};
use axum::{
    extract::{Path, Query, State}, // 추출자: URL 파라미터, 쿼리 문자열, 앱 상태
    Json,                          // JSON 응답
};
use serde_json::{json, Value}; // JSON 객체 생성용 매크로

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let tool = tool.lock().await;
    Ok(Json(json!({ "bookmarks": tool.bookmarks().ids() })))
}

/// 북마크를 토글합니다. 응답의 `bookmarked`는 토글 후 상태입니다.
///
/// 세션 목록에 없는 ID도 북마크할 수 있습니다.
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    let session_id = EntityId::new(session_id);
    let bookmarked = tool.toggle_bookmark(session_id.clone()).await?;
    Ok(Json(json!({ "session_id": session_id, "bookmarked": bookmarked })))
}
