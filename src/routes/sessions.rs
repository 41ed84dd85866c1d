//! # 세션 목록 핸들러
//!
//! - `GET  /api/sessions?search=&date=&type=` → 필터 결과와 날짜/유형 옵션
//! - `POST /api/sessions/upload` → JSON 배열 본문으로 세션 목록 교체

// ── 의존성 가져오기 ──
use crate::{
    error::AppError,                                      // 에러 타입
    routes::{with_notices, AppState, ConferenceQuery},    // 공유 상태, 학회 선택 쿼리, 알림 도우미
    services::schedule::{group_by_slot, SessionFilter},   // 필터와 시간대 묶기
};
use axum::{
    extract::{Query, State}, // 쿼리 문자열, 앱 상태 추출
    Json,                    // JSON 응답
};
use serde_json::{json, Value}; // JSON 객체 생성용 매크로와 범용 JSON 타입

/// 세션 목록을 필터링해 돌려줍니다.
///
/// `Query`를 두 번 쓰는 것에 주의: 같은 쿼리 문자열을 학회 선택(`confid`)과
/// 필터(`search`, `date`, `type`)로 각각 파싱합니다. 모르는 키는 무시됩니다.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let tool = tool.lock().await;
    let filtered = tool.filter_sessions(&filter);
    // 같은 날짜·시간의 세션끼리 묶음 (화면의 시간대 구분용)
    let groups = group_by_slot(&filtered.sessions);
    Ok(Json(json!({
        "sessions": filtered.sessions,
        "dates": filtered.dates,
        "types": filtered.types,
        "total": tool.engine().sessions().len(),
        "groups": groups,
    })))
}

/// 본문이 JSON 배열이 아니면 400이며 상태는 바뀌지 않습니다.
pub async fn upload_sessions(
    State(state): State<AppState>,
    Query(conference): Query<ConferenceQuery>,
    body: String,
) -> Result<Json<Value>, AppError> {
    let tool = state.tool(&conference).await?;
    let mut tool = tool.lock().await;
    let count = tool.upload_sessions(&body).await?;
    let notices = tool.take_notices();
    with_notices(json!({ "success": true, "count": count }), notices)
}
