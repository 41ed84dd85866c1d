//! # 헬스체크 핸들러
//!
//! - `GET /api/health` → `{ "status": "healthy", "timestamp": "..." }`

use axum::Json; // JSON 응답 래퍼
use chrono::Utc; // 현재 시각
use serde_json::{json, Value}; // json! 매크로와 범용 JSON 타입

/// 서버 상태를 확인합니다. 실패하지 않습니다.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
