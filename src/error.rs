//! # 에러 처리 모듈
//!
//! HTTP 계층에서 사용하는 통합 에러 타입 `AppError`를 정의합니다.
//! 하위 모듈의 에러(`EngineError`, `ApiError`, `OfflineError`)는 `From` 구현으로
//! `AppError`에 합쳐지므로 핸들러에서는 `?`만 쓰면 됩니다.
//!
//! 응답 형태: `{ "error": { "code": "...", "message": "..." } }`

use crate::offline::OfflineError; // 게이트웨이 에러
use crate::services::engine::EngineError; // 배정 엔진 사용 오류
use crate::services::remote::ApiError; // 원격 데이터 소스 에러
use axum::{
    http::StatusCode,                   // HTTP 상태 코드 (200, 404, 500 등)
    response::{IntoResponse, Response}, // Axum의 응답 변환 트레이트
    Json,                               // JSON 응답 래퍼
};
use serde_json::json; // json! 매크로: JSON 객체를 간편하게 생성
use thiserror::Error; // thiserror: 커스텀 에러 타입을 쉽게 만들어주는 매크로 크레이트

// #[derive(Debug, Error)]:
// - Debug: 디버깅용 출력 ({:?})
// - Error (thiserror): std::error::Error 구현과 함께
//   #[error("...")] 어트리뷰트로 Display 메시지를 만듭니다.
//
// #[from]이 붙은 variant는 From 구현이 자동 생성되어
// `?` 연산자가 sqlx::Error 등을 AppError로 바꿔 줍니다.

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 핸들러가 `Result<T, AppError>`를 반환하면 Axum이 `IntoResponse`를 호출해
/// HTTP 에러 응답으로 바꿉니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 잘못된 요청 (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 파일 입출력 오류 (HTTP 500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 업로드된 JSON을 해석할 수 없음 (HTTP 400)
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// 확인 대기 중 변경 시도 등 현재 상태와 충돌 (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 업스트림(원격 API, 프록시 대상) 실패 (HTTP 502)
    #[error("Upstream error: {0}")]
    Upstream(String),
}

// ── 하위 모듈 에러 변환 ──
// 아래 From 구현 덕분에 서비스 계층의 에러도 핸들러에서 `?`로 그대로 전파됩니다.

/// 엔진 오류는 원인에 따라 409 / 404 / 400으로 나뉩니다.
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ConfirmationPending | EngineError::NothingPending => {
                AppError::Conflict(err.to_string())
            }
            EngineError::UnknownUser(_) => AppError::NotFound(err.to_string()),
            EngineError::InvalidUser(msg) => AppError::BadRequest(msg),
        }
    }
}

/// DB 오류는 500으로, 나머지(HTTP 실패, 거부 응답)는 502로 갑니다.
impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Database(e) => AppError::Database(e),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<OfflineError> for AppError {
    fn from(err: OfflineError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// 내부 에러(Database, IO, Internal)는 실제 내용을 로그에만 남기고
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        // match로 모든 variant를 빠짐없이 처리합니다.
        // `ref msg`: self를 소비하지 않고 안쪽 값을 빌려옵니다.
        let (status, code, message) = match self {
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "An IO error occurred".to_string(),
                )
            }
            AppError::Json(ref e) => (
                StatusCode::BAD_REQUEST,
                "invalid_json",
                format!("Error loading file: {e}"),
            ),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Upstream(ref msg) => {
                tracing::warn!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "upstream_error", msg.clone())
            }
        };

        // 모든 에러는 같은 모양의 JSON 본문을 가집니다
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // (상태 코드, 본문) 튜플도 IntoResponse를 구현합니다
        (status, body).into_response()
    }
}
