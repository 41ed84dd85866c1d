//! # 오프라인 게이트웨이
//!
//! 상위 출처(upstream) 앞에서 요청을 가로채 캐시 전략을 적용합니다.
//!
//! - `request`: 요청 표현, 분류 규칙
//! - `cache`: 이름 붙은 캐시 저장소
//! - `fetcher`: 네트워크 접근 (`Fetcher` 트레이트)
//! - `policy`: 전략, 설치/활성화
//! - `worker`: 수명 주기, 메시지, 동기화, 푸시 알림

pub mod cache;
pub mod fetcher;
pub mod policy;
pub mod request;
pub mod worker;

pub use cache::{CacheStorage, CachedResponse};
pub use fetcher::{FetchError, Fetcher, HttpFetcher};
pub use policy::{OfflinePolicy, DEFAULT_STATIC_ASSETS};
pub use request::{FetchRequest, RequestKind};
pub use worker::{
    ClientMessage, NotificationClick, OfflineWorker, PushPayload, WorkerMessage, WorkerState,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{url} returned status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker is redundant")]
    Redundant,
}
