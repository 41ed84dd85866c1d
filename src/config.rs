//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `HOST` / `PORT`: 서버 바인딩 주소
//! - `DEFAULT_CONFERENCE_ID`: `confid`/`conference_id` 쿼리가 없을 때 쓰는 학회 ID
//! - `SESSIONS_PATH`: 내장 데이터 소스가 읽는 세션 JSON 파일
//! - `LOCAL_STORE_DIR`: 학회별 로컬 대체 저장소 디렉토리
//! - `API_BASE`: 설정되면 배정 도구가 로컬 DB 대신 원격 API를 사용
//! - `UPSTREAM_ORIGIN`: 설정되면 오프라인 게이트웨이가 이 오리진을 프록시
//! - `STATIC_DIR`: 업스트림이 없을 때 그대로 서빙할 정적 파일 디렉토리
//! - `CACHE_VERSION`: 캐시 이름 접미사
//! - `FETCH_TIMEOUT_SECS`: 게이트웨이 요청 타임아웃
//! - `PRIMARY_DATA_PATH`: 업스트림의 기본 세션 데이터 경로

use std::env;
use std::time::Duration;

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후 `Arc<Config>`로 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/confdesk.db")
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub default_conference_id: String,
    pub sessions_path: String,
    pub local_store_dir: String,
    /// 원격 배정 API 주소 (예: "https://tools.example.org")
    pub api_base: Option<String>,
    /// 프록시 대상 오리진 (예: "https://idweek.example.org")
    pub upstream_origin: Option<String>,
    pub static_dir: String,
    pub cache_version: String,
    pub fetch_timeout: Duration,
    pub primary_data_path: String,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`이 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5001".to_string())
                .parse()
                .unwrap_or(5001),
            default_conference_id: env::var("DEFAULT_CONFERENCE_ID")
                .unwrap_or_else(|_| "1".to_string()),
            sessions_path: env::var("SESSIONS_PATH")
                .unwrap_or_else(|_| "data/sessions.json".to_string()),
            local_store_dir: env::var("LOCAL_STORE_DIR")
                .unwrap_or_else(|_| "data/local".to_string()),
            api_base: optional("API_BASE"),
            upstream_origin: optional("UPSTREAM_ORIGIN"),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            cache_version: env::var("CACHE_VERSION").unwrap_or_else(|_| "v1.0.0".to_string()),
            fetch_timeout: Duration::from_secs(
                env::var("FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            primary_data_path: env::var("PRIMARY_DATA_PATH")
                .unwrap_or_else(|_| "/sessions.json".to_string()),
        })
    }

    /// 테스트에서 쓰는 기본 설정
    #[cfg(test)]
    pub fn for_tests(database_url: &str, local_store_dir: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            default_conference_id: "1".to_string(),
            sessions_path: "data/does-not-exist.json".to_string(),
            local_store_dir: local_store_dir.to_string(),
            api_base: None,
            upstream_origin: None,
            static_dir: "static".to_string(),
            cache_version: "v1.0.0".to_string(),
            fetch_timeout: Duration::from_secs(1),
            primary_data_path: "/sessions.json".to_string(),
        }
    }
}

/// 비어 있지 않은 값만 `Some`
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}
