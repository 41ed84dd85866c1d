//! # 원격 데이터 소스
//!
//! 배정 도구가 의존하는 세 가지 원격 자원(세션 목록, 사용자 목록, 배정 맵)을
//! `ConferenceApi` 트레이트 뒤에 감춥니다.
//!
//! - `LocalApi`: 같은 프로세스의 SQLite와 세션 JSON 파일을 직접 읽습니다. (기본값)
//! - `HttpApi`: `API_BASE`에 있는 다른 서버의 `/api/conferences/...` 엔드포인트를 호출합니다.
//!
//! 두 구현 모두 실패를 `ApiError`로 돌려줄 뿐이고, 대체 데이터로 전환하는 것은
//! 호출자(`services::workspace`)의 몫입니다.

use crate::db;
use crate::models::{AssignmentMap, AssignmentPair, User};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not read data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// 서버가 응답했지만 저장을 거부함 (`success: false`)
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<crate::error::AppError> for ApiError {
    fn from(err: crate::error::AppError) -> Self {
        match err {
            crate::error::AppError::Database(e) => ApiError::Database(e),
            other => ApiError::Rejected(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ConferenceApi: Send + Sync {
    /// 세션 원본 레코드 배열
    async fn fetch_sessions(&self) -> Result<Vec<Value>, ApiError>;

    /// 사용자 원본 레코드 배열 (필드 이름 규칙은 제각각일 수 있음)
    async fn fetch_users(&self, conference_id: &str) -> Result<Vec<Value>, ApiError>;

    async fn fetch_assignments(&self, conference_id: &str) -> Result<AssignmentMap, ApiError>;

    /// 사용자 하나를 등록합니다. 저장된 원본 레코드를 반환합니다.
    /// 반환된 레코드의 ID가 이후 배정에 쓰입니다.
    async fn create_user(&self, conference_id: &str, user: &User) -> Result<Value, ApiError>;

    /// 배정 맵 전체를 저장합니다. 저장된 건수를 반환합니다.
    async fn save_assignments(
        &self,
        conference_id: &str,
        assignments: &AssignmentMap,
    ) -> Result<usize, ApiError>;
}

fn to_pairs(assignments: &AssignmentMap) -> Vec<AssignmentPair> {
    assignments
        .pairs()
        .map(|(session_id, user_id)| AssignmentPair {
            session_id: session_id.clone(),
            user_id: user_id.clone(),
        })
        .collect()
}

/// 세션 데이터 파일은 배열이거나 `{ "sessions": [...] }` 형태입니다.
fn session_array(value: Value) -> Result<Vec<Value>, ApiError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("sessions") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ApiError::Rejected("session data is not an array".to_string())),
        },
        _ => Err(ApiError::Rejected("session data is not an array".to_string())),
    }
}

// ── 내장 데이터 소스 ──

pub struct LocalApi {
    pool: SqlitePool,
    sessions_path: PathBuf,
}

impl LocalApi {
    pub fn new(pool: SqlitePool, sessions_path: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            sessions_path: sessions_path.into(),
        }
    }
}

#[async_trait]
impl ConferenceApi for LocalApi {
    async fn fetch_sessions(&self) -> Result<Vec<Value>, ApiError> {
        let text = tokio::fs::read_to_string(&self.sessions_path).await?;
        session_array(serde_json::from_str(&text)?)
    }

    async fn fetch_users(&self, conference_id: &str) -> Result<Vec<Value>, ApiError> {
        let users = db::list_conference_users(&self.pool, conference_id).await?;
        Ok(users
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?)
    }

    async fn fetch_assignments(&self, conference_id: &str) -> Result<AssignmentMap, ApiError> {
        Ok(db::get_assignments(&self.pool, conference_id).await?)
    }

    async fn create_user(&self, conference_id: &str, user: &User) -> Result<Value, ApiError> {
        let req = db::NewConferenceUser {
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            department: Some(user.department.clone()).filter(|d| !d.is_empty()),
            title: None,
            degree: None,
            external_id: None,
            external_system: None,
        };
        let created = db::insert_conference_user(&self.pool, conference_id, &req).await?;
        Ok(serde_json::to_value(created)?)
    }

    async fn save_assignments(
        &self,
        conference_id: &str,
        assignments: &AssignmentMap,
    ) -> Result<usize, ApiError> {
        let pairs = to_pairs(assignments);
        Ok(db::replace_assignments(&self.pool, conference_id, &pairs).await?)
    }
}

// ── HTTP 데이터 소스 ──

pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    sessions_path: String,
}

#[derive(Deserialize)]
struct AssignmentsResponse {
    #[serde(default)]
    assignments: AssignmentMap,
}

#[derive(Deserialize)]
struct SaveResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    count: usize,
    message: Option<String>,
}

impl HttpApi {
    /// # 매개변수
    /// - `base_url`: 원격 서버 주소 (끝의 `/` 없이)
    /// - `sessions_path`: 세션 데이터 경로 (예: "/sessions.json")
    pub fn new(
        base_url: impl Into<String>,
        sessions_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            sessions_path: sessions_path.into(),
        })
    }

    fn conference_url(&self, conference_id: &str, resource: &str) -> String {
        format!("{}/api/conferences/{}/{}", self.base_url, conference_id, resource)
    }

    async fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ConferenceApi for HttpApi {
    async fn fetch_sessions(&self) -> Result<Vec<Value>, ApiError> {
        let url = format!("{}{}", self.base_url, self.sessions_path);
        session_array(self.get_json(&url).await?)
    }

    async fn fetch_users(&self, conference_id: &str) -> Result<Vec<Value>, ApiError> {
        let url = self.conference_url(conference_id, "users");
        match self.get_json(&url).await? {
            Value::Array(users) => Ok(users),
            _ => Err(ApiError::Rejected("user list is not an array".to_string())),
        }
    }

    async fn fetch_assignments(&self, conference_id: &str) -> Result<AssignmentMap, ApiError> {
        let url = self.conference_url(conference_id, "assignments");
        let body: AssignmentsResponse = serde_json::from_value(self.get_json(&url).await?)?;
        Ok(body.assignments)
    }

    async fn create_user(&self, conference_id: &str, user: &User) -> Result<Value, ApiError> {
        let resp = self
            .http
            .post(self.conference_url(conference_id, "users"))
            .json(&json!({
                "firstname": user.firstname,
                "lastname": user.lastname,
                "email": user.email,
                "department": user.department,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn save_assignments(
        &self,
        conference_id: &str,
        assignments: &AssignmentMap,
    ) -> Result<usize, ApiError> {
        let resp = self
            .http
            .post(self.conference_url(conference_id, "assignments"))
            .json(&json!({ "assignments": to_pairs(assignments) }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }

        let body: SaveResponse = resp.json().await?;
        if !body.success {
            return Err(ApiError::Rejected(
                body.message.unwrap_or_else(|| "save failed".to_string()),
            ));
        }
        Ok(body.count)
    }
}
