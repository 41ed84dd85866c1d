//! # 학회 사용자 데이터베이스 쿼리 모듈
//!
//! `conference_users` 테이블을 다룹니다. 비활성(`active = 0`) 사용자는
//! 목록에도, 배정 저장에도 나타나지 않습니다.

use crate::error::AppError;
use serde::{Deserialize, Serialize}; // 요청은 Deserialize, 응답은 Serialize
use sqlx::SqlitePool;

/// `conference_users` 테이블의 한 행
///
/// `sqlx::FromRow`: SELECT 결과의 컬럼 이름과 필드 이름을 맞춰 자동으로 채웁니다.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConferenceUserRow {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub degree: Option<String>,
    pub external_id: Option<String>,
    pub external_system: Option<String>,
    pub active: bool,
    pub created_at: String,
}

/// 사용자 목록 API의 응답 레코드
///
/// 테이블에 역할/배정일 컬럼이 없으므로 `conference_role`은 항상 `"msd"`,
/// `assigned_date`는 `created_at`과 같습니다.
#[derive(Debug, Clone, Serialize)]
pub struct ConferenceUser {
    pub user_id: i64,
    pub name: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub degree: Option<String>,
    pub external_id: Option<String>,
    pub external_system: Option<String>,
    pub conference_role: &'static str,
    pub active: bool,
    pub assigned_date: String,
    pub created_at: String,
}

impl From<ConferenceUserRow> for ConferenceUser {
    fn from(row: ConferenceUserRow) -> Self {
        Self {
            user_id: row.id,
            name: format!("{} {}", row.firstname, row.lastname),
            firstname: row.firstname,
            lastname: row.lastname,
            email: row.email,
            department: row.department,
            title: row.title,
            degree: row.degree,
            external_id: row.external_id,
            external_system: row.external_system,
            conference_role: "msd",
            active: row.active,
            assigned_date: row.created_at.clone(),
            created_at: row.created_at,
        }
    }
}

/// 사용자 등록 요청
#[derive(Debug, Deserialize)]
pub struct NewConferenceUser {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    pub email: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub degree: Option<String>,
    pub external_id: Option<String>,
    pub external_system: Option<String>,
}

const USER_COLUMNS: &str = "id, firstname, lastname, email, department, title, degree, \
     external_id, external_system, active, created_at";

/// 학회의 활성 사용자 목록 (성, 이름 순)
///
/// 행 구조체(`ConferenceUserRow`)로 읽은 뒤 `From` 구현으로 응답 구조체로 바꿉니다.
pub async fn list_conference_users(
    pool: &SqlitePool,
    conference_id: &str,
) -> Result<Vec<ConferenceUser>, AppError> {
    let rows = sqlx::query_as::<_, ConferenceUserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM conference_users \
         WHERE conference_id = ? AND active = 1 \
         ORDER BY lastname, firstname"
    ))
    .bind(conference_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ConferenceUser::from).collect())
}

/// 사용자를 등록하고 저장된 레코드를 반환합니다.
pub async fn insert_conference_user(
    pool: &SqlitePool,
    conference_id: &str,
    req: &NewConferenceUser,
) -> Result<ConferenceUser, AppError> {
    let firstname = req.firstname.trim();
    let lastname = req.lastname.trim();
    let email = req.email.trim();
    if email.is_empty() || (firstname.is_empty() && lastname.is_empty()) {
        return Err(AppError::BadRequest(
            "A name and an email are required".to_string(),
        ));
    }

    // RETURNING: INSERT한 행을 같은 쿼리에서 바로 돌려받습니다 (SQLite 3.35+)
    let row = sqlx::query_as::<_, ConferenceUserRow>(&format!(
        r#"
        INSERT INTO conference_users (
            conference_id, firstname, lastname, email, department,
            title, degree, external_id, external_system
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(conference_id)
    .bind(firstname)
    .bind(lastname)
    .bind(email)
    .bind(&req.department)
    .bind(&req.title)
    .bind(&req.degree)
    .bind(&req.external_id)
    .bind(&req.external_system)
    .fetch_one(pool)
    .await?;

    tracing::info!(conference_id, user_id = row.id, "Registered conference user");
    Ok(row.into())
}

/// 활성 사용자인지 확인합니다. (배정 저장 시 검증용)
///
/// 풀 대신 `Executor`를 받으므로 트랜잭션(`&mut *tx`) 안에서도 쓸 수 있습니다.
pub async fn is_active_user<'e, E>(
    executor: E,
    conference_id: &str,
    user_id: i64,
) -> Result<bool, AppError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM conference_users WHERE conference_id = ? AND id = ? AND active = 1",
    )
    .bind(conference_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(found.is_some())
}
