//! # 배정 데이터베이스 쿼리 모듈
//!
//! `conference_assignments` 테이블을 다룹니다.
//! 세션 ID와 사용자 ID는 모두 TEXT 컬럼입니다. (원격 세션 ID가 숫자가 아닐 수 있음)

use crate::db::users::is_active_user; // 트랜잭션 안에서 쓰는 활성 사용자 검사
use crate::error::AppError;
use crate::models::{AssignmentMap, AssignmentPair, EntityId};
use chrono::Utc; // assigned_date 기록용
use sqlx::SqlitePool;

/// 학회의 배정 맵 (세션 ID, 사용자 ID 순)
///
/// `query_as::<_, (String, String)>`: 구조체 없이 튜플로 행을 받습니다.
/// 결과는 `collect()`로 바로 `AssignmentMap`이 됩니다. (`FromIterator` 구현)
pub async fn get_assignments(
    pool: &SqlitePool,
    conference_id: &str,
) -> Result<AssignmentMap, AppError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT session_id, user_id
        FROM conference_assignments
        WHERE conference_id = ?
        ORDER BY session_id, user_id
        "#,
    )
    .bind(conference_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(session_id, user_id)| (EntityId::from(session_id), EntityId::from(user_id)))
        .collect())
}

/// 학회의 배정을 통째로 교체합니다. 하나의 트랜잭션으로 실행됩니다.
///
/// 학회의 활성 사용자가 아닌 쌍은 건너뜁니다.
///
/// # 반환값
/// 실제로 저장된 쌍의 수
pub async fn replace_assignments(
    pool: &SqlitePool,
    conference_id: &str,
    pairs: &[AssignmentPair],
) -> Result<usize, AppError> {
    // pool.begin(): 트랜잭션 시작. commit() 전에 에러로 빠져나가면
    // tx가 drop되면서 자동으로 롤백됩니다.
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM conference_assignments WHERE conference_id = ?")
        .bind(conference_id)
        .execute(&mut *tx)
        .await?;

    let assigned_date = Utc::now().to_rfc3339();
    let mut stored = 0;
    for pair in pairs {
        // 사용자 ID가 숫자가 아니면 DB 사용자일 수 없으므로 건너뜀
        let Some(user_id) = pair.user_id.as_number() else {
            continue;
        };
        if !is_active_user(&mut *tx, conference_id, user_id).await? {
            tracing::debug!(conference_id, user_id, "Skipping assignment for inactive user");
            continue;
        }

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO conference_assignments
                (conference_id, session_id, user_id, assigned_date, assigned_by)
            VALUES (?, ?, ?, ?, 'system')
            "#,
        )
        .bind(conference_id)
        .bind(pair.session_id.as_str())
        .bind(pair.user_id.as_str())
        .bind(&assigned_date)
        .execute(&mut *tx)
        .await?;
        // INSERT OR IGNORE: 같은 쌍이 두 번 오면 두 번째는 0행
        stored += result.rows_affected() as usize;
    }

    tx.commit().await?;
    tracing::info!(conference_id, submitted = pairs.len(), stored, "Replaced assignments");
    Ok(stored)
}
