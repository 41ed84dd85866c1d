//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 라우트 핸들러(routes/)와 내장 데이터 소스(`services::remote::LocalApi`)가 사용합니다.
//!
//! 각 하위 모듈:
//! - `users`: 학회 참석자(MSD) 조회/등록
//! - `assignments`: 세션 배정 조회/일괄 교체

pub mod assignments;
pub mod users;

pub use assignments::*;
pub use users::*;

/// 마이그레이션을 적용한 메모리 DB (테스트용)
#[cfg(test)]
pub async fn memory_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
