//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `id`: 숫자/문자열 표현을 하나로 통일한 식별자
//! - `session`: 학회 세션(강연, 포스터) 레코드
//! - `user`: 배정 대상 스태프(MSD) 레코드
//! - `assignment`: 세션 → 사용자 배정 맵
//!
//! `pub use X::*;`로 재공개하여 `crate::models::Session`처럼 짧게 접근합니다.

pub mod assignment;
pub mod id;
pub mod session;
pub mod user;

pub use assignment::*;
pub use id::*;
pub use session::*;
pub use user::*;
