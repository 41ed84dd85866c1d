//! # 비즈니스 로직 모듈
//!
//! 라우트 핸들러와 데이터 소스 사이의 도메인 로직입니다.
//!
//! 각 하위 모듈:
//! - `dedup`: 세션 중복 제거와 배정 병합
//! - `engine`: 배정 토글, 단일 담당자/시간 충돌 확인
//! - `schedule`: 날짜·시간 정렬, 검색/필터
//! - `bookmarks`: 참석자 북마크
//! - `export`: JSON 번들, 텍스트 보고서
//! - `local_store`: 학회별 로컬 대체 저장소
//! - `remote`: 원격 데이터 소스 (`ConferenceApi`)
//! - `workspace`: 학회별 배정 도구 컨트롤러

pub mod bookmarks;
pub mod dedup;
pub mod engine;
pub mod export;
pub mod local_store;
pub mod remote;
pub mod schedule;
pub mod workspace;
