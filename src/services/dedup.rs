//! # 세션 중복 제거
//!
//! 크롤링 과정에서 같은 세션이 여러 번 수집되는 경우가 있습니다.
//! (제목, 날짜, 시간, 장소, 유형)이 모두 같은 레코드를 하나의 **대표(canonical) 세션**으로
//! 합치고, 중복 레코드의 ID에 걸려 있던 배정을 대표 세션으로 옮깁니다.
//!
//! ## 알고리즘
//! 1. 레코드마다 `title|||date|||time|||location|||type` 복합 키 계산 (없는 필드는 빈 문자열)
//! 2. 키별로 처음 본 레코드를 보관, 이후 같은 키는 중복 그룹에 추가
//! 3. 그룹의 나머지 레코드 ID에 배정이 있으면 대표 ID 목록에 없는 사용자만 순서대로 추가 후 삭제
//! 4. 결과 목록은 처음 등장한 순서 그대로
//!
//! 복합 키 필드가 전부 비어 있는 레코드끼리는 모두 하나로 합쳐집니다.
//! 이런 레코드는 "미정/불량" 데이터이므로 함께 묶여도 괜찮습니다.

use crate::models::{AssignmentMap, Session};
use std::collections::HashMap;

/// 중복 제거 결과 통계 (로그용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    pub original_count: usize,
    pub unique_count: usize,
    /// 중복이 하나 이상 있었던 키의 수
    pub duplicate_groups: usize,
}

/// 복합 키를 만듭니다.
pub fn session_key(session: &Session) -> String {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    format!(
        "{}|||{}|||{}|||{}|||{}",
        field(&session.title),
        field(&session.date),
        field(&session.time),
        field(&session.location),
        field(&session.kind)
    )
}

/// 세션 목록에서 중복을 제거하고, 중복 레코드에 걸린 배정을 대표 세션으로 병합합니다.
///
/// # 반환값
/// - 중복이 제거된 세션 목록 (처음 등장 순서 유지)
/// - 통계
///
/// 배정 맵은 제자리에서 수정됩니다.
pub fn deduplicate(
    sessions: Vec<Session>,
    assignments: &mut AssignmentMap,
) -> (Vec<Session>, DedupReport) {
    let original_count = sessions.len();

    // 키 → 결과 목록에서의 위치
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    // 키 → 대표 세션 뒤로 이어지는 중복 레코드들 (등장 순서)
    let mut duplicates: HashMap<String, Vec<Session>> = HashMap::new();
    // 중복이 처음 발견된 순서를 기억하여 병합 순서를 결정적으로 만듭니다.
    let mut group_order: Vec<String> = Vec::new();
    let mut unique: Vec<Session> = Vec::with_capacity(sessions.len());

    for session in sessions {
        let key = session_key(&session);
        if first_seen.contains_key(&key) {
            let group = duplicates.entry(key.clone()).or_default();
            if group.is_empty() {
                group_order.push(key);
            }
            group.push(session);
        } else {
            first_seen.insert(key, unique.len());
            unique.push(session);
        }
    }

    for key in &group_order {
        let Some(&canonical_index) = first_seen.get(key) else {
            continue;
        };
        let canonical_id = unique[canonical_index].id.clone();

        for duplicate in duplicates.get(key).into_iter().flatten() {
            // 대표와 ID가 같은 중복이면 옮길 것이 없습니다.
            if duplicate.id == canonical_id {
                continue;
            }
            if let Some(users) = assignments.take(&duplicate.id) {
                for user in users {
                    assignments.insert(canonical_id.clone(), user);
                }
            }
        }
    }

    let report = DedupReport {
        original_count,
        unique_count: unique.len(),
        duplicate_groups: group_order.len(),
    };

    if report.duplicate_groups > 0 {
        tracing::info!(
            "Deduplicated sessions from {} to {} ({} duplicate groups)",
            report.original_count,
            report.unique_count,
            report.duplicate_groups
        );
    }

    (unique, report)
}
