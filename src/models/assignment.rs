//! # 배정 맵(Assignment Map) 모델
//!
//! 세션 ID → 배정된 사용자 ID 목록의 매핑입니다.
//!
//! ## 불변 조건
//! - 한 세션의 사용자 목록은 삽입 순서를 유지하고 중복이 없습니다.
//! - 마지막 사용자가 제거되면 세션 항목 자체가 삭제됩니다 (빈 배열이 남지 않음).
//!
//! JSON 형태는 원격 API와 같습니다: `{ "101": ["3", "7"], "P-752": ["3"] }`

use crate::models::EntityId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssignmentMap(BTreeMap<EntityId, Vec<EntityId>>);

// 외부에서 들어온 맵도 불변 조건을 지키도록 overlay를 거쳐 정규화합니다.
// (중복 사용자 제거, 빈 배열 항목 제거)
impl<'de> Deserialize<'de> for AssignmentMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<EntityId, Vec<EntityId>>::deserialize(deserializer)?;
        let mut map = AssignmentMap::new();
        map.overlay(AssignmentMap(raw));
        Ok(map)
    }
}

impl AssignmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션에 배정된 사용자 목록 (없으면 빈 슬라이스)
    pub fn assignees(&self, session_id: &EntityId) -> &[EntityId] {
        self.0.get(session_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, session_id: &EntityId, user_id: &EntityId) -> bool {
        self.assignees(session_id).contains(user_id)
    }

    /// 사용자를 세션 목록 끝에 추가합니다. 이미 있으면 아무것도 하지 않고 `false`.
    pub fn insert(&mut self, session_id: EntityId, user_id: EntityId) -> bool {
        let users = self.0.entry(session_id).or_default();
        if users.contains(&user_id) {
            return false;
        }
        users.push(user_id);
        true
    }

    /// 사용자를 세션에서 제거합니다. 목록이 비면 항목도 삭제합니다.
    /// 제거된 것이 있으면 `true`.
    pub fn remove(&mut self, session_id: &EntityId, user_id: &EntityId) -> bool {
        let Some(users) = self.0.get_mut(session_id) else {
            return false;
        };
        let before = users.len();
        users.retain(|id| id != user_id);
        let removed = users.len() != before;
        if users.is_empty() {
            self.0.remove(session_id);
        }
        removed
    }

    /// 세션 항목 전체를 꺼냅니다. (중복 세션 병합에 사용)
    pub fn take(&mut self, session_id: &EntityId) -> Option<Vec<EntityId>> {
        self.0.remove(session_id)
    }

    /// 사용자가 배정된 모든 세션 ID (세션 ID 순)
    pub fn sessions_for_user(&self, user_id: &EntityId) -> Vec<EntityId> {
        self.0
            .iter()
            .filter(|(_, users)| users.contains(user_id))
            .map(|(session_id, _)| session_id.clone())
            .collect()
    }

    /// 다른 맵의 항목으로 덮어씁니다. 같은 세션 키는 `other`가 이깁니다.
    pub fn overlay(&mut self, other: AssignmentMap) {
        for (session_id, users) in other.0 {
            let mut deduped = Vec::with_capacity(users.len());
            for user in users {
                if !deduped.contains(&user) {
                    deduped.push(user);
                }
            }
            if deduped.is_empty() {
                continue;
            }
            self.0.insert(session_id, deduped);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Vec<EntityId>)> {
        self.0.iter()
    }

    /// (세션 ID, 사용자 ID) 쌍으로 펼칩니다. (원격 저장 형식)
    pub fn pairs(&self) -> impl Iterator<Item = (&EntityId, &EntityId)> {
        self.0
            .iter()
            .flat_map(|(session_id, users)| users.iter().map(move |user| (session_id, user)))
    }

    /// 배정 건수의 합
    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn session_count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(EntityId, EntityId)> for AssignmentMap {
    fn from_iter<T: IntoIterator<Item = (EntityId, EntityId)>>(iter: T) -> Self {
        let mut map = AssignmentMap::new();
        for (session_id, user_id) in iter {
            map.insert(session_id, user_id);
        }
        map
    }
}

/// 원격 저장 형식의 배정 한 건
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPair {
    pub session_id: EntityId,
    pub user_id: EntityId,
}

/// `POST /api/conferences/{id}/assignments`의 `assignments` 필드
///
/// 맵 형태(`{ "101": ["3"] }`)와 쌍 목록 형태(`[{ "session_id": .., "user_id": .. }]`)를
/// 모두 받습니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AssignmentsBody {
    Pairs(Vec<AssignmentPair>),
    Map(AssignmentMap),
}

impl AssignmentsBody {
    /// 제출된 순서대로 쌍 목록으로 펼칩니다.
    pub fn into_pairs(self) -> Vec<AssignmentPair> {
        match self {
            AssignmentsBody::Pairs(pairs) => pairs,
            AssignmentsBody::Map(map) => map
                .pairs()
                .map(|(session_id, user_id)| AssignmentPair {
                    session_id: session_id.clone(),
                    user_id: user_id.clone(),
                })
                .collect(),
        }
    }
}

/// 배정 저장 요청 본문
#[derive(Debug, Deserialize)]
pub struct SaveAssignmentsRequest {
    pub assignments: Option<AssignmentsBody>,
}
