//! # 배정 & 충돌 엔진
//!
//! 세션 → 사용자 배정 맵을 관리하고 두 가지 정책을 적용합니다:
//! 1. **단일 담당자 정책**: 포스터가 아닌 세션에 이미 담당자가 있으면 추가 배정 전에 확인
//! 2. **시간 충돌 정책**: 같은 사용자가 같은 날짜·같은 시간대 세션에 이미 배정되어 있으면 확인
//!
//! ## 2단계 확인 흐름
//! 정책 위반은 에러가 아니라 **사용자가 결정할 수 있는 분기점**입니다.
//! `toggle()`은 확인이 필요하면 `ToggleOutcome::NeedsConfirmation`을 반환하고 멈춥니다.
//! 호출자(HTTP, CLI, 테스트)가 `resolve(Decision)`으로 결정을 전달하면 이어서 진행합니다.
//!
//! ```text
//! toggle ─┬─ 이미 배정됨 ──────────────────────────────▶ Removed
//!         └─ 추가 ─▶ 담당자 중복? ─▶ (확인) ─▶ 시간 충돌? ─▶ (확인) ─▶ Assigned
//!                                   └ 거절 ─▶ Declined        └ 거절 ─▶ Declined
//! ```
//!
//! 확인이 열려 있는 동안에는 다른 어떤 변경도 허용되지 않습니다
//! (`EngineError::ConfirmationPending`).
//!
//! ## 시간 충돌 판정의 한계
//! 충돌은 원본 `date`, `time` 문자열의 **완전 일치**로만 판정합니다.
//! "8:00 AM - 9:00 AM"과 "8:30 AM - 9:30 AM"은 겹치지만 문자열이 다르므로 충돌이 아닙니다.
//! 알려진 단순화이며, 구간 겹침 계산으로 바꾸지 않습니다.

use crate::models::{AssignmentMap, EntityId, NewUserRequest, Session, User, DEFAULT_ROLE};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

/// 엔진 사용 오류
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// 확인 대기 중에 다른 변경을 시도함
    #[error("A confirmation is pending; accept or decline it first")]
    ConfirmationPending,

    /// 열린 확인이 없는데 결정을 전달함
    #[error("There is no pending confirmation")]
    NothingPending,

    #[error("User not found: {0}")]
    UnknownUser(EntityId),

    #[error("Invalid user: {0}")]
    InvalidUser(String),
}

/// 사용자의 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
}

impl From<bool> for Decision {
    fn from(accept: bool) -> Self {
        if accept {
            Decision::Accept
        } else {
            Decision::Decline
        }
    }
}

/// 사용자에게 보여줄 확인 요청 내용
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Confirmation {
    /// 포스터가 아닌 세션에 이미 담당자가 있음
    DuplicateAssignee {
        session_id: EntityId,
        user_id: EntityId,
        existing_user: String,
        session_title: String,
    },
    /// 같은 날짜·시간 세션에 이미 배정되어 있음
    TimeConflict {
        session_id: EntityId,
        user_id: EntityId,
        conflicting_titles: Vec<String>,
    },
}

/// `toggle()` / `resolve()`의 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Assigned,
    Removed,
    /// 사용자가 거절하여 아무것도 바뀌지 않음
    Declined,
    NeedsConfirmation { confirmation: Confirmation },
}

impl ToggleOutcome {
    /// 배정 맵이 바뀌었는지 (저장이 필요한지)
    pub fn mutated(&self) -> bool {
        matches!(self, ToggleOutcome::Assigned | ToggleOutcome::Removed)
    }
}

/// 진행 중인 배정 제안
#[derive(Debug, Clone)]
struct PendingAssignment {
    session_id: EntityId,
    user_id: EntityId,
    confirmation: Confirmation,
}

/// 배정 엔진: 세션 목록, 사용자 목록, 배정 맵, 선택된 사용자를 소유합니다.
#[derive(Debug, Default)]
pub struct AssignmentEngine {
    sessions: Vec<Session>,
    users: Vec<User>,
    assignments: AssignmentMap,
    selected_user: Option<EntityId>,
    pending: Option<PendingAssignment>,
}

impl AssignmentEngine {
    pub fn new(sessions: Vec<Session>, users: Vec<User>, assignments: AssignmentMap) -> Self {
        Self {
            sessions,
            users,
            assignments,
            selected_user: None,
            pending: None,
        }
    }

    // ── 조회 ──

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn assignments(&self) -> &AssignmentMap {
        &self.assignments
    }

    pub fn selected_user(&self) -> Option<&User> {
        let id = self.selected_user.as_ref()?;
        self.find_user(id)
    }

    pub fn pending_confirmation(&self) -> Option<&Confirmation> {
        self.pending.as_ref().map(|p| &p.confirmation)
    }

    pub fn find_session(&self, session_id: &EntityId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == session_id)
    }

    pub fn find_user(&self, user_id: &EntityId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == user_id)
    }

    /// 화면 표시용 세션 조회. 목록에 없으면 "data not found" 자리표시자를 만듭니다.
    pub fn resolve_for_display(&self, session_id: &EntityId) -> Session {
        self.find_session(session_id)
            .cloned()
            .unwrap_or_else(|| Session::placeholder(session_id.clone()))
    }

    /// 사용자가 배정된 모든 세션 ID
    ///
    /// `EntityId`가 문자열로 정규화되어 있으므로 `42`와 `"42"`는 같은 사용자입니다.
    pub fn user_assignments(&self, user_id: &EntityId) -> Vec<EntityId> {
        self.assignments.sessions_for_user(user_id)
    }

    /// `session`과 같은 날짜·시간에 이미 배정된 다른 세션들
    ///
    /// - 자기 자신은 제외
    /// - 로드된 목록에서 찾을 수 없는 세션 ID는 건너뜀
    pub fn conflicting_sessions(&self, user_id: &EntityId, session: &Session) -> Vec<&Session> {
        self.user_assignments(user_id)
            .iter()
            .filter(|id| **id != session.id)
            .filter_map(|id| self.find_session(id))
            .filter(|existing| existing.date == session.date && existing.time == session.time)
            .collect()
    }

    // ── 변경 ──

    fn ensure_idle(&self) -> Result<(), EngineError> {
        if self.pending.is_some() {
            return Err(EngineError::ConfirmationPending);
        }
        Ok(())
    }

    /// 배정을 토글합니다.
    ///
    /// - 이미 배정되어 있으면 제거 (추가 확인 없음)
    /// - 아니면 단일 담당자 정책 → 시간 충돌 정책 순서로 검사하여
    ///   확인이 필요하면 멈추고, 없으면 바로 배정
    ///
    /// 로드된 목록에 없는 세션 ID도 그대로 받아들입니다 (불투명 키).
    pub fn toggle(
        &mut self,
        session_id: EntityId,
        user_id: EntityId,
    ) -> Result<ToggleOutcome, EngineError> {
        self.ensure_idle()?;

        if self.assignments.remove(&session_id, &user_id) {
            tracing::debug!(session_id = %session_id, user_id = %user_id, "Removed assignment");
            return Ok(ToggleOutcome::Removed);
        }

        Ok(self.check_duplicate_assignee(session_id, user_id))
    }

    /// 열린 확인에 대한 결정을 전달합니다.
    pub fn resolve(&mut self, decision: Decision) -> Result<ToggleOutcome, EngineError> {
        let pending = self.pending.take().ok_or(EngineError::NothingPending)?;

        if decision == Decision::Decline {
            tracing::info!(
                session_id = %pending.session_id,
                user_id = %pending.user_id,
                "Assignment declined"
            );
            return Ok(ToggleOutcome::Declined);
        }

        Ok(match pending.confirmation {
            Confirmation::DuplicateAssignee { .. } => {
                self.check_time_conflict(pending.session_id, pending.user_id)
            }
            Confirmation::TimeConflict { .. } => self.commit(pending.session_id, pending.user_id),
        })
    }

    /// 1단계: 단일 담당자 정책
    fn check_duplicate_assignee(&mut self, session_id: EntityId, user_id: EntityId) -> ToggleOutcome {
        let session = self.find_session(&session_id);
        let is_poster = session.is_some_and(Session::is_poster);
        let existing = self.assignments.assignees(&session_id).first();

        if let (false, Some(existing_id)) = (is_poster, existing) {
            let confirmation = Confirmation::DuplicateAssignee {
                session_id: session_id.clone(),
                user_id: user_id.clone(),
                existing_user: self
                    .find_user(existing_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                session_title: session
                    .and_then(|s| s.title.clone())
                    .unwrap_or_else(|| "Unknown Session".to_string()),
            };
            return self.suspend(session_id, user_id, confirmation);
        }

        self.check_time_conflict(session_id, user_id)
    }

    /// 2단계: 시간 충돌 정책
    ///
    /// 새 세션을 목록에서 찾을 수 없으면 날짜·시간을 알 수 없으므로 검사를 건너뜁니다.
    fn check_time_conflict(&mut self, session_id: EntityId, user_id: EntityId) -> ToggleOutcome {
        let conflicting_titles: Vec<String> = match self.find_session(&session_id) {
            Some(session) => self
                .conflicting_sessions(&user_id, session)
                .into_iter()
                .map(Session::title_label)
                .collect(),
            None => Vec::new(),
        };

        if conflicting_titles.is_empty() {
            return self.commit(session_id, user_id);
        }

        let confirmation = Confirmation::TimeConflict {
            session_id: session_id.clone(),
            user_id: user_id.clone(),
            conflicting_titles,
        };
        self.suspend(session_id, user_id, confirmation)
    }

    fn suspend(
        &mut self,
        session_id: EntityId,
        user_id: EntityId,
        confirmation: Confirmation,
    ) -> ToggleOutcome {
        tracing::debug!(session_id = %session_id, user_id = %user_id, "Assignment awaiting confirmation");
        self.pending = Some(PendingAssignment {
            session_id,
            user_id,
            confirmation: confirmation.clone(),
        });
        ToggleOutcome::NeedsConfirmation { confirmation }
    }

    fn commit(&mut self, session_id: EntityId, user_id: EntityId) -> ToggleOutcome {
        tracing::debug!(session_id = %session_id, user_id = %user_id, "Assigned user");
        self.assignments.insert(session_id, user_id);
        ToggleOutcome::Assigned
    }

    /// 무조건 제거합니다. 없으면 아무것도 하지 않습니다.
    ///
    /// # 반환값
    /// 실제로 제거되었으면 `true`
    pub fn remove(&mut self, session_id: &EntityId, user_id: &EntityId) -> Result<bool, EngineError> {
        self.ensure_idle()?;
        Ok(self.assignments.remove(session_id, user_id))
    }

    /// 선택 사용자 지정 (최대 한 명)
    pub fn select_user(&mut self, user_id: Option<EntityId>) -> Result<(), EngineError> {
        self.ensure_idle()?;
        if let Some(id) = &user_id {
            if self.find_user(id).is_none() {
                return Err(EngineError::UnknownUser(id.clone()));
            }
        }
        self.selected_user = user_id;
        Ok(())
    }

    /// 직접 추가할 사용자 레코드를 만듭니다. 엔진 상태는 바뀌지 않습니다.
    ///
    /// - 이름과 이메일은 필수
    /// - 같은 이메일(대소문자 무시)이 이미 있으면 거부
    /// - 임시 ID는 숫자 ID 중 최댓값 + 1 (원격 등록이 ID를 정하면 호출자가 바꿈)
    pub fn prepare_user(&self, req: NewUserRequest) -> Result<User, EngineError> {
        self.ensure_idle()?;

        let name = req.name.trim();
        let email = req.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(EngineError::InvalidUser("Name and email are required".to_string()));
        }
        if self.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(EngineError::InvalidUser(
                "A user with this email already exists".to_string(),
            ));
        }

        let next_id = self
            .users
            .iter()
            .filter_map(|u| u.id.as_number())
            .max()
            .unwrap_or(0)
            + 1;

        let mut words = name.split_whitespace();
        let firstname = words.next().unwrap_or_default().to_string();
        let rest: Vec<&str> = words.collect();
        let lastname = if rest.is_empty() {
            firstname.clone()
        } else {
            rest.join(" ")
        };
        let now = Utc::now().to_rfc3339();

        Ok(User {
            id: EntityId::from(next_id),
            name: name.to_string(),
            firstname,
            lastname,
            email: email.to_string(),
            department: req.department.trim().to_string(),
            role: req.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            assigned_date: Some(now.clone()),
            created_at: now,
        })
    }

    /// `prepare_user`로 만든 사용자를 목록에 넣습니다. ID가 겹치면 거부합니다.
    pub fn insert_user(&mut self, user: User) -> Result<&User, EngineError> {
        self.ensure_idle()?;
        if self.find_user(&user.id).is_some() {
            return Err(EngineError::InvalidUser(format!(
                "A user with id {} already exists",
                user.id
            )));
        }
        self.users.push(user);

        // 바로 위에서 push 했으므로 last()는 항상 Some입니다.
        self.users
            .last()
            .ok_or_else(|| EngineError::InvalidUser("User was not stored".to_string()))
    }

    /// 사용자, 배정, 선택을 모두 지웁니다. 세션 목록은 유지합니다.
    pub fn clear_all(&mut self) {
        self.users.clear();
        self.assignments.clear();
        self.selected_user = None;
        self.pending = None;
    }

    /// 새 세션 목록으로 교체합니다. (중복 제거는 호출자가 먼저 수행)
    pub fn replace_sessions(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
    }

    pub fn replace_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    /// 중복 제거처럼 배정 맵을 직접 다뤄야 하는 작업용
    pub fn assignments_mut(&mut self) -> &mut AssignmentMap {
        &mut self.assignments
    }

    /// 저장된 선택을 복원합니다. 해당 사용자가 없으면 무시합니다.
    pub fn restore_selection(&mut self, user_id: Option<EntityId>) {
        self.selected_user = user_id.filter(|id| self.find_user(id).is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(id: &str, kind: &str, date: &str, time: &str) -> Session {
        Session::from_raw(&json!({
            "session_id": id,
            "session_info": { "title": format!("Title {id}"), "type": kind },
            "schedule": { "date": date, "time": time }
        }))
    }

    fn user(id: i64, name: &str) -> User {
        let raw = json!({ "id": id, "name": name, "email": format!("{id}@example.com") });
        User::from_raw(raw.as_object().unwrap(), 0)
    }

    fn engine() -> AssignmentEngine {
        AssignmentEngine::new(
            vec![
                session("A", "Symposium", "2025-10-19", "9:00 AM - 10:00 AM"),
                session("B", "Symposium", "2025-10-19", "9:00 AM - 10:00 AM"),
                session("C", "Symposium", "2025-10-19", "11:00 AM - 12:00 PM"),
                session("D", "Symposium", "2025-10-19", "9:30 AM - 10:30 AM"),
                session("P", "Poster Session", "2025-10-19", "9:00 AM - 10:00 AM"),
            ],
            vec![user(1, "Ana Silva"), user(2, "Ben Okoro")],
            AssignmentMap::new(),
        )
    }

    #[test]
    fn toggle_twice_restores_original_state() {
        let mut engine = engine();
        let before = engine.assignments().clone();

        assert_eq!(engine.toggle("C".into(), EntityId::from(1)).unwrap(), ToggleOutcome::Assigned);
        assert_eq!(engine.toggle("C".into(), EntityId::from(1)).unwrap(), ToggleOutcome::Removed);
        assert_eq!(engine.assignments(), &before);
    }

    #[test]
    fn identical_date_and_time_is_a_conflict() {
        let mut engine = engine();
        engine.toggle("A".into(), EntityId::from(1)).unwrap();

        let outcome = engine.toggle("B".into(), EntityId::from(1)).unwrap();
        match outcome {
            ToggleOutcome::NeedsConfirmation {
                confirmation: Confirmation::TimeConflict { conflicting_titles, .. },
            } => assert_eq!(conflicting_titles, vec!["Title A".to_string()]),
            other => panic!("expected a time conflict, got {other:?}"),
        }
    }

    #[test]
    fn different_time_string_is_not_a_conflict() {
        let mut engine = engine();
        engine.toggle("A".into(), EntityId::from(1)).unwrap();
        assert_eq!(engine.toggle("C".into(), EntityId::from(1)).unwrap(), ToggleOutcome::Assigned);
    }

    #[test]
    fn overlapping_ranges_with_different_strings_are_not_conflicts() {
        let mut engine = engine();
        engine.toggle("A".into(), EntityId::from(1)).unwrap();
        assert_eq!(engine.toggle("D".into(), EntityId::from(1)).unwrap(), ToggleOutcome::Assigned);
    }

    #[test]
    fn declining_a_conflict_leaves_state_unchanged() {
        let mut engine = engine();
        engine.toggle("A".into(), EntityId::from(1)).unwrap();
        let before = engine.assignments().clone();

        engine.toggle("B".into(), EntityId::from(1)).unwrap();
        assert_eq!(engine.resolve(Decision::Decline).unwrap(), ToggleOutcome::Declined);
        assert_eq!(engine.assignments(), &before);
        assert!(engine.pending_confirmation().is_none());
    }

    #[test]
    fn accepting_a_conflict_assigns() {
        let mut engine = engine();
        engine.toggle("A".into(), EntityId::from(1)).unwrap();
        engine.toggle("B".into(), EntityId::from(1)).unwrap();
        assert_eq!(engine.resolve(Decision::Accept).unwrap(), ToggleOutcome::Assigned);
        assert!(engine.assignments().contains(&"B".into(), &EntityId::from(1)));
    }

    #[test]
    fn second_assignee_needs_confirmation() {
        let mut engine = engine();
        engine.toggle("C".into(), EntityId::from(1)).unwrap();

        let outcome = engine.toggle("C".into(), EntityId::from(2)).unwrap();
        assert_eq!(
            outcome,
            ToggleOutcome::NeedsConfirmation {
                confirmation: Confirmation::DuplicateAssignee {
                    session_id: "C".into(),
                    user_id: EntityId::from(2),
                    existing_user: "Ana Silva".to_string(),
                    session_title: "Title C".to_string(),
                }
            }
        );

        engine.resolve(Decision::Decline).unwrap();
        assert_eq!(engine.assignments().assignees(&"C".into()), &[EntityId::from(1)]);
    }

    #[test]
    fn accepted_duplicate_still_checks_time_conflicts() {
        let mut engine = engine();
        engine.toggle("A".into(), EntityId::from(2)).unwrap();
        engine.toggle("B".into(), EntityId::from(1)).unwrap();

        // B에는 이미 1번이 있고, 2번은 같은 시간의 A에 배정되어 있습니다.
        let first = engine.toggle("B".into(), EntityId::from(2)).unwrap();
        assert!(matches!(
            first,
            ToggleOutcome::NeedsConfirmation { confirmation: Confirmation::DuplicateAssignee { .. } }
        ));
        let second = engine.resolve(Decision::Accept).unwrap();
        assert!(matches!(
            second,
            ToggleOutcome::NeedsConfirmation { confirmation: Confirmation::TimeConflict { .. } }
        ));
        assert_eq!(engine.resolve(Decision::Accept).unwrap(), ToggleOutcome::Assigned);
        assert_eq!(engine.assignments().assignees(&"B".into()).len(), 2);
    }

    #[test]
    fn poster_sessions_allow_multiple_assignees() {
        let mut engine = engine();
        engine.toggle("P".into(), EntityId::from(1)).unwrap();
        assert_eq!(engine.toggle("P".into(), EntityId::from(2)).unwrap(), ToggleOutcome::Assigned);
    }

    #[test]
    fn unknown_sessions_are_opaque_keys() {
        let mut engine = engine();
        assert_eq!(engine.toggle("ghost".into(), EntityId::from(1)).unwrap(), ToggleOutcome::Assigned);
        // 목록에 없는 세션은 유형을 알 수 없으므로 포스터가 아닌 것으로 취급합니다.
        assert!(matches!(
            engine.toggle("ghost".into(), EntityId::from(2)).unwrap(),
            ToggleOutcome::NeedsConfirmation { .. }
        ));
    }

    #[test]
    fn pending_confirmation_blocks_other_mutations() {
        let mut engine = engine();
        engine.toggle("C".into(), EntityId::from(1)).unwrap();
        engine.toggle("C".into(), EntityId::from(2)).unwrap();

        assert_eq!(engine.toggle("A".into(), EntityId::from(1)), Err(EngineError::ConfirmationPending));
        assert_eq!(engine.remove(&"C".into(), &EntityId::from(1)), Err(EngineError::ConfirmationPending));
        engine.resolve(Decision::Decline).unwrap();
        assert_eq!(engine.resolve(Decision::Accept), Err(EngineError::NothingPending));
    }

    #[test]
    fn user_assignments_match_numeric_and_string_ids() {
        let assignments: AssignmentMap =
            serde_json::from_value(json!({ "A": [42], "C": ["42"], "P": ["7"] })).unwrap();
        let engine = AssignmentEngine::new(Vec::new(), Vec::new(), assignments);

        let found = engine.user_assignments(&EntityId::from(42));
        assert_eq!(found, vec![EntityId::from("A"), EntityId::from("C")]);
        assert_eq!(engine.user_assignments(&EntityId::from("42")), found);
    }

    #[test]
    fn remove_drops_empty_entries_and_is_a_noop_when_absent() {
        let mut engine = engine();
        engine.toggle("C".into(), EntityId::from(1)).unwrap();
        assert!(engine.remove(&"C".into(), &EntityId::from(1)).unwrap());
        assert!(engine.assignments().is_empty());
        assert!(!engine.remove(&"C".into(), &EntityId::from(1)).unwrap());
    }

    #[test]
    fn add_user_assigns_next_numeric_id_and_splits_name() {
        let mut engine = engine();
        let prepared = engine
            .prepare_user(NewUserRequest {
                name: "Chiara Rossi Bianchi".to_string(),
                email: "chiara@example.com".to_string(),
                department: String::new(),
                role: None,
            })
            .unwrap();
        assert_eq!(engine.users().len(), 2);

        let added = engine.insert_user(prepared.clone()).unwrap();
        assert_eq!(added.id, EntityId::from(3));
        assert_eq!(added.firstname, "Chiara");
        assert_eq!(added.lastname, "Rossi Bianchi");
        assert!(matches!(
            engine.insert_user(prepared),
            Err(EngineError::InvalidUser(_))
        ));

        let duplicate = engine.prepare_user(NewUserRequest {
            name: "Other".to_string(),
            email: "CHIARA@example.com".to_string(),
            department: String::new(),
            role: None,
        });
        assert!(matches!(duplicate, Err(EngineError::InvalidUser(_))));
    }

    #[test]
    fn select_rejects_unknown_users() {
        let mut engine = engine();
        assert_eq!(
            engine.select_user(Some("99".into())),
            Err(EngineError::UnknownUser("99".into()))
        );
        engine.select_user(Some(EntityId::from(2))).unwrap();
        assert_eq!(engine.selected_user().map(|u| u.name.as_str()), Some("Ben Okoro"));
    }

    #[test]
    fn missing_sessions_resolve_to_placeholders() {
        let engine = engine();
        let placeholder = engine.resolve_for_display(&"gone".into());
        assert!(placeholder.missing);
        assert_eq!(placeholder.title_label(), "Session gone");
    }
}
