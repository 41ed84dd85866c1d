//! # 배정 도구 컨트롤러
//!
//! 학회 하나의 배정 작업 상태를 소유하는 `AttendanceTool`과,
//! 학회 ID별 인스턴스를 보관하는 `ToolRegistry`를 정의합니다.
//!
//! ## 로드 순서
//! 1. 사용자: 원격 → (실패 시) 로컬 스냅샷의 사용자 → 빈 목록
//! 2. 배정: 로컬 스냅샷 위에 원격 배정을 덮어씀 (같은 세션 키는 원격이 이김)
//! 3. 선택 사용자: 스냅샷에서 복원 (해당 사용자가 있을 때만)
//! 4. 세션: 원격 → 성공하면 로컬에 시각과 함께 캐시 / 실패하면 캐시 사용 → 중복 제거
//!
//! 이 경로의 모든 실패는 에러가 아니라 경고 알림(`Notice`)이 됩니다.
//!
//! ## 저장
//! 배정이 바뀔 때마다 로컬 스냅샷을 먼저 쓰고 원격에 전체 맵을 저장합니다.
//! 원격 저장 실패는 경고 알림으로만 남습니다.

use crate::error::AppError;
use crate::models::{AssignmentMap, EntityId, NewUserRequest, Session, User};
use crate::services::bookmarks::BookmarkSet;
use crate::services::dedup::deduplicate;
use crate::services::engine::{AssignmentEngine, Confirmation, Decision, ToggleOutcome};
use crate::services::local_store::{
    LocalStore, SESSIONS_KEY, SESSIONS_TIMESTAMP_KEY, SNAPSHOT_KEY,
};
use crate::services::remote::ConferenceApi;
use crate::services::schedule::{compare_dates, compare_times, FilteredSessions, SessionFilter};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// 사용자에게 보여줄 일시적인 알림
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// 로컬 스냅샷 (읽기용). 사용자는 원본 형태로 읽어 다시 정규화합니다.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    #[serde(default)]
    assignments: AssignmentMap,
    #[serde(default)]
    users: Vec<Value>,
    selected_user_id: Option<EntityId>,
    #[serde(default)]
    unsynced_user_ids: Vec<EntityId>,
}

/// 로컬 스냅샷 (쓰기용)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    assignments: &'a AssignmentMap,
    users: &'a [User],
    selected_user_id: Option<&'a EntityId>,
    unsynced_user_ids: &'a [EntityId],
    conference_id: &'a str,
    export_date: String,
}

/// 사용자 + 배정 건수 (목록 표시용)
#[derive(Debug, Serialize)]
pub struct UserSummary<'a> {
    #[serde(flatten)]
    pub user: &'a User,
    pub assignment_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ToolStats {
    pub sessions: usize,
    pub users: usize,
    pub assignments: usize,
    pub assigned_sessions: usize,
}

/// `GET /tool/state` 응답
#[derive(Debug, Serialize)]
pub struct ToolState<'a> {
    pub conference_id: &'a str,
    pub sessions: &'a [Session],
    pub users: Vec<UserSummary<'a>>,
    pub assignments: &'a AssignmentMap,
    pub selected_user: Option<&'a User>,
    pub pending_confirmation: Option<&'a Confirmation>,
    pub sessions_cached_at: Option<String>,
    pub stats: ToolStats,
    pub notices: Vec<Notice>,
}

fn normalize_users(raw: &[Value]) -> Vec<User> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, value)| match value {
            Value::Object(map) => Some(User::from_raw(map, index)),
            _ => None,
        })
        .collect()
}

/// 원격 등록에 실패했던 사용자를 원격 목록 뒤에 붙입니다.
///
/// 원격 목록에 같은 ID나 같은 이메일이 있으면 붙이지 않습니다.
/// 여전히 로컬에만 있는 사용자의 ID를 반환합니다.
fn merge_unsynced(users: &mut Vec<User>, saved: Vec<User>, unsynced: &[EntityId]) -> Vec<EntityId> {
    let mut still_local = Vec::new();
    for user in saved.into_iter().filter(|u| unsynced.contains(&u.id)) {
        let known = users
            .iter()
            .any(|u| u.id == user.id || u.email.eq_ignore_ascii_case(&user.email));
        if !known {
            still_local.push(user.id.clone());
            users.push(user);
        }
    }
    still_local
}

pub struct AttendanceTool {
    conference_id: String,
    engine: AssignmentEngine,
    store: LocalStore,
    api: Arc<dyn ConferenceApi>,
    bookmarks: BookmarkSet,
    /// 원격 등록에 실패해 로컬 스냅샷에만 있는 사용자
    unsynced_users: Vec<EntityId>,
    notices: Vec<Notice>,
}

impl AttendanceTool {
    /// 로컬 저장소를 열고 원격 데이터를 읽어 도구를 준비합니다.
    ///
    /// 로컬 저장소 파일을 열 수 없는 경우에만 실패합니다.
    pub async fn load(
        conference_id: &str,
        api: Arc<dyn ConferenceApi>,
        store_dir: impl Into<PathBuf>,
    ) -> Result<Self, AppError> {
        let store = LocalStore::open(store_dir.into(), conference_id).await?;
        let bookmarks = BookmarkSet::load(&store);
        let mut tool = Self {
            conference_id: conference_id.to_string(),
            engine: AssignmentEngine::default(),
            store,
            api,
            bookmarks,
            unsynced_users: Vec::new(),
            notices: Vec::new(),
        };
        tool.reload().await;
        Ok(tool)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    /// 쌓인 알림을 꺼냅니다. 꺼낸 알림은 다시 나오지 않습니다.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn conference_id(&self) -> &str {
        &self.conference_id
    }

    pub fn engine(&self) -> &AssignmentEngine {
        &self.engine
    }

    /// 모든 데이터를 다시 읽습니다. 확인 대기 상태는 버려집니다.
    pub async fn reload(&mut self) {
        let conference_id = self.conference_id.clone();
        let snapshot: Snapshot = self.store.get(SNAPSHOT_KEY).unwrap_or_default();

        let fetched_users = self.api.fetch_users(&conference_id).await;
        let users = match fetched_users {
            Ok(raw) => {
                let mut users = normalize_users(&raw);
                tracing::info!(conference_id = %conference_id, count = users.len(), "Loaded users");
                self.unsynced_users = merge_unsynced(
                    &mut users,
                    normalize_users(&snapshot.users),
                    &snapshot.unsynced_user_ids,
                );
                if !self.unsynced_users.is_empty() {
                    tracing::info!(
                        conference_id = %conference_id,
                        count = self.unsynced_users.len(),
                        "Kept locally added users"
                    );
                }
                users
            }
            Err(e) => {
                tracing::warn!(conference_id = %conference_id, "Failed to load users: {}", e);
                self.notify(
                    NoticeLevel::Warning,
                    "Could not load users from the database; using saved users",
                );
                self.unsynced_users = snapshot.unsynced_user_ids;
                normalize_users(&snapshot.users)
            }
        };

        let mut assignments = snapshot.assignments;
        let fetched_assignments = self.api.fetch_assignments(&conference_id).await;
        match fetched_assignments {
            Ok(remote) => assignments.overlay(remote),
            Err(e) => {
                tracing::warn!(conference_id = %conference_id, "Failed to load assignments: {}", e);
                self.notify(
                    NoticeLevel::Warning,
                    "Could not load assignments from the database; using saved assignments",
                );
            }
        }

        let raw_sessions = self.fetch_sessions().await;
        let sessions: Vec<Session> = raw_sessions.iter().map(Session::from_raw).collect();
        let (sessions, _) = deduplicate(sessions, &mut assignments);

        self.engine = AssignmentEngine::new(sessions, users, assignments);
        self.engine.restore_selection(snapshot.selected_user_id);
    }

    /// 원격 세션 목록을 읽고 캐시합니다. 실패하면 캐시를 사용합니다.
    async fn fetch_sessions(&mut self) -> Vec<Value> {
        let fetched = self.api.fetch_sessions().await;
        match fetched {
            Ok(raw) => {
                if let Err(e) = self.cache_sessions(&raw).await {
                    tracing::warn!("Failed to cache sessions locally: {}", e);
                }
                raw
            }
            Err(e) => {
                tracing::warn!("Failed to load sessions: {}", e);
                match self.store.get::<Vec<Value>>(SESSIONS_KEY) {
                    Some(cached) => {
                        self.notify(NoticeLevel::Warning, "Using cached session data");
                        cached
                    }
                    None => {
                        self.notify(
                            NoticeLevel::Error,
                            "Session data is unavailable; upload a session file",
                        );
                        Vec::new()
                    }
                }
            }
        }
    }

    async fn cache_sessions(&mut self, raw: &[Value]) -> Result<(), AppError> {
        self.store.set(SESSIONS_KEY, &raw)?;
        self.store.set(SESSIONS_TIMESTAMP_KEY, &Utc::now().to_rfc3339())?;
        self.store.flush().await
    }

    /// 로컬 스냅샷을 씁니다. 실패하면 에러 알림을 남깁니다.
    async fn persist_local(&mut self) {
        let snapshot = SnapshotRef {
            assignments: self.engine.assignments(),
            users: self.engine.users(),
            selected_user_id: self.engine.selected_user().map(|u| &u.id),
            unsynced_user_ids: &self.unsynced_users,
            conference_id: &self.conference_id,
            export_date: Utc::now().to_rfc3339(),
        };
        let result = match self.store.set(SNAPSHOT_KEY, &snapshot) {
            Ok(()) => self.store.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(conference_id = %self.conference_id, "Failed to save local snapshot: {}", e);
            self.notify(NoticeLevel::Error, format!("Could not save locally: {e}"));
        }
    }

    /// 로컬 스냅샷을 쓰고 원격에 전체 배정 맵을 저장합니다.
    async fn persist(&mut self) {
        self.persist_local().await;

        let saved = self
            .api
            .save_assignments(&self.conference_id, self.engine.assignments())
            .await;
        match saved {
            Ok(count) => {
                tracing::debug!(conference_id = %self.conference_id, count, "Saved assignments");
            }
            Err(e) => {
                tracing::warn!(conference_id = %self.conference_id, "Failed to save assignments: {}", e);
                self.notify(
                    NoticeLevel::Warning,
                    "Database save failed; assignments are saved locally",
                );
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), AppError> {
        if self.engine.pending_confirmation().is_some() {
            return Err(AppError::Conflict(
                "A confirmation is pending; accept or decline it first".to_string(),
            ));
        }
        Ok(())
    }

    // ── 배정 ──

    /// 배정을 토글합니다. `user_id`가 없으면 선택된 사용자를 사용합니다.
    pub async fn toggle(
        &mut self,
        session_id: EntityId,
        user_id: Option<EntityId>,
    ) -> Result<ToggleOutcome, AppError> {
        let user_id = match user_id {
            Some(id) => id,
            None => self
                .engine
                .selected_user()
                .map(|u| u.id.clone())
                .ok_or_else(|| AppError::BadRequest("Select a user first".to_string()))?,
        };

        let assigned = self.engine.assignments().contains(&session_id, &user_id);
        if !assigned && self.engine.find_user(&user_id).is_none() {
            return Err(AppError::NotFound(format!("User not found: {user_id}")));
        }

        let outcome = self.engine.toggle(session_id, user_id)?;
        if outcome.mutated() {
            self.persist().await;
        }
        Ok(outcome)
    }

    /// 열린 확인에 대한 결정을 전달합니다.
    pub async fn confirm(&mut self, accept: bool) -> Result<ToggleOutcome, AppError> {
        let outcome = self.engine.resolve(Decision::from(accept))?;
        if outcome.mutated() {
            self.persist().await;
        }
        Ok(outcome)
    }

    pub async fn remove(
        &mut self,
        session_id: &EntityId,
        user_id: &EntityId,
    ) -> Result<bool, AppError> {
        let removed = self.engine.remove(session_id, user_id)?;
        if removed {
            self.persist().await;
        }
        Ok(removed)
    }

    /// 사용자가 배정된 세션들 (없는 세션은 자리표시자, 날짜·시간순)
    pub fn user_sessions(&self, user_id: &EntityId) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .engine
            .user_assignments(user_id)
            .iter()
            .map(|id| self.engine.resolve_for_display(id))
            .collect();
        sessions.sort_by(|a, b| {
            compare_dates(a.date.as_deref(), b.date.as_deref())
                .then_with(|| compare_times(a.time.as_deref(), b.time.as_deref()))
        });
        sessions
    }

    // ── 사용자 ──

    pub async fn select_user(&mut self, user_id: Option<EntityId>) -> Result<(), AppError> {
        self.engine.select_user(user_id)?;
        self.persist_local().await;
        Ok(())
    }

    /// 사용자를 추가하고 원격에 등록합니다.
    ///
    /// 원격이 돌려준 ID를 사용합니다. 원격 등록에 실패하면 임시 ID로 로컬에만 두고,
    /// 다음 로드에서도 원격 목록 뒤에 붙여 유지합니다.
    pub async fn add_user(&mut self, req: NewUserRequest) -> Result<User, AppError> {
        let mut user = self.engine.prepare_user(req)?;

        let created = self.api.create_user(&self.conference_id, &user).await;
        match created {
            Ok(Value::Object(raw)) => match User::raw_id(&raw) {
                Some(id) if self.engine.find_user(&id).is_none() => user.id = id,
                Some(id) => {
                    tracing::warn!(conference_id = %self.conference_id, %id, "Registered user id is already taken locally");
                }
                None => {
                    tracing::warn!(conference_id = %self.conference_id, "Registered user has no id");
                }
            },
            Ok(_) => {
                tracing::warn!(conference_id = %self.conference_id, "Unexpected user registration response");
            }
            Err(e) => {
                tracing::warn!(conference_id = %self.conference_id, "Failed to register user: {}", e);
                self.notify(
                    NoticeLevel::Warning,
                    "Could not save the user to the database; the user is saved locally",
                );
                self.unsynced_users.push(user.id.clone());
            }
        }

        let user = self.engine.insert_user(user)?.clone();
        self.notify(NoticeLevel::Info, format!("Added {}", user.name));
        self.persist().await;
        Ok(user)
    }

    /// 사용자, 배정, 선택, 로컬 스냅샷을 모두 지우고 사용자 목록을 원격에서 다시 읽습니다.
    ///
    /// 원격 배정은 건드리지 않습니다.
    pub async fn clear_all(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.engine.clear_all();
        self.unsynced_users.clear();
        self.store.remove(SNAPSHOT_KEY);
        self.store.flush().await?;

        let fetched = self.api.fetch_users(&self.conference_id).await;
        match fetched {
            Ok(raw) => self.engine.replace_users(normalize_users(&raw)),
            Err(e) => {
                tracing::warn!(conference_id = %self.conference_id, "Failed to reload users: {}", e);
                self.notify(NoticeLevel::Warning, "Could not reload users from the database");
            }
        }
        self.notify(NoticeLevel::Info, "All data cleared");
        Ok(())
    }

    // ── 세션 ──

    /// 업로드된 세션 파일로 세션 목록을 교체합니다.
    ///
    /// 본문이 JSON 배열이 아니면 아무것도 바꾸지 않고 `AppError::Json`을 반환합니다.
    pub async fn upload_sessions(&mut self, body: &str) -> Result<usize, AppError> {
        self.ensure_idle()?;
        let raw: Vec<Value> = serde_json::from_str(body)?;

        let before = self.engine.assignments().clone();
        let sessions: Vec<Session> = raw.iter().map(Session::from_raw).collect();
        let (sessions, _) = deduplicate(sessions, self.engine.assignments_mut());
        let count = sessions.len();
        self.engine.replace_sessions(sessions);

        if *self.engine.assignments() != before {
            self.persist().await;
        }
        tracing::info!(conference_id = %self.conference_id, count, "Loaded sessions from upload");
        self.notify(NoticeLevel::Info, format!("Successfully loaded {count} sessions"));
        Ok(count)
    }

    pub fn filter_sessions<'a>(&'a self, filter: &SessionFilter) -> FilteredSessions<'a> {
        filter.apply(self.engine.sessions())
    }

    // ── 북마크 ──

    pub fn bookmarks(&self) -> &BookmarkSet {
        &self.bookmarks
    }

    pub async fn toggle_bookmark(&mut self, session_id: EntityId) -> Result<bool, AppError> {
        let bookmarked = self.bookmarks.toggle(session_id);
        self.bookmarks.save(&mut self.store).await?;
        Ok(bookmarked)
    }

    // ── 조회 ──

    /// 현재 상태. 쌓인 알림은 `notices`로 전달됩니다.
    pub fn state(&self, notices: Vec<Notice>) -> ToolState<'_> {
        let assignments = self.engine.assignments();
        ToolState {
            conference_id: &self.conference_id,
            sessions: self.engine.sessions(),
            users: self
                .engine
                .users()
                .iter()
                .map(|user| UserSummary {
                    user,
                    assignment_count: assignments.sessions_for_user(&user.id).len(),
                })
                .collect(),
            assignments,
            selected_user: self.engine.selected_user(),
            pending_confirmation: self.engine.pending_confirmation(),
            sessions_cached_at: self.store.get(SESSIONS_TIMESTAMP_KEY),
            stats: ToolStats {
                sessions: self.engine.sessions().len(),
                users: self.engine.users().len(),
                assignments: assignments.total(),
                assigned_sessions: assignments.session_count(),
            },
            notices,
        }
    }
}

/// 학회 하나의 자리. 처음 요청한 쪽이 로드하고, 나머지는 로드가 끝나기를 기다립니다.
type ToolSlot = Arc<OnceCell<Arc<Mutex<AttendanceTool>>>>;

/// 학회 ID별 `AttendanceTool` 보관소
///
/// 인스턴스는 처음 요청될 때 로드됩니다. 각 인스턴스는 자신의 Mutex를 가지며,
/// 핸들러는 잠금을 잡은 채로 작업을 끝까지 실행합니다.
/// 보관소 전체 잠금은 자리를 찾거나 만드는 동안만 잡으므로,
/// 한 학회를 로드하는 동안에도 다른 학회 요청은 기다리지 않습니다.
#[derive(Clone)]
pub struct ToolRegistry {
    api: Arc<dyn ConferenceApi>,
    store_dir: PathBuf,
    tools: Arc<Mutex<HashMap<String, ToolSlot>>>,
}

impl ToolRegistry {
    pub fn new(api: Arc<dyn ConferenceApi>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            store_dir: store_dir.into(),
            tools: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 로드에 실패하면 자리는 비어 있는 채로 남고, 다음 요청이 다시 로드합니다.
    pub async fn get(&self, conference_id: &str) -> Result<Arc<Mutex<AttendanceTool>>, AppError> {
        let slot = {
            let mut tools = self.tools.lock().await;
            tools.entry(conference_id.to_string()).or_default().clone()
        };

        let tool = slot
            .get_or_try_init(|| async {
                tracing::info!(conference_id, "Loading attendance tool");
                let tool =
                    AttendanceTool::load(conference_id, self.api.clone(), &self.store_dir).await?;
                Ok::<_, AppError>(Arc::new(Mutex::new(tool)))
            })
            .await?;
        Ok(tool.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::remote::{ApiError, LocalApi};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// 응답을 미리 정해 둔 데이터 소스. `None`이면 해당 호출이 실패합니다.
    #[derive(Default)]
    pub(crate) struct MockApi {
        pub sessions: StdMutex<Option<Vec<Value>>>,
        pub users: StdMutex<Option<Vec<Value>>>,
        pub assignments: StdMutex<Option<AssignmentMap>>,
        pub fail_save: bool,
        pub fail_create: bool,
        pub saved: StdMutex<Vec<AssignmentMap>>,
        /// `fetch_sessions` 응답 지연
        pub delay: Option<std::time::Duration>,
    }

    impl MockApi {
        pub(crate) fn healthy(sessions: Vec<Value>, users: Vec<Value>) -> Self {
            Self {
                sessions: StdMutex::new(Some(sessions)),
                users: StdMutex::new(Some(users)),
                assignments: StdMutex::new(Some(AssignmentMap::new())),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ConferenceApi for MockApi {
        async fn fetch_sessions(&self) -> Result<Vec<Value>, ApiError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sessions.lock().unwrap().clone().ok_or(ApiError::Status(503))
        }

        async fn fetch_users(&self, _: &str) -> Result<Vec<Value>, ApiError> {
            self.users.lock().unwrap().clone().ok_or(ApiError::Status(503))
        }

        async fn fetch_assignments(&self, _: &str) -> Result<AssignmentMap, ApiError> {
            self.assignments.lock().unwrap().clone().ok_or(ApiError::Status(503))
        }

        /// 등록된 사용자는 `100 + 기존 사용자 수`의 ID를 받습니다.
        async fn create_user(&self, _: &str, user: &User) -> Result<Value, ApiError> {
            if self.fail_create {
                return Err(ApiError::Status(500));
            }
            let mut users = self.users.lock().unwrap();
            let users = users.get_or_insert_with(Vec::new);
            let raw = json!({
                "user_id": 100 + users.len(),
                "firstname": user.firstname,
                "lastname": user.lastname,
                "email": user.email,
            });
            users.push(raw.clone());
            Ok(raw)
        }

        async fn save_assignments(
            &self,
            _: &str,
            assignments: &AssignmentMap,
        ) -> Result<usize, ApiError> {
            if self.fail_save {
                return Err(ApiError::Status(500));
            }
            self.saved.lock().unwrap().push(assignments.clone());
            Ok(assignments.total())
        }
    }

    pub(crate) fn raw_user(id: i64, first: &str, last: &str) -> Value {
        json!({
            "user_id": id,
            "firstname": first,
            "lastname": last,
            "email": format!("{}@example.org", first.to_lowercase()),
        })
    }

    pub(crate) fn sample_sessions() -> Vec<Value> {
        vec![
            json!({ "session_id": "s1", "title": "Sepsis", "date": "2025-10-19", "time": "9:00 AM", "type": "Symposium" }),
            json!({ "session_id": "s2", "title": "Sepsis", "date": "2025-10-19", "time": "9:00 AM", "type": "Symposium" }),
            json!({ "session_id": "s3", "title": "Vaccines", "date": "2025-10-19", "time": "9:00 AM", "type": "Symposium" }),
            json!({ "session_id": "p1", "title": "Posters", "date": "2025-10-20", "time": "1:00 PM", "type": "Poster" }),
        ]
    }

    fn users() -> Vec<Value> {
        vec![raw_user(1, "Ada", "Byron"), raw_user(2, "Zoe", "Young")]
    }

    async fn tool_with(api: MockApi, dir: &TempDir) -> (AttendanceTool, Arc<MockApi>) {
        let api = Arc::new(api);
        let tool = AttendanceTool::load("1", api.clone(), dir.path()).await.unwrap();
        (tool, api)
    }

    #[tokio::test]
    async fn load_deduplicates_and_merges_remote_assignments() {
        let dir = TempDir::new().unwrap();
        let api = MockApi::healthy(sample_sessions(), users());
        *api.assignments.lock().unwrap() =
            Some(serde_json::from_value(json!({ "s2": [2] })).unwrap());

        let (tool, _) = tool_with(api, &dir).await;

        assert_eq!(tool.engine().sessions().len(), 3);
        assert_eq!(tool.engine().assignments().assignees(&"s1".into()), &[EntityId::from(2)]);
        assert!(tool.engine().assignments().assignees(&"s2".into()).is_empty());
    }

    #[tokio::test]
    async fn every_mutation_writes_local_then_remote() {
        let dir = TempDir::new().unwrap();
        let (mut tool, api) = tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;

        tool.select_user(Some(EntityId::from(1))).await.unwrap();
        let outcome = tool.toggle("s3".into(), None).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Assigned);
        assert_eq!(api.saved.lock().unwrap().len(), 1);

        let store = LocalStore::open(dir.path(), "1").await.unwrap();
        let snapshot: Value = store.get(SNAPSHOT_KEY).unwrap();
        assert_eq!(snapshot["assignments"]["s3"], json!(["1"]));
        assert_eq!(snapshot["selectedUserId"], json!("1"));
        assert_eq!(snapshot["conferenceId"], json!("1"));
    }

    #[tokio::test]
    async fn remote_save_failure_becomes_a_warning() {
        let dir = TempDir::new().unwrap();
        let api = MockApi {
            fail_save: true,
            ..MockApi::healthy(sample_sessions(), users())
        };
        let (mut tool, _) = tool_with(api, &dir).await;
        tool.take_notices();

        tool.toggle("s3".into(), Some(EntityId::from(1))).await.unwrap();
        let notices = tool.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert!(tool.take_notices().is_empty());
    }

    #[tokio::test]
    async fn offline_load_falls_back_to_local_data() {
        let dir = TempDir::new().unwrap();
        {
            let (mut tool, _) =
                tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;
            tool.toggle("s3".into(), Some(EntityId::from(2))).await.unwrap();
            tool.select_user(Some(EntityId::from(2))).await.unwrap();
        }

        let (tool, _) = tool_with(MockApi::default(), &dir).await;
        assert_eq!(tool.engine().users().len(), 2);
        assert_eq!(tool.engine().sessions().len(), 3);
        assert!(tool.engine().assignments().contains(&"s3".into(), &EntityId::from(2)));
        assert_eq!(tool.engine().selected_user().map(|u| u.id.as_str()), Some("2"));

        let state = tool.state(Vec::new());
        assert!(state.sessions_cached_at.is_some());
    }

    #[tokio::test]
    async fn remote_assignments_win_over_local_per_session() {
        let dir = TempDir::new().unwrap();
        {
            let (mut tool, _) =
                tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;
            tool.toggle("s3".into(), Some(EntityId::from(1))).await.unwrap();
            tool.toggle("p1".into(), Some(EntityId::from(1))).await.unwrap();
        }

        let api = MockApi::healthy(sample_sessions(), users());
        *api.assignments.lock().unwrap() =
            Some(serde_json::from_value(json!({ "s3": ["2"] })).unwrap());
        let (tool, _) = tool_with(api, &dir).await;

        let map = tool.engine().assignments();
        assert_eq!(map.assignees(&"s3".into()), &[EntityId::from(2)]);
        assert_eq!(map.assignees(&"p1".into()), &[EntityId::from(1)]);
    }

    #[tokio::test]
    async fn confirmation_blocks_other_mutations_until_resolved() {
        let dir = TempDir::new().unwrap();
        let (mut tool, api) = tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;

        tool.toggle("s3".into(), Some(EntityId::from(1))).await.unwrap();
        let outcome = tool.toggle("s3".into(), Some(EntityId::from(2))).await.unwrap();
        assert!(matches!(outcome, ToggleOutcome::NeedsConfirmation { .. }));

        let blocked = tool.remove(&"s3".into(), &EntityId::from(1)).await;
        assert!(matches!(blocked, Err(AppError::Conflict(_))));
        assert!(matches!(tool.upload_sessions("[]").await, Err(AppError::Conflict(_))));

        assert_eq!(tool.confirm(false).await.unwrap(), ToggleOutcome::Declined);
        assert_eq!(tool.engine().assignments().assignees(&"s3".into()), &[EntityId::from(1)]);
        assert_eq!(api.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn toggle_without_selection_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut tool, _) = tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;
        assert!(matches!(
            tool.toggle("s3".into(), None).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            tool.toggle("s3".into(), Some(EntityId::from(99))).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn malformed_upload_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let (mut tool, _) = tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;

        let err = tool.upload_sessions("{ not json").await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
        assert_eq!(tool.engine().sessions().len(), 3);

        let count = tool
            .upload_sessions(r#"[{ "id": 10, "title": "New" }, { "id": 11, "title": "New" }]"#)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn user_sessions_include_placeholders_for_missing_sessions() {
        let dir = TempDir::new().unwrap();
        let api = MockApi::healthy(sample_sessions(), users());
        *api.assignments.lock().unwrap() =
            Some(serde_json::from_value(json!({ "gone": [1], "p1": ["1"] })).unwrap());
        let (tool, _) = tool_with(api, &dir).await;

        let sessions = tool.user_sessions(&EntityId::from("1"));
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, EntityId::from("p1"));
        assert!(sessions[1].missing);
        assert_eq!(sessions[1].title_label(), "Session gone");
    }

    #[tokio::test]
    async fn clear_all_drops_local_state_and_reloads_users() {
        let dir = TempDir::new().unwrap();
        let (mut tool, _) = tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;
        tool.toggle("s3".into(), Some(EntityId::from(1))).await.unwrap();

        tool.clear_all().await.unwrap();
        assert!(tool.engine().assignments().is_empty());
        assert_eq!(tool.engine().users().len(), 2);
        assert!(tool.engine().selected_user().is_none());

        let store = LocalStore::open(dir.path(), "1").await.unwrap();
        assert!(store.get::<Value>(SNAPSHOT_KEY).is_none());
    }

    fn grace() -> NewUserRequest {
        NewUserRequest {
            name: "Grace Hopper".into(),
            email: "grace@example.org".into(),
            department: String::new(),
            role: None,
        }
    }

    #[tokio::test]
    async fn add_user_takes_the_registered_id() {
        let dir = TempDir::new().unwrap();
        let (mut tool, api) = tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;
        let user = tool.add_user(grace()).await.unwrap();
        assert_eq!(user.id, EntityId::from(102));
        assert_eq!(tool.state(Vec::new()).users.len(), 3);
        assert_eq!(api.users.lock().unwrap().as_ref().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn added_users_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, serde_json::to_string(&sample_sessions()).unwrap()).unwrap();
        let api = Arc::new(LocalApi::new(crate::db::memory_pool().await, &path));

        let mut tool = AttendanceTool::load("1", api.clone(), dir.path()).await.unwrap();
        let user = tool.add_user(grace()).await.unwrap();
        tool.toggle("s3".into(), Some(user.id.clone())).await.unwrap();

        tool.reload().await;
        assert_eq!(tool.engine().find_user(&user.id).map(|u| u.name.as_str()), Some("Grace Hopper"));
        assert!(tool.engine().assignments().contains(&"s3".into(), &user.id));

        let fresh = AttendanceTool::load("1", api, dir.path()).await.unwrap();
        assert!(fresh.engine().find_user(&user.id).is_some());
        assert!(fresh.engine().assignments().contains(&"s3".into(), &user.id));
    }

    #[tokio::test]
    async fn unregistered_users_are_kept_locally() {
        let dir = TempDir::new().unwrap();
        let api = MockApi {
            fail_create: true,
            ..MockApi::healthy(sample_sessions(), users())
        };
        let (mut tool, _) = tool_with(api, &dir).await;
        tool.take_notices();

        let user = tool.add_user(grace()).await.unwrap();
        assert_eq!(user.id, EntityId::from(3));
        let notices = tool.take_notices();
        assert_eq!(notices[0].level, NoticeLevel::Warning);

        tool.reload().await;
        assert_eq!(tool.engine().users().len(), 3);
        assert!(tool.engine().find_user(&EntityId::from(3)).is_some());

        tool.clear_all().await.unwrap();
        tool.reload().await;
        assert_eq!(tool.engine().users().len(), 2);
    }

    #[test]
    fn remote_users_replace_local_copies() {
        let mut remote = normalize_users(&[raw_user(1, "Ada", "Byron"), raw_user(5, "Grace", "Hopper")]);
        let saved = normalize_users(&[raw_user(3, "Grace", "Hopper"), raw_user(4, "Alan", "Turing")]);
        let still_local = merge_unsynced(&mut remote, saved, &[EntityId::from(3), EntityId::from(4)]);
        assert_eq!(still_local, vec![EntityId::from(4)]);
        assert_eq!(remote.len(), 3);
    }

    #[tokio::test]
    async fn reload_discards_pending_confirmation() {
        let dir = TempDir::new().unwrap();
        let (mut tool, _) = tool_with(MockApi::healthy(sample_sessions(), users()), &dir).await;
        tool.toggle("s3".into(), Some(EntityId::from(1))).await.unwrap();
        tool.toggle("s3".into(), Some(EntityId::from(2))).await.unwrap();
        assert!(tool.engine().pending_confirmation().is_some());

        tool.reload().await;
        assert!(tool.engine().pending_confirmation().is_none());
        assert!(tool.engine().assignments().contains(&"s3".into(), &EntityId::from(1)));
    }

    #[tokio::test]
    async fn registry_reuses_loaded_tools() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::new(
            Arc::new(MockApi::healthy(sample_sessions(), users())),
            dir.path(),
        );
        let a = registry.get("1").await.unwrap();
        let b = registry.get("1").await.unwrap();
        let c = registry.get("2").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn loading_one_conference_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let api = MockApi {
            delay: Some(std::time::Duration::from_millis(300)),
            ..MockApi::healthy(sample_sessions(), users())
        };
        let registry = ToolRegistry::new(Arc::new(api), dir.path());
        registry.get("1").await.unwrap();

        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get("2").await.map(|_| ()) })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let loaded = tokio::time::timeout(std::time::Duration::from_millis(100), registry.get("1")).await;
        assert!(loaded.is_ok());
        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_load() {
        let dir = TempDir::new().unwrap();
        let api = MockApi {
            delay: Some(std::time::Duration::from_millis(50)),
            ..MockApi::healthy(sample_sessions(), users())
        };
        let registry = ToolRegistry::new(Arc::new(api), dir.path());
        let (a, b) = tokio::join!(registry.get("1"), registry.get("1"));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }
}
