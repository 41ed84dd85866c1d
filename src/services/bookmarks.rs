//! # 북마크
//!
//! 참석자 화면에서 표시한 세션 ID 집합입니다. 추가한 순서를 유지하고 중복이 없습니다.
//! 로컬 저장소의 `bookmarks` 키에 배열로 저장됩니다.

use crate::error::AppError;
use crate::models::EntityId;
use crate::services::local_store::{LocalStore, BOOKMARKS_KEY};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BookmarkSet(Vec<EntityId>);

impl BookmarkSet {
    pub fn load(store: &LocalStore) -> Self {
        let mut set = Self::default();
        for id in store.get::<Vec<EntityId>>(BOOKMARKS_KEY).unwrap_or_default() {
            if !set.0.contains(&id) {
                set.0.push(id);
            }
        }
        set
    }

    pub fn contains(&self, session_id: &EntityId) -> bool {
        self.0.contains(session_id)
    }

    /// 있으면 빼고 없으면 넣습니다. 토글 후 북마크 상태를 반환합니다.
    pub fn toggle(&mut self, session_id: EntityId) -> bool {
        if let Some(pos) = self.0.iter().position(|id| id == &session_id) {
            self.0.remove(pos);
            false
        } else {
            self.0.push(session_id);
            true
        }
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.0
    }

    pub async fn save(&self, store: &mut LocalStore) -> Result<(), AppError> {
        store.set(BOOKMARKS_KEY, &self.0)?;
        store.flush().await
    }
}
