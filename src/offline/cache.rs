//! 이름 붙은 캐시들의 저장소
//!
//! 각 캐시는 절대 URL → 응답 전체의 맵입니다. 항목 단위 get/put/delete만 제공하므로
//! 부분적으로 쓰인 응답이 보이는 일은 없습니다.

use axum::body::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 캐시에 저장되는 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

type Entries = HashMap<String, CachedResponse>;

/// 캐시 저장소. 복제해도 같은 저장소를 가리킵니다.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    /// 생성 순서를 유지합니다. (`match_any`의 검색 순서)
    caches: Arc<RwLock<Vec<(String, Entries)>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 캐시 이름 목록 (생성 순)
    pub async fn keys(&self) -> Vec<String> {
        self.caches.read().await.iter().map(|(name, _)| name.clone()).collect()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.iter().any(|(n, _)| n == name)
    }

    /// 캐시를 삭제합니다. 있었으면 `true`.
    pub async fn delete(&self, name: &str) -> bool {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        caches.len() != before
    }

    pub async fn get(&self, name: &str, url: &str) -> Option<CachedResponse> {
        let caches = self.caches.read().await;
        caches
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get(url).cloned())
    }

    /// 모든 캐시를 생성 순서대로 찾아 처음 일치하는 응답을 반환합니다.
    pub async fn match_any(&self, url: &str) -> Option<CachedResponse> {
        let caches = self.caches.read().await;
        caches.iter().find_map(|(_, entries)| entries.get(url).cloned())
    }

    /// 캐시가 없으면 만든 뒤 항목을 넣습니다.
    pub async fn put(&self, name: &str, url: &str, response: CachedResponse) {
        self.put_all(name, vec![(url.to_string(), response)]).await;
    }

    /// 여러 항목을 한 번의 잠금으로 넣습니다.
    pub async fn put_all(&self, name: &str, items: Vec<(String, CachedResponse)>) {
        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                caches.push((name.to_string(), HashMap::new()));
                caches.len() - 1
            }
        };
        caches[index].1.extend(items);
    }
}
