//! 요청 종류별 캐시 전략과 설치/활성화 단계의 캐시 관리

use crate::offline::cache::{CacheStorage, CachedResponse};
use crate::offline::fetcher::Fetcher;
use crate::offline::request::{FetchRequest, RequestKind, RequestRules};
use crate::offline::OfflineError;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;

/// 게이트웨이가 설치 시 미리 받아 두는 정적 자산
///
/// 상대 경로는 업스트림 출처 기준이고, CDN 자산은 절대 URL로 적습니다.
/// 하나라도 받지 못하면 설치가 실패합니다.
pub const DEFAULT_STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/app.js",
    "/data-manager.js",
    "/ui-components.js",
    "/offline-manager.js",
    "/manifest.json",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
];

const CACHE_PREFIX: &str = "confdesk";
const APP_SHELL: &str = "/index.html";

const CSS_PLACEHOLDER: &str = "/* Offline - CSS unavailable */";
const JS_PLACEHOLDER: &str = "// Offline - JS unavailable";

/// 버전이 붙은 캐시 이름 세 가지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub static_cache: String,
    pub dynamic_cache: String,
    pub versioned: String,
}

impl CacheNames {
    pub fn new(version: &str) -> Self {
        Self {
            static_cache: format!("{CACHE_PREFIX}-static-{version}"),
            dynamic_cache: format!("{CACHE_PREFIX}-dynamic-{version}"),
            versioned: format!("{CACHE_PREFIX}-{version}"),
        }
    }

    fn contains(&self, name: &str) -> bool {
        name == self.static_cache || name == self.dynamic_cache || name == self.versioned
    }
}

#[derive(Clone)]
pub struct OfflinePolicy {
    fetcher: Arc<dyn Fetcher>,
    caches: CacheStorage,
    names: Arc<CacheNames>,
    rules: Arc<RequestRules>,
    origin: Url,
    primary_data: Url,
}

impl OfflinePolicy {
    /// `assets`의 상대 경로는 `origin` 기준으로, 절대 URL은 그대로 씁니다.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        caches: CacheStorage,
        origin: Url,
        version: &str,
        primary_data_path: &str,
        assets: &[&str],
    ) -> Result<Self, OfflineError> {
        let static_assets = assets
            .iter()
            .map(|a| origin.join(a).map_err(|e| OfflineError::InvalidUrl(format!("{a}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let primary_data = origin
            .join(primary_data_path)
            .map_err(|e| OfflineError::InvalidUrl(format!("{primary_data_path}: {e}")))?;

        Ok(Self {
            fetcher,
            caches,
            names: Arc::new(CacheNames::new(version)),
            rules: Arc::new(RequestRules {
                static_assets,
                api_paths: vec![primary_data.path().to_string()],
            }),
            origin,
            primary_data,
        })
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn classify(&self, req: &FetchRequest) -> RequestKind {
        self.rules.classify(req)
    }

    /// 가로채지 않고 그대로 네트워크로 보냅니다.
    pub async fn network(&self, req: &FetchRequest) -> Result<CachedResponse, OfflineError> {
        Ok(self.fetcher.fetch(req).await?)
    }

    /// 가로챈 요청을 분류에 맞는 전략으로 처리합니다.
    pub async fn handle(&self, req: &FetchRequest) -> Result<CachedResponse, OfflineError> {
        let kind = self.classify(req);
        tracing::debug!(url = %req.url, ?kind, "Handling intercepted request");
        match kind {
            RequestKind::StaticAsset => self.cache_first(req).await,
            RequestKind::Api => self.network_first_api(req).await,
            RequestKind::Navigation => self.navigation(req).await,
            RequestKind::Other => self.network_first_other(req).await,
        }
    }

    async fn cache_first(&self, req: &FetchRequest) -> Result<CachedResponse, OfflineError> {
        let key = req.url.as_str();
        if let Some(cached) = self.caches.match_any(key).await {
            return Ok(cached);
        }

        match self.fetcher.fetch(req).await {
            Ok(resp) => {
                if resp.status == 200 {
                    self.caches.put(&self.names.static_cache, key, resp.clone()).await;
                }
                Ok(resp)
            }
            Err(e) => {
                tracing::warn!(url = %req.url, "Static asset unavailable offline: {e}");
                match req.extension().as_deref() {
                    Some("css") => Ok(CachedResponse::new(200, "text/css", CSS_PLACEHOLDER)),
                    Some("js") => Ok(CachedResponse::new(200, "application/javascript", JS_PLACEHOLDER)),
                    _ => Err(e.into()),
                }
            }
        }
    }

    async fn network_first_api(&self, req: &FetchRequest) -> Result<CachedResponse, OfflineError> {
        let key = req.url.as_str();
        match self.fetcher.fetch(req).await {
            Ok(resp) => {
                if resp.status == 200 {
                    self.caches.put(&self.names.dynamic_cache, key, resp.clone()).await;
                }
                Ok(resp)
            }
            Err(e) => {
                if let Some(cached) = self.caches.match_any(key).await {
                    tracing::info!(url = %req.url, "Serving cached data while offline");
                    return Ok(cached);
                }
                if req.url.path() == self.primary_data.path() {
                    return Ok(CachedResponse::new(200, "application/json", "[]"));
                }
                Err(e.into())
            }
        }
    }

    async fn navigation(&self, req: &FetchRequest) -> Result<CachedResponse, OfflineError> {
        let shell = self.shell_url()?;
        if let Some(cached) = self.caches.match_any(shell.as_str()).await {
            let policy = self.clone();
            let refresh = req.clone();
            tokio::spawn(async move {
                policy.refresh_shell(&refresh, &shell).await;
            });
            return Ok(cached);
        }

        let resp = self.fetcher.fetch(req).await?;
        if resp.status == 200 {
            self.caches.put(&self.names.static_cache, shell.as_str(), resp.clone()).await;
        }
        Ok(resp)
    }

    async fn refresh_shell(&self, req: &FetchRequest, shell: &Url) {
        match self.fetcher.fetch(req).await {
            Ok(resp) if resp.status == 200 => {
                self.caches.put(&self.names.static_cache, shell.as_str(), resp).await;
                tracing::debug!("App shell refreshed");
            }
            Ok(resp) => tracing::debug!(status = resp.status, "App shell refresh skipped"),
            Err(e) => tracing::debug!("App shell refresh failed: {e}"),
        }
    }

    async fn network_first_other(&self, req: &FetchRequest) -> Result<CachedResponse, OfflineError> {
        let key = req.url.as_str();
        match self.fetcher.fetch(req).await {
            Ok(resp) => {
                let is_text = resp.content_type.as_deref().is_some_and(|ct| ct.contains("text/"));
                if resp.status == 200 && is_text {
                    self.caches.put(&self.names.dynamic_cache, key, resp.clone()).await;
                }
                Ok(resp)
            }
            Err(e) => match self.caches.match_any(key).await {
                Some(cached) => Ok(cached),
                None => Err(e.into()),
            },
        }
    }

    fn shell_url(&self) -> Result<Url, OfflineError> {
        self.origin
            .join(APP_SHELL)
            .map_err(|e| OfflineError::InvalidUrl(format!("{APP_SHELL}: {e}")))
    }

    /// 매니페스트 전체를 받아 정적 캐시에 넣습니다.
    /// 하나라도 실패하면 아무것도 저장하지 않습니다.
    pub async fn install(&self) -> Result<usize, OfflineError> {
        let assets = self.rules.static_assets.clone();
        let count = self.fetch_all(&assets, &self.names.static_cache).await?;
        tracing::info!(count, cache = %self.names.static_cache, "Static assets cached");
        Ok(count)
    }

    /// 현재 버전의 세 이름이 아닌 캐시를 모두 지웁니다.
    pub async fn activate(&self) -> Vec<String> {
        let mut deleted = Vec::new();
        for name in self.caches.keys().await {
            if !self.names.contains(&name) && self.caches.delete(&name).await {
                tracing::info!(cache = %name, "Deleted stale cache");
                deleted.push(name);
            }
        }
        deleted
    }

    /// 요청받은 URL들을 동적 캐시에 넣습니다. 전부 성공해야 저장됩니다.
    pub async fn cache_urls(&self, urls: &[String]) -> Result<usize, OfflineError> {
        let resolved = urls
            .iter()
            .map(|u| self.origin.join(u).map_err(|e| OfflineError::InvalidUrl(format!("{u}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        self.fetch_all(&resolved, &self.names.dynamic_cache).await
    }

    async fn fetch_all(&self, urls: &[Url], cache: &str) -> Result<usize, OfflineError> {
        let mut items = Vec::with_capacity(urls.len());
        for url in urls {
            let resp = self.fetcher.fetch(&FetchRequest::get(url.clone())).await?;
            if !resp.is_ok() {
                return Err(OfflineError::BadStatus {
                    url: url.to_string(),
                    status: resp.status,
                });
            }
            items.push((url.to_string(), resp));
        }
        let count = items.len();
        self.caches.put_all(cache, items).await;
        Ok(count)
    }

    /// 모든 캐시를 지웁니다. 지운 캐시 수를 반환합니다.
    pub async fn clear(&self) -> usize {
        let mut cleared = 0;
        for name in self.caches.keys().await {
            if self.caches.delete(&name).await {
                cleared += 1;
            }
        }
        cleared
    }

    /// 주 데이터 엔드포인트를 다시 받아 동적 캐시를 갱신합니다.
    /// 응답이 2xx가 아니면 `None`, 성공하면 배열 길이를 반환합니다.
    pub async fn refresh_primary_data(&self) -> Result<Option<usize>, OfflineError> {
        let resp = self.fetcher.fetch(&FetchRequest::get(self.primary_data.clone())).await?;
        if !resp.is_ok() {
            return Ok(None);
        }

        let data: Value = serde_json::from_slice(&resp.body)?;
        let count = match &data {
            Value::Array(items) => items.len(),
            Value::Object(obj) => obj
                .get("sessions")
                .and_then(Value::as_array)
                .map_or(0, |items| items.len()),
            _ => 0,
        };
        self.caches
            .put(&self.names.dynamic_cache, self.primary_data.as_str(), resp)
            .await;
        Ok(Some(count))
    }
}
