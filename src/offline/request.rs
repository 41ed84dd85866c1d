//! 가로챈 요청의 표현과 분류 규칙

use axum::body::Bytes;
use reqwest::{Method, Url};
use serde::Serialize;

/// 게이트웨이를 지나는 요청 하나
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    /// `Accept` 헤더
    pub accept: Option<String>,
    /// `Sec-Fetch-Mode` 헤더 ("navigate", "cors", "no-cors" ...)
    pub mode: Option<String>,
    /// 본문의 `Content-Type` 헤더 (GET이 아닌 요청을 그대로 넘길 때 사용)
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            accept: None,
            mode: None,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// GET이면서 http(s) 스킴인 요청만 가로챕니다.
    pub fn is_interceptable(&self) -> bool {
        self.method == Method::GET && matches!(self.url.scheme(), "http" | "https")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode.as_deref() == Some("navigate")
            || (self.method == Method::GET
                && self.accept.as_deref().is_some_and(|a| a.contains("text/html")))
    }

    /// 경로 마지막 구간의 확장자 (소문자)
    pub fn extension(&self) -> Option<String> {
        let last = self.url.path().rsplit('/').next()?;
        let (stem, ext) = last.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// 요청 분류. 위에서부터 순서대로 검사하며 서로 배타적입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// 캐시 우선
    StaticAsset,
    /// 네트워크 우선, 캐시 대체
    Api,
    /// 캐시된 셸 우선 + 백그라운드 갱신
    Navigation,
    /// 네트워크 우선
    Other,
}

const STATIC_EXTENSIONS: &[&str] = &["css", "js", "png", "jpg", "ico"];
const API_EXTENSIONS: &[&str] = &["json"];

/// 분류에 쓰는 경로 목록
#[derive(Debug, Clone)]
pub struct RequestRules {
    /// 정적 자산 매니페스트 (절대 URL)
    pub static_assets: Vec<Url>,
    /// 데이터 엔드포인트 경로
    pub api_paths: Vec<String>,
}

impl RequestRules {
    /// 경로는 정확히 일치해야 합니다. 부분 문자열 일치는 쓰지 않습니다.
    /// (`/`가 모든 경로에, `.js`가 `.json`에 걸리기 때문입니다.)
    pub fn classify(&self, req: &FetchRequest) -> RequestKind {
        let url = &req.url;
        let ext = req.extension();
        let has_ext = |set: &[&str]| ext.as_deref().is_some_and(|e| set.contains(&e));

        let in_manifest = self
            .static_assets
            .iter()
            .any(|asset| asset.host_str() == url.host_str() && asset.path() == url.path());
        if in_manifest || has_ext(STATIC_EXTENSIONS) {
            return RequestKind::StaticAsset;
        }

        if self.api_paths.iter().any(|p| p == url.path()) || has_ext(API_EXTENSIONS) {
            return RequestKind::Api;
        }

        if req.is_navigation() {
            return RequestKind::Navigation;
        }

        RequestKind::Other
    }
}
