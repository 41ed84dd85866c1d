//! 네트워크 접근 추상화
//!
//! 정책 코드는 `Fetcher` 트레이트만 알고, 실제 HTTP는 `HttpFetcher`가 담당합니다.
//! 응답 상태가 2xx가 아니어도 `Ok`입니다. 연결 실패와 타임아웃만 `Err`입니다.

use crate::offline::cache::CachedResponse;
use crate::offline::request::FetchRequest;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<CachedResponse, FetchError>;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// 모든 요청에 `timeout`을 적용합니다.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<CachedResponse, FetchError> {
        let mut builder = self.http.request(req.method.clone(), req.url.clone());
        if let Some(accept) = &req.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if !req.body.is_empty() {
            if let Some(content_type) = &req.content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = builder.body(req.body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?;

        tracing::debug!(url = %req.url, status, "Fetched from network");
        Ok(CachedResponse {
            status,
            content_type,
            body,
        })
    }
}
