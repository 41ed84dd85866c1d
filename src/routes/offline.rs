//! # 오프라인 게이트웨이 핸들러
//!
//! - `GET  /sw/status` → 수명 주기 상태와 캐시 이름 목록
//! - `POST /sw/message` → `SKIP_WAITING` / `CACHE_URLS` / `CLEAR_CACHE`
//! - `POST /sw/sync/{tag}` → 백그라운드 동기화
//! - `POST /sw/push` → 푸시 페이로드를 알림으로 변환해 방송
//! - `POST /sw/notification-click` → 알림 클릭 처리
//! - `GET  /sw/events` → 방송 메시지 SSE 스트림
//!
//! 라우터에 매칭되지 않은 요청은 `gateway`가 업스트림으로 프록시합니다.

// ── 의존성 가져오기 ──
use crate::{
    error::AppError, // 에러 타입 (HTTP 에러 응답으로 자동 변환)
    offline::{FetchRequest, NotificationClick, OfflineWorker, PushPayload, WorkerMessage}, // 게이트웨이 타입
    routes::AppState, // 애플리케이션 공유 상태
};
use axum::{
    body::Bytes,                                              // 요청 본문 원본 바이트
    extract::{Path, State},                                   // URL 파라미터, 앱 상태 추출
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri}, // HTTP 기본 타입
    response::{
        sse::{Event, KeepAlive, Sse}, // Server-Sent Events 응답
        IntoResponse, Response,
    },
    Json, // JSON 요청/응답 처리
};
use futures::{stream, Stream}; // 방송 수신기를 스트림으로 바꾸는 도구
use reqwest::Url; // 업스트림 URL
use serde_json::{json, Value}; // JSON 객체 생성용 매크로와 범용 JSON 타입
use std::convert::Infallible; // 실패하지 않는 스트림의 에러 타입
use tokio::sync::broadcast::error::RecvError; // 방송 수신 에러 (뒤처짐/닫힘)

fn worker(state: &AppState) -> Result<&OfflineWorker, AppError> {
    state
        .worker
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Offline gateway is not configured".to_string()))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let worker = worker(&state)?;
    let lifecycle = worker.state().await;
    let caches = worker.policy().caches().keys().await;
    Ok(Json(json!({ "state": lifecycle, "caches": caches })))
}

pub async fn message(
    State(state): State<AppState>,
    Json(message): Json<WorkerMessage>,
) -> Result<Json<Value>, AppError> {
    let outcome = worker(&state)?.on_message(message).await?;
    Ok(Json(json!(outcome)))
}

pub async fn sync(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let handled = worker(&state)?.sync(&tag).await;
    Ok((StatusCode::ACCEPTED, Json(json!({ "tag": tag, "handled": handled }))))
}

/// 빈 본문은 무시합니다.
pub async fn push(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, AppError> {
    let worker = worker(&state)?;
    let payload: Option<PushPayload> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(serde_json::from_slice(&body)?)
    };
    let shown = worker.push(payload);
    Ok(Json(json!({ "notification": shown })))
}

pub async fn notification_click(
    State(state): State<AppState>,
    Json(click): Json<NotificationClick>,
) -> Result<Json<Value>, AppError> {
    let handled = worker(&state)?.notification_click(click);
    Ok(Json(json!({ "handled": handled })))
}

/// 방송 메시지를 SSE로 흘려보냅니다. 뒤처진 구독자는 놓친 메시지를 건너뜁니다.
pub async fn events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let rx = worker(&state)?.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    let event = match Event::default().json_data(&message) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!("Failed to encode client message: {e}");
                            continue;
                        }
                    };
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// 요청 경로를 업스트림 출처 아래의 URL로 바꿉니다.
///
/// `Url::join`은 `//host/...` 경로를 다른 호스트로 해석하므로 쓰지 않습니다.
/// 경로와 쿼리만 옮겨 붙이고, 결과의 출처가 업스트림과 다르면 거부합니다.
fn upstream_url(origin: &Url, uri: &Uri) -> Result<Url, AppError> {
    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());

    if url.origin() != origin.origin() {
        return Err(AppError::BadRequest(format!(
            "Request path leaves the upstream origin: {uri}"
        )));
    }
    Ok(url)
}

/// 업스트림 프록시. 활성 게이트웨이는 GET 요청에 캐시 전략을 적용합니다.
pub async fn gateway(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let worker = worker(&state)?;
    let url = upstream_url(worker.policy().origin(), &uri)?;

    // 헤더 값을 문자열로 꺼내는 도우미 (ASCII가 아니면 없는 것으로 취급)
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let req = FetchRequest {
        method,
        url,
        accept: header_str("accept"),
        mode: header_str("sec-fetch-mode"),
        content_type: header_str("content-type"),
        body,
    };

    let resp = worker.fetch(&req).await?;
    // 업스트림 상태 코드가 HTTP 범위를 벗어나면 502로 바꿉니다
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, resp.body).into_response();
    if let Some(content_type) = resp.content_type.as_deref() {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://conf.example.org").unwrap()
    }

    #[test]
    fn scheme_relative_paths_stay_on_the_upstream_host() {
        let uri: Uri = "//evil.example/steal.css".parse().unwrap();
        let url = upstream_url(&origin(), &uri).unwrap();
        assert_eq!(url.host_str(), Some("conf.example.org"));
        assert_eq!(url.path(), "//evil.example/steal.css");
    }

    #[test]
    fn query_strings_are_carried_over() {
        let uri: Uri = "/sessions.json?day=2".parse().unwrap();
        let url = upstream_url(&origin(), &uri).unwrap();
        assert_eq!(url.as_str(), "https://conf.example.org/sessions.json?day=2");
    }
}
