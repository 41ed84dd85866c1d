//! 게이트웨이 수명 주기와 클라이언트 메시지
//!
//! 설치 → 대기 → 활성 순으로 진행하며, 설치에 실패하면 폐기(redundant) 상태가 되어
//! 이후 요청을 가로채지 않고 그대로 통과시킵니다.

use crate::offline::cache::CachedResponse;
use crate::offline::policy::OfflinePolicy;
use crate::offline::request::FetchRequest;
use crate::offline::OfflineError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

pub const SESSION_SYNC_TAG: &str = "session-data-sync";
pub const PREFERENCES_SYNC_TAG: &str = "user-preferences-sync";

const DEFAULT_TITLE: &str = "Conference Companion";
const DEFAULT_BODY: &str = "New update available";
const DEFAULT_TAG: &str = "default";
const NOTIFICATION_ICON: &str = "/icons/icon-192x192.png";
const NOTIFICATION_BADGE: &str = "/icons/icon-72x72.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    /// 설치 완료, 활성화 대기
    Waiting,
    Active,
    Redundant,
}

/// 클라이언트가 보내는 메시지
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    SkipWaiting,
    CacheUrls {
        #[serde(default)]
        urls: Vec<String>,
    },
    ClearCache,
}

/// 메시지 처리 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MessageOutcome {
    Activated,
    Cached { count: usize },
    Cleared { caches: usize },
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// 푸시 페이로드. 모든 필드는 선택입니다.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tag: Option<String>,
    pub require_interaction: Option<bool>,
    pub actions: Option<Vec<NotificationAction>>,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: Value,
}

impl Notification {
    pub fn from_payload(payload: PushPayload) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_BADGE.to_string(),
            tag: payload.tag.unwrap_or_else(|| DEFAULT_TAG.to_string()),
            require_interaction: payload.require_interaction.unwrap_or(false),
            actions: payload.actions.unwrap_or_else(default_actions),
            data: payload.data.unwrap_or(Value::Null),
        }
    }
}

fn default_actions() -> Vec<NotificationAction> {
    vec![
        NotificationAction {
            action: "view".into(),
            title: "View".into(),
            icon: Some("/icons/view-24x24.png".into()),
        },
        NotificationAction {
            action: "dismiss".into(),
            title: "Dismiss".into(),
            icon: Some("/icons/dismiss-24x24.png".into()),
        },
    ]
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationClick {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// 열린 클라이언트들에게 보내는 알림
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    DataUpdated {
        data: Value,
    },
    ShowSession {
        #[serde(rename = "sessionId")]
        session_id: Value,
    },
    Notification(Notification),
}

#[derive(Clone)]
pub struct OfflineWorker {
    policy: OfflinePolicy,
    state: Arc<RwLock<WorkerState>>,
    events: broadcast::Sender<ClientMessage>,
}

impl OfflineWorker {
    pub fn new(policy: OfflinePolicy) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            policy,
            state: Arc::new(RwLock::new(WorkerState::Installing)),
            events,
        }
    }

    pub fn policy(&self) -> &OfflinePolicy {
        &self.policy
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.events.subscribe()
    }

    /// 정적 자산을 미리 받습니다. 실패하면 폐기 상태가 됩니다.
    pub async fn install(&self) -> Result<usize, OfflineError> {
        match self.policy.install().await {
            Ok(count) => {
                *self.state.write().await = WorkerState::Waiting;
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Offline gateway install failed: {e}");
                *self.state.write().await = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    /// 지난 버전 캐시를 정리하고 활성화합니다. 이미 활성이면 아무것도 하지 않습니다.
    pub async fn activate(&self) -> Result<Vec<String>, OfflineError> {
        let mut state = self.state.write().await;
        match *state {
            WorkerState::Active => Ok(Vec::new()),
            WorkerState::Redundant => Err(OfflineError::Redundant),
            WorkerState::Installing | WorkerState::Waiting => {
                let deleted = self.policy.activate().await;
                *state = WorkerState::Active;
                tracing::info!(deleted = deleted.len(), "Offline gateway activated");
                Ok(deleted)
            }
        }
    }

    /// 활성 상태에서 가로챌 수 있는 요청은 정책대로, 그 밖에는 네트워크로 그대로 보냅니다.
    pub async fn fetch(&self, req: &FetchRequest) -> Result<CachedResponse, OfflineError> {
        if self.state().await == WorkerState::Active && req.is_interceptable() {
            self.policy.handle(req).await
        } else {
            self.policy.network(req).await
        }
    }

    pub async fn on_message(&self, message: WorkerMessage) -> Result<MessageOutcome, OfflineError> {
        match message {
            WorkerMessage::SkipWaiting => {
                if self.state().await == WorkerState::Waiting {
                    self.activate().await?;
                    Ok(MessageOutcome::Activated)
                } else {
                    Ok(MessageOutcome::Ignored)
                }
            }
            WorkerMessage::CacheUrls { urls } => {
                let count = self.policy.cache_urls(&urls).await?;
                Ok(MessageOutcome::Cached { count })
            }
            WorkerMessage::ClearCache => {
                let caches = self.policy.clear().await;
                tracing::info!(caches, "All caches cleared");
                Ok(MessageOutcome::Cleared { caches })
            }
        }
    }

    /// 백그라운드 동기화. 알 수 없는 태그면 `false`.
    /// 동기화 실패는 기록만 하고 전파하지 않습니다.
    pub async fn sync(&self, tag: &str) -> bool {
        match tag {
            SESSION_SYNC_TAG => {
                match self.policy.refresh_primary_data().await {
                    Ok(Some(count)) => {
                        self.broadcast(ClientMessage::DataUpdated {
                            data: json!({ "sessions": count }),
                        });
                    }
                    Ok(None) => tracing::debug!("Session data sync got a non-success response"),
                    Err(e) => tracing::warn!("Session data sync failed: {e}"),
                }
                true
            }
            PREFERENCES_SYNC_TAG => {
                tracing::debug!("Preferences sync requested");
                true
            }
            other => {
                tracing::debug!(tag = other, "Unknown sync tag");
                false
            }
        }
    }

    /// 푸시를 알림으로 바꿔 클라이언트에 보냅니다. 페이로드가 없으면 무시합니다.
    pub fn push(&self, payload: Option<PushPayload>) -> Option<Notification> {
        let notification = Notification::from_payload(payload?);
        self.broadcast(ClientMessage::Notification(notification.clone()));
        Some(notification)
    }

    /// "view" 동작이고 세션 id가 있으면 해당 세션을 열도록 알립니다.
    pub fn notification_click(&self, click: NotificationClick) -> bool {
        if click.action != "view" {
            return false;
        }
        match click.data.get("sessionId") {
            Some(id) if !id.is_null() => {
                self.broadcast(ClientMessage::ShowSession { session_id: id.clone() });
                true
            }
            _ => false,
        }
    }

    fn broadcast(&self, message: ClientMessage) {
        // 구독자가 없으면 버려짐
        let _ = self.events.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::policy::tests::{policy_with, serve_manifest, MockFetcher, ORIGIN};
    use reqwest::Url;

    fn worker() -> (OfflineWorker, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::default());
        serve_manifest(&fetcher);
        (OfflineWorker::new(policy_with(fetcher.clone())), fetcher)
    }

    #[tokio::test]
    async fn lifecycle_install_then_activate() {
        let (worker, _) = worker();
        assert_eq!(worker.state().await, WorkerState::Installing);
        worker.install().await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Waiting);
        worker.activate().await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn failed_install_passes_requests_through() {
        let fetcher = Arc::new(MockFetcher::default());
        let worker = OfflineWorker::new(policy_with(fetcher.clone()));
        assert!(worker.install().await.is_err());
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(matches!(worker.activate().await, Err(OfflineError::Redundant)));

        fetcher.go_offline();
        let req = FetchRequest::get(Url::parse(ORIGIN).unwrap().join("/styles.css").unwrap());
        assert!(worker.fetch(&req).await.is_err());
    }

    #[tokio::test]
    async fn skip_waiting_activates() {
        let (worker, _) = worker();
        worker.install().await.unwrap();
        let outcome = worker.on_message(WorkerMessage::SkipWaiting).await.unwrap();
        assert_eq!(outcome, MessageOutcome::Activated);
        assert_eq!(worker.state().await, WorkerState::Active);
        let again = worker.on_message(WorkerMessage::SkipWaiting).await.unwrap();
        assert_eq!(again, MessageOutcome::Ignored);
    }

    #[tokio::test]
    async fn clear_cache_message_empties_storage() {
        let (worker, _) = worker();
        worker.install().await.unwrap();
        let message: WorkerMessage = serde_json::from_str(r#"{"type":"CLEAR_CACHE"}"#).unwrap();
        let outcome = worker.on_message(message).await.unwrap();
        assert_eq!(outcome, MessageOutcome::Cleared { caches: 1 });
        assert!(worker.policy().caches().keys().await.is_empty());
    }

    #[tokio::test]
    async fn cache_urls_message_stores_in_dynamic_cache() {
        let (worker, _) = worker();
        let message: WorkerMessage =
            serde_json::from_str(r#"{"type":"CACHE_URLS","urls":["/styles.css","/app.js"]}"#).unwrap();
        assert_eq!(worker.on_message(message).await.unwrap(), MessageOutcome::Cached { count: 2 });
        assert!(worker.policy().caches().has("confdesk-dynamic-v1.0.0").await);
    }

    #[tokio::test]
    async fn session_sync_broadcasts_count() {
        let (worker, fetcher) = worker();
        fetcher.serve("/sessions.json", CachedResponse::new(200, "application/json", "[{},{}]"));
        let mut rx = worker.subscribe();

        assert!(worker.sync(SESSION_SYNC_TAG).await);
        let message = rx.recv().await.unwrap();
        assert_eq!(message, ClientMessage::DataUpdated { data: json!({ "sessions": 2 }) });
        assert!(!worker.sync("something-else").await);
    }

    #[tokio::test]
    async fn push_fills_defaults() {
        let (worker, _) = worker();
        assert!(worker.push(None).is_none());

        let mut rx = worker.subscribe();
        let shown = worker
            .push(Some(PushPayload {
                body: Some("Room change".into()),
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(shown.title, "Conference Companion");
        assert_eq!(shown.body, "Room change");
        assert_eq!(shown.tag, "default");
        assert_eq!(shown.actions.len(), 2);
        assert!(matches!(rx.recv().await.unwrap(), ClientMessage::Notification(_)));
    }

    #[tokio::test]
    async fn view_click_opens_session() {
        let (worker, _) = worker();
        let mut rx = worker.subscribe();

        let dismiss = NotificationClick {
            action: "dismiss".into(),
            data: json!({ "sessionId": 7 }),
        };
        assert!(!worker.notification_click(dismiss));

        let view = NotificationClick {
            action: "view".into(),
            data: json!({ "sessionId": 7 }),
        };
        assert!(worker.notification_click(view));
        let message = rx.recv().await.unwrap();
        assert_eq!(serde_json::to_value(&message).unwrap(), json!({ "type": "SHOW_SESSION", "sessionId": 7 }));
    }
}
