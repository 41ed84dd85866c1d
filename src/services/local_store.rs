//! # 로컬 대체 저장소
//!
//! 원격 API에 닿지 못할 때 쓰는 키-값 저장소입니다. 학회마다 JSON 파일 하나
//! (`{LOCAL_STORE_DIR}/{인코딩된 conference_id}.json`)를 두고, 최상위 객체의 키로 값을 나눕니다.
//!
//! | 키 | 내용 |
//! |---|---|
//! | `sessions` | 마지막으로 받은 세션 원본 레코드 배열 |
//! | `sessions_timestamp` | 위 캐시의 저장 시각 (RFC 3339) |
//! | `bookmarks` | 북마크한 세션 ID 배열 |
//! | `attendance_tool_data` | 배정 도구 스냅샷 |
//!
//! 값은 메모리에서 바꾸고 `flush()`로 파일 전체를 다시 씁니다.

use crate::error::AppError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const SESSIONS_KEY: &str = "sessions";
pub const SESSIONS_TIMESTAMP_KEY: &str = "sessions_timestamp";
pub const BOOKMARKS_KEY: &str = "bookmarks";
pub const SNAPSHOT_KEY: &str = "attendance_tool_data";

#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl LocalStore {
    /// 학회 ID에 해당하는 저장소 파일을 엽니다.
    ///
    /// 파일이 없으면 빈 저장소로 시작합니다.
    /// 내용이 깨져 있으면 경고를 남기고 빈 저장소로 시작합니다 (다음 flush에서 덮어씀).
    pub async fn open(dir: impl AsRef<Path>, conference_id: &str) -> Result<Self, AppError> {
        let path = dir.as_ref().join(format!("{}.json", file_stem(conference_id)));

        let entries = match fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Ignoring unreadable local store: {}", e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, entries })
    }

    /// 키의 값을 원하는 타입으로 꺼냅니다. 없거나 형태가 맞지 않으면 `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.get(key)?.clone();
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, "Local store entry has unexpected shape: {}", e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// 현재 내용을 파일에 씁니다. 부모 디렉토리가 없으면 만듭니다.
    pub async fn flush(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, text).await?;
        Ok(())
    }
}

/// 학회 ID를 파일 이름으로 바꿉니다.
///
/// 영문자, 숫자, `-`는 그대로 두고 나머지 바이트는 `_xx`(16진수)로 적습니다.
/// `_` 자신도 인코딩하므로 서로 다른 ID가 같은 파일을 가리키지 않습니다.
/// 빈 ID는 `_` 하나가 됩니다.
fn file_stem(conference_id: &str) -> String {
    if conference_id.is_empty() {
        return "_".to_string();
    }
    let mut stem = String::with_capacity(conference_id.len());
    for byte in conference_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02x}"));
        }
    }
    stem
}
