//! # 학회 세션 모델
//!
//! 학회 일정 항목(강연, 심포지엄, 포스터) 하나를 나타냅니다.
//!
//! 크롤링된 원본 데이터는 학회/연도마다 필드 구성이 다릅니다:
//! ```text
//! { "session_id": 12, "session_info": { "title": ..., "type": ... },
//!   "schedule": { "date": ..., "time": ..., "location": ... } }
//! { "presentation_details": { "id": "P-752", "title": ... }, ... }
//! { "title": ..., "date": ..., "session_type": ... }
//! ```
//! 이 모듈은 원본 JSON을 **수집 시점에 한 번만** 정규화하여 `Session`으로 만듭니다.
//! 이후 코드는 원본 필드 이름을 전혀 알 필요가 없습니다.

use crate::models::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 세션 ID 대체 체인 (앞에서부터 처음으로 값이 있는 필드를 사용)
const ID_POINTERS: &[&str] = &[
    "/session_id",
    "/id",
    "/Session_ID",
    "/ID",
    "/sessionId",
    "/presentation_number",
    "/abstractNumber",
    "/presentation_details/id",
];

/// 세션 제목 대체 체인
const TITLE_POINTERS: &[&str] = &[
    "/session_info/title",
    "/title",
    "/session_title",
    "/name",
    "/presentation_details/title",
];

const DATE_POINTERS: &[&str] = &["/schedule/date", "/date"];
const TIME_POINTERS: &[&str] = &["/schedule/time", "/time"];
const LOCATION_POINTERS: &[&str] = &["/schedule/location", "/location"];
const TYPE_POINTERS: &[&str] = &["/session_info/type", "/session_type", "/type"];

/// 정규화된 세션 레코드
///
/// 제목/날짜/시간/장소/유형은 원본에 없을 수 있으므로 모두 `Option`입니다.
/// 화면 표시용 대체값("TBD", "Session {id}")은 `*_label()` 메서드가 만들어 줍니다.
/// 원본 값을 그대로 보존해야 중복 제거 키와 시간 충돌 비교가 원본 의미를 유지합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: EntityId,
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    /// 세션 유형 (예: "Symposium", "Poster")
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// 검색용 연사 이름 목록
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub speakers: Vec<String>,
    /// 배정 맵에는 있지만 로드된 세션 목록에 없는 ID를 표시하기 위한 자리표시자 여부
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
}

impl Session {
    /// 원본 JSON 레코드 하나를 정규화합니다.
    ///
    /// 명시적 ID 필드가 하나도 없으면 `session_<uuid>` 형태의 ID를 새로 만듭니다.
    /// 이 경우에만 같은 레코드를 다시 읽었을 때 ID가 달라질 수 있습니다.
    pub fn from_raw(raw: &Value) -> Self {
        let id = ID_POINTERS
            .iter()
            .find_map(|p| raw.pointer(p).and_then(EntityId::from_value))
            .unwrap_or_else(|| EntityId::new(format!("session_{}", uuid::Uuid::now_v7().simple())));

        Self {
            id,
            title: first_text(raw, TITLE_POINTERS),
            date: first_text(raw, DATE_POINTERS),
            time: first_text(raw, TIME_POINTERS),
            location: first_text(raw, LOCATION_POINTERS),
            kind: first_text(raw, TYPE_POINTERS),
            speakers: speaker_names(raw),
            missing: false,
        }
    }

    /// 로드된 목록에 없는 세션을 위한 자리표시자
    pub fn placeholder(id: EntityId) -> Self {
        Self {
            id,
            title: None,
            date: None,
            time: None,
            location: None,
            kind: None,
            speakers: Vec::new(),
            missing: true,
        }
    }

    /// 유형 문자열에 "poster"가 포함되면(대소문자 무시) 포스터 세션입니다.
    /// 포스터 세션은 여러 명을 확인 없이 배정할 수 있습니다.
    pub fn is_poster(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| k.to_lowercase().contains("poster"))
    }

    pub fn title_label(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!("Session {}", self.id),
        }
    }

    pub fn date_label(&self) -> &str {
        self.date.as_deref().unwrap_or("TBD")
    }

    pub fn time_label(&self) -> &str {
        self.time.as_deref().unwrap_or("TBD")
    }

    pub fn location_label(&self) -> &str {
        self.location.as_deref().unwrap_or("TBD")
    }
}

/// 포인터 목록에서 처음으로 비어 있지 않은 문자열을 찾습니다.
/// 숫자 값은 문자열로 바꿔서 받아들입니다. (예: "time": 900)
fn first_text(raw: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| match raw.pointer(p)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// `speakers`는 역할별 배열을 담은 객체입니다: `{ "moderators": [{ "name": ... }], ... }`
fn speaker_names(raw: &Value) -> Vec<String> {
    let Some(Value::Object(groups)) = raw.get("speakers") else {
        return Vec::new();
    };

    groups
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|speaker| speaker.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_crawler_layout() {
        let raw = json!({
            "session_id": 101,
            "session_info": { "title": "Antimicrobial Stewardship", "type": "Symposium" },
            "schedule": { "date": "Sunday, October 19, 2025", "time": "8:00 AM - 9:00 AM", "location": "Room 2" },
            "speakers": { "moderators": [{ "name": "Ada Park" }], "speakers": [{ "name": "Lee Chen" }, {}] }
        });

        let session = Session::from_raw(&raw);
        assert_eq!(session.id, EntityId::from(101));
        assert_eq!(session.title.as_deref(), Some("Antimicrobial Stewardship"));
        assert_eq!(session.date.as_deref(), Some("Sunday, October 19, 2025"));
        assert_eq!(session.location.as_deref(), Some("Room 2"));
        assert_eq!(session.speakers.len(), 2);
        assert!(!session.is_poster());
    }

    #[test]
    fn id_chain_falls_back_to_presentation_details() {
        let raw = json!({
            "presentation_details": { "id": "P-752", "title": "Poster on sepsis" },
            "session_info": { "type": "Poster Session" }
        });

        let session = Session::from_raw(&raw);
        assert_eq!(session.id.as_str(), "P-752");
        assert_eq!(session.title.as_deref(), Some("Poster on sepsis"));
        assert!(session.is_poster());
    }

    #[test]
    fn explicit_ids_are_stable_across_reloads() {
        let raw = json!({ "presentation_number": "LB-3" });
        assert_eq!(Session::from_raw(&raw).id, Session::from_raw(&raw).id);
    }

    #[test]
    fn missing_ids_are_generated() {
        let session = Session::from_raw(&json!({ "title": "Orphan" }));
        assert!(session.id.as_str().starts_with("session_"));
    }

    #[test]
    fn labels_fall_back_for_missing_fields() {
        let session = Session::from_raw(&json!({ "id": "x1" }));
        assert_eq!(session.title_label(), "Session x1");
        assert_eq!(session.date_label(), "TBD");
        assert_eq!(session.time_label(), "TBD");
    }

    #[test]
    fn placeholder_is_marked_missing() {
        let placeholder = Session::placeholder(EntityId::from("gone"));
        assert!(placeholder.missing);
        let value = serde_json::to_value(&placeholder).unwrap();
        assert_eq!(value["missing"], json!(true));
    }
}
