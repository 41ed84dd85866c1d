//! # 사용자(MSD) 모델
//!
//! 세션에 배정될 수 있는 스태프(Medical Science Director)를 나타냅니다.
//!
//! 사용자 목록 API는 필드 이름 규칙이 제각각입니다
//! (`user_id` / `USER_ID` / `ID`, `firstname` / `FIRST_NAME` / `FirstName` ...).
//! `User::from_raw()`가 고정된 별칭 목록을 순서대로 조회하여
//! 타입이 있는 레코드로 한 번에 정규화합니다.

use crate::models::EntityId;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const ID_ALIASES: &[&str] = &["user_id", "id", "USER_ID", "ID"];
const FIRST_NAME_ALIASES: &[&str] = &["firstname", "FIRSTNAME", "FIRST_NAME", "FirstName"];
const LAST_NAME_ALIASES: &[&str] = &["lastname", "LASTNAME", "LAST_NAME", "LastName"];
const FULL_NAME_ALIASES: &[&str] = &["name", "NAME", "FULL_NAME", "full_name"];
const EMAIL_ALIASES: &[&str] = &["email", "EMAIL"];
const DEPARTMENT_ALIASES: &[&str] = &["department", "DEPARTMENT"];
const ROLE_ALIASES: &[&str] = &["role", "ROLE"];
const ASSIGNED_DATE_ALIASES: &[&str] = &["assigned_date", "ASSIGNED_DATE", "AssignedDate"];
const CREATED_AT_ALIASES: &[&str] = &["created_at", "CREATED_AT", "CreatedAt"];

/// 기본 역할 이름
pub const DEFAULT_ROLE: &str = "MSD";

/// 정규화된 사용자 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub department: String,
    pub role: String,
    pub assigned_date: Option<String>,
    pub created_at: String,
}

impl User {
    /// 원본 사용자 레코드를 정규화합니다.
    ///
    /// # 매개변수
    /// - `raw`: API가 내려준 JSON 객체
    /// - `index`: 목록 내 위치. ID 필드가 전혀 없으면 `index + 1`을 ID로 사용
    ///
    /// # 이름 결정 규칙
    /// 1. 이름과 성이 모두 있으면 "이름 성"
    /// 2. 아니면 `name`/`NAME`/`FULL_NAME`/`full_name` 필드
    /// 3. 그것도 없으면 이메일의 `@` 앞부분
    pub fn from_raw(raw: &Map<String, Value>, index: usize) -> Self {
        let id = Self::raw_id(raw).unwrap_or_else(|| EntityId::new((index + 1).to_string()));

        let firstname = lookup(raw, FIRST_NAME_ALIASES).unwrap_or_default();
        let lastname = lookup(raw, LAST_NAME_ALIASES).unwrap_or_default();
        let email = lookup(raw, EMAIL_ALIASES).unwrap_or_default();

        let name = if !firstname.is_empty() && !lastname.is_empty() {
            format!("{firstname} {lastname}").trim().to_string()
        } else if let Some(full) = lookup(raw, FULL_NAME_ALIASES) {
            full
        } else {
            email.split('@').next().unwrap_or_default().to_string()
        };

        Self {
            id,
            name,
            firstname,
            lastname,
            email,
            department: lookup(raw, DEPARTMENT_ALIASES).unwrap_or_default(),
            role: lookup(raw, ROLE_ALIASES).unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            assigned_date: lookup(raw, ASSIGNED_DATE_ALIASES),
            created_at: lookup(raw, CREATED_AT_ALIASES).unwrap_or_else(|| Utc::now().to_rfc3339()),
        }
    }

    /// 원본 레코드의 ID 필드. 별칭 중 하나도 없으면 `None`.
    pub fn raw_id(raw: &Map<String, Value>) -> Option<EntityId> {
        ID_ALIASES
            .iter()
            .find_map(|key| raw.get(*key).and_then(EntityId::from_value))
    }

    /// 보고서 정렬용 성(last name)
    /// 성 필드가 비어 있으면 전체 이름의 마지막 단어를 사용합니다.
    pub fn sort_lastname(&self) -> &str {
        if !self.lastname.is_empty() {
            &self.lastname
        } else {
            self.name.split_whitespace().last().unwrap_or_default()
        }
    }
}

/// 별칭 목록을 순서대로 조회하여 처음으로 비어 있지 않은 문자열 값을 반환합니다.
fn lookup(raw: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| match raw.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// 사용자 추가 요청 (`POST /tool/users`의 요청 본문)
#[derive(Debug, Deserialize)]
pub struct NewUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: String,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn normalizes_uppercase_database_rows() {
        let raw = object(json!({
            "USER_ID": 17,
            "FIRST_NAME": "Nadia",
            "LAST_NAME": "Okafor",
            "EMAIL": "nadia@example.com",
            "DEPARTMENT": "Medical Affairs"
        }));

        let user = User::from_raw(&raw, 0);
        assert_eq!(user.id, EntityId::from(17));
        assert_eq!(user.name, "Nadia Okafor");
        assert_eq!(user.department, "Medical Affairs");
        assert_eq!(user.role, DEFAULT_ROLE);
    }

    #[test]
    fn falls_back_to_full_name_then_email() {
        let with_full_name = object(json!({ "id": "a", "FULL_NAME": "Sam Ortiz", "email": "s@x.org" }));
        assert_eq!(User::from_raw(&with_full_name, 0).name, "Sam Ortiz");

        let email_only = object(json!({ "email": "jordan.lee@example.com" }));
        let user = User::from_raw(&email_only, 4);
        assert_eq!(user.name, "jordan.lee");
        assert_eq!(user.id, EntityId::from(5));
    }

    #[test]
    fn first_name_alone_does_not_make_a_name() {
        let raw = object(json!({ "firstname": "Kim", "name": "Kim Y." }));
        assert_eq!(User::from_raw(&raw, 0).name, "Kim Y.");
    }

    #[test]
    fn serialized_users_normalize_back_unchanged() {
        let raw = object(json!({ "user_id": 3, "firstname": "Ana", "lastname": "Silva", "email": "ana@x.org", "created_at": "2025-01-01" }));
        let user = User::from_raw(&raw, 0);
        let again = User::from_raw(&object(serde_json::to_value(&user).unwrap()), 9);
        assert_eq!(user, again);
    }

    #[test]
    fn sort_lastname_uses_last_word_when_missing() {
        let raw = object(json!({ "id": 1, "name": "Maria de la Cruz" }));
        assert_eq!(User::from_raw(&raw, 0).sort_lastname(), "Cruz");
    }
}
