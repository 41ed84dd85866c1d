//! # 식별자(ID) 모델
//!
//! 세션 ID와 사용자 ID는 데이터 소스마다 표현이 다릅니다.
//! 어떤 API는 `42`(숫자)로, 어떤 API는 `"42"`(문자열)로 내려줍니다.
//!
//! `EntityId`는 이 둘을 **문자열 표현 하나로 정규화**해서 저장합니다.
//! 그래서 `==` 비교, 해시, 정렬이 모두 "문자열 표현이 같으면 같은 ID"라는
//! 규칙을 자동으로 따릅니다. 호출하는 쪽에서 숫자/문자열을 신경 쓸 필요가 없습니다.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// 문자열로 정규화된 엔티티 식별자
///
/// `#[serde(transparent)]` 대신 직렬화는 derive, 역직렬화는 직접 구현합니다.
/// 숫자로 들어온 ID도 받아들여야 하기 때문입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON 값 하나를 ID로 변환합니다.
    ///
    /// - 문자열: 공백을 제거한 뒤 비어 있지 않으면 그대로 사용
    /// - 숫자: 문자열 표현으로 변환 (`42`, `42.0` → `"42"`)
    /// - null, 빈 문자열, 불리언, 배열, 객체: `None` (대체 체인의 다음 후보로 넘어감)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            Value::Number(n) => Some(Self(number_to_string(n))),
            _ => None,
        }
    }

    /// 숫자로 해석 가능한 ID라면 그 값을 반환합니다. (새 사용자 ID 계산용)
    pub fn as_number(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

/// serde_json 숫자를 사람이 쓰는 형태의 문자열로 바꿉니다.
///
/// 정수는 그대로, 소수점 아래가 0인 실수는 정수처럼 표시합니다.
/// f64의 Display 구현이 `42.0`을 `"42"`로 출력하므로 별도 처리가 필요 없습니다.
fn number_to_string(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

// 숫자와 문자열을 모두 받아들이는 역직렬화
// 먼저 serde_json::Value로 읽은 뒤 from_value로 정규화합니다.
impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        EntityId::from_value(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("expected a string or numeric id, got {value}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_forms_are_equal() {
        let a: EntityId = serde_json::from_value(json!(42)).unwrap();
        let b: EntityId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, EntityId::from(42));
    }

    #[test]
    fn whole_floats_normalize_to_integers() {
        assert_eq!(EntityId::from_value(&json!(42.0)).unwrap().as_str(), "42");
        assert_eq!(EntityId::from_value(&json!(4.5)).unwrap().as_str(), "4.5");
    }

    #[test]
    fn empty_and_null_values_are_not_ids() {
        assert!(EntityId::from_value(&json!("")).is_none());
        assert!(EntityId::from_value(&json!("   ")).is_none());
        assert!(EntityId::from_value(&Value::Null).is_none());
        assert!(serde_json::from_value::<EntityId>(json!(null)).is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = EntityId::from(7);
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("7"));
    }
}
