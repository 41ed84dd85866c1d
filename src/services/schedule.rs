//! # 일정 정렬 & 필터
//!
//! 세션의 날짜/시간은 자유 형식 문자열입니다 ("Sunday, October 19, 2025", "8:00 AM - 12:00 PM").
//! 이 모듈은 화면 정렬과 필터링에 필요한 해석만 담당합니다.
//! 배정 충돌 판정은 여기의 해석을 쓰지 않고 원본 문자열을 그대로 비교합니다.

use crate::models::Session;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// 지원하는 날짜 형식 (앞에서부터 시도)
const DATE_FORMATS: &[&str] = &["%A, %B %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

/// 자유 형식 날짜 문자열을 해석합니다. 실패하면 `None`.
pub fn parse_date(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(label, format).ok())
}

/// 날짜 정렬: 해석 가능한 날짜는 시간순, 해석 불가/없음은 맨 뒤 (그 안에서는 문자열순)
pub fn compare_dates(a: Option<&str>, b: Option<&str>) -> Ordering {
    let key = |label: Option<&str>| label.and_then(parse_date);
    match (key(a), key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(&b),
    }
}

/// 시간 범위의 시작 시각을 자정 기준 분(minute)으로 바꿉니다.
///
/// "8:00 AM - 12:00 PM" → 480, "1:30 pm" → 810, "14:05" → 845
/// "TBD"나 해석할 수 없는 값은 `None`.
pub fn start_minutes(time: &str) -> Option<u32> {
    let start = time.split('-').next()?.trim();
    if start.is_empty() || start.eq_ignore_ascii_case("TBD") {
        return None;
    }

    let (clock, meridiem) = match start.split_once(char::is_whitespace) {
        Some((clock, rest)) => (clock, rest.trim().to_ascii_lowercase()),
        None => {
            // "9:00AM"처럼 붙어 있는 경우
            let lower = start.to_ascii_lowercase();
            match lower.strip_suffix("am").or_else(|| lower.strip_suffix("pm")) {
                Some(clock) => (&start[..clock.len()], lower[clock.len()..].to_string()),
                None => (start, String::new()),
            }
        }
    };

    let (hours, minutes) = clock.split_once(':')?;
    let mut hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().get(..2)?.parse().ok()?;

    match meridiem.as_str() {
        "pm" if hours != 12 => hours += 12,
        "am" if hours == 12 => hours = 0,
        _ => {}
    }

    Some(hours * 60 + minutes)
}

/// 시간 문자열 정렬: 시작 시각순, TBD/해석 불가는 맨 뒤
pub fn compare_times(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a.and_then(start_minutes), b.and_then(start_minutes)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// "Sunday, October 19, 2025" → "Sun Oct 19"
pub fn short_date(label: Option<&str>) -> String {
    let Some(label) = label else {
        return "TBD".to_string();
    };

    let parts: Vec<&str> = label.split(", ").collect();
    if parts.len() >= 2 {
        let month_day: Vec<&str> = parts[1].split(' ').collect();
        if month_day.len() >= 2 {
            let day: String = parts[0].chars().take(3).collect();
            let month: String = month_day[0].chars().take(3).collect();
            return format!("{day} {month} {}", month_day[1]);
        }
    }
    label.to_string()
}

/// 세션 필터 상태 (저장되지 않는 일시 상태)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionFilter {
    /// 제목, 장소, 연사 이름에 대한 부분 일치 (대소문자 무시)
    pub search: Option<String>,
    /// 날짜 완전 일치
    pub date: Option<String>,
    /// 유형 완전 일치
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// 필터 결과
#[derive(Debug, Clone, Serialize)]
pub struct FilteredSessions<'a> {
    pub sessions: Vec<&'a Session>,
    /// 전체 목록의 날짜 옵션 (시간순)
    pub dates: Vec<String>,
    /// 검색어+날짜로 걸러진 목록에 존재하는 유형 옵션 (정렬)
    pub types: Vec<String>,
}

impl SessionFilter {
    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    fn matches_search_and_date(&self, session: &Session, term: Option<&str>) -> bool {
        if let Some(term) = term {
            let contains = |value: Option<&str>| {
                value.is_some_and(|v| v.to_lowercase().contains(term))
            };
            let speaker_hit = session
                .speakers
                .iter()
                .any(|name| name.to_lowercase().contains(term));
            if !contains(session.title.as_deref())
                && !contains(session.location.as_deref())
                && !speaker_hit
            {
                return false;
            }
        }

        match self.date.as_deref().filter(|d| !d.is_empty()) {
            Some(date) => session.date.as_deref() == Some(date),
            None => true,
        }
    }

    /// 필터를 적용합니다.
    ///
    /// 유형 옵션은 검색어+날짜 필터까지만 적용한 목록에서 뽑습니다.
    /// 그래야 선택 가능한 유형이 현재 검색 결과와 어긋나지 않습니다.
    pub fn apply<'a>(&self, sessions: &'a [Session]) -> FilteredSessions<'a> {
        let term = self.search_term();
        let available: Vec<&Session> = sessions
            .iter()
            .filter(|s| self.matches_search_and_date(s, term.as_deref()))
            .collect();

        let types: BTreeSet<String> = available.iter().filter_map(|s| s.kind.clone()).collect();

        let kind = self.kind.as_deref().filter(|k| !k.is_empty());
        let filtered = available
            .into_iter()
            .filter(|s| kind.is_none() || s.kind.as_deref() == kind)
            .collect();

        FilteredSessions {
            sessions: filtered,
            dates: date_options(sessions),
            types: types.into_iter().collect(),
        }
    }
}

/// 날짜 필터 옵션: 중복 없는 날짜를 시간순으로
pub fn date_options(sessions: &[Session]) -> Vec<String> {
    let unique: BTreeSet<&str> = sessions.iter().filter_map(|s| s.date.as_deref()).collect();
    let mut dates: Vec<String> = unique.into_iter().map(str::to_string).collect();
    dates.sort_by(|a, b| compare_dates(Some(a), Some(b)));
    dates
}

/// 날짜 → 시간대 → 세션 묶음
#[derive(Debug, Clone, Serialize)]
pub struct DateGroup<'a> {
    pub date: String,
    pub time_slots: Vec<TimeSlot<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSlot<'a> {
    pub time: String,
    pub sessions: Vec<&'a Session>,
}

/// 세션을 날짜별, 시간대별로 묶습니다. 날짜는 시간순, 시간대는 시작 시각순이며 TBD는 맨 뒤.
pub fn group_by_slot<'a>(sessions: &[&'a Session]) -> Vec<DateGroup<'a>> {
    let mut groups: Vec<DateGroup<'a>> = Vec::new();

    for session in sessions {
        let date = session.date_label().to_string();
        let time = session.time_label().to_string();

        let group = match groups.iter().position(|g| g.date == date) {
            Some(index) => &mut groups[index],
            None => {
                groups.push(DateGroup { date, time_slots: Vec::new() });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };

        match group.time_slots.iter_mut().find(|slot| slot.time == time) {
            Some(slot) => slot.sessions.push(session),
            None => group.time_slots.push(TimeSlot { time, sessions: vec![session] }),
        }
    }

    let tbd_last = |value: &str| value == "TBD";
    groups.sort_by(|a, b| match (tbd_last(&a.date), tbd_last(&b.date)) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => compare_dates(Some(&a.date), Some(&b.date)),
    });
    for group in &mut groups {
        group
            .time_slots
            .sort_by(|a, b| compare_times(Some(&a.time), Some(&b.time)));
    }

    groups
}
