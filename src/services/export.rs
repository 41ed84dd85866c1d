//! # 내보내기
//!
//! 배정 상태를 두 가지 형태로 내보냅니다.
//! - JSON 번들: 다른 도구로 옮기거나 백업하기 위한 전체 데이터
//! - 텍스트 보고서: 사람이 읽는 개인별 일정 + 세션별 참석자 목록

use crate::error::AppError;
use crate::models::{AssignmentMap, Session, User};
use crate::services::engine::AssignmentEngine;
use crate::services::schedule::{compare_dates, short_date};
use chrono::Utc;
use serde::Serialize;
use std::fmt::Write as _;

pub const TOOL_NAME: &str = "Conference Attendance Assignments";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportInfo {
    pub tool: &'static str,
    pub export_date: String,
    pub session_count: usize,
    pub user_count: usize,
    pub assignment_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle<'a> {
    pub export_info: ExportInfo,
    pub sessions: &'a [Session],
    pub users: &'a [User],
    pub assignments: &'a AssignmentMap,
}

pub fn export_bundle(engine: &AssignmentEngine) -> ExportBundle<'_> {
    ExportBundle {
        export_info: ExportInfo {
            tool: TOOL_NAME,
            export_date: Utc::now().to_rfc3339(),
            session_count: engine.sessions().len(),
            user_count: engine.users().len(),
            assignment_count: engine.assignments().total(),
        },
        sessions: engine.sessions(),
        users: engine.users(),
        assignments: engine.assignments(),
    }
}

fn by_date(a: &&Session, b: &&Session) -> std::cmp::Ordering {
    compare_dates(a.date.as_deref(), b.date.as_deref())
}

/// 텍스트 보고서를 만듭니다. 사용자가 한 명도 없으면 `BadRequest`.
///
/// 로드된 목록에서 찾을 수 없는 세션은 보고서에서 빠집니다.
pub fn text_report(engine: &AssignmentEngine) -> Result<String, AppError> {
    if engine.users().is_empty() {
        return Err(AppError::BadRequest(
            "No users to generate reports for".to_string(),
        ));
    }

    let assignments = engine.assignments();
    let mut report = String::new();

    // String에 대한 write!는 실패하지 않으므로 결과를 버립니다.
    let _ = writeln!(report, "Conference Assignment Report");
    let _ = writeln!(report, "{}", "=".repeat(50));
    let _ = writeln!(report, "Generated: {}", Utc::now().format("%Y-%m-%d"));
    let _ = writeln!(
        report,
        "Sessions: {} | Users: {} | Assignments: {}\n",
        engine.sessions().len(),
        engine.users().len(),
        assignments.total()
    );

    let _ = writeln!(report, "INDIVIDUAL SCHEDULES");
    let _ = writeln!(report, "{}\n", "-".repeat(30));

    for user in engine.users() {
        let mut sessions: Vec<&Session> = engine
            .user_assignments(&user.id)
            .iter()
            .filter_map(|id| engine.find_session(id))
            .collect();
        sessions.sort_by(by_date);

        let _ = writeln!(report, "{} ({})", user.name, user.email);
        if !user.department.is_empty() {
            let _ = writeln!(report, "{}", user.department);
        }
        let _ = writeln!(report, "Role: {}", user.role);
        let _ = writeln!(report, "Sessions: {}\n", sessions.len());

        if sessions.is_empty() {
            let _ = writeln!(report, "  No sessions assigned\n");
        }
        for session in sessions {
            let _ = writeln!(report, "  • {}", session.title_label());
            let _ = writeln!(
                report,
                "    {} | {}",
                short_date(session.date.as_deref()),
                session.time_label()
            );
            let _ = writeln!(report, "    📍 {}\n", session.location_label());
        }
        report.push('\n');
    }

    let _ = writeln!(report, "\n\nSESSION ATTENDANCE");
    let _ = writeln!(report, "{}\n", "-".repeat(30));

    let mut attended: Vec<&Session> = engine
        .sessions()
        .iter()
        .filter(|s| !assignments.assignees(&s.id).is_empty())
        .collect();
    attended.sort_by(by_date);

    for session in attended {
        let mut attendees: Vec<&User> = assignments
            .assignees(&session.id)
            .iter()
            .filter_map(|id| engine.find_user(id))
            .collect();
        attendees.sort_by(|a, b| a.sort_lastname().cmp(b.sort_lastname()));

        let _ = writeln!(report, "{}", session.title_label());
        let _ = writeln!(
            report,
            "{} | {}",
            short_date(session.date.as_deref()),
            session.time_label()
        );
        let _ = writeln!(report, "📍 {}", session.location_label());
        let _ = writeln!(report, "Attendees ({}):", attendees.len());
        for user in attendees {
            let _ = writeln!(report, "  • {} ({}) - {}", user.name, user.email, user.role);
        }
        report.push('\n');
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityId;
    use serde_json::{json, Value};

    fn engine() -> AssignmentEngine {
        let sessions = vec![
            Session::from_raw(&json!({
                "session_id": "late", "title": "Closing",
                "date": "Tuesday, October 21, 2025", "time": "4:00 PM", "type": "Symposium"
            })),
            Session::from_raw(&json!({
                "session_id": "early", "title": "Opening",
                "date": "Sunday, October 19, 2025", "time": "8:00 AM", "location": "Hall A"
            })),
        ];
        let users = [
            json!({ "id": 1, "firstname": "Zoe", "lastname": "Young", "email": "z@x.org" }),
            json!({ "id": 2, "firstname": "Ada", "lastname": "Byron", "email": "a@x.org", "department": "Medical Affairs" }),
        ]
        .iter()
        .enumerate()
        .map(|(i, v)| match v {
            Value::Object(map) => User::from_raw(map, i),
            _ => unreachable!(),
        })
        .collect();
        let assignments: AssignmentMap = [
            (EntityId::from("late"), EntityId::from(1)),
            (EntityId::from("early"), EntityId::from(1)),
            (EntityId::from("early"), EntityId::from(2)),
            (EntityId::from("gone"), EntityId::from(2)),
        ]
        .into_iter()
        .collect();
        AssignmentEngine::new(sessions, users, assignments)
    }

    #[test]
    fn bundle_counts_every_assignment() {
        let engine = engine();
        let value = serde_json::to_value(export_bundle(&engine)).unwrap();
        assert_eq!(value["exportInfo"]["assignmentCount"], json!(4));
        assert_eq!(value["exportInfo"]["userCount"], json!(2));
        assert_eq!(value["assignments"]["early"], json!(["1", "2"]));
    }

    #[test]
    fn report_sorts_schedules_by_date_and_attendees_by_last_name() {
        let report = text_report(&engine()).unwrap();

        let schedules = report.find("INDIVIDUAL SCHEDULES").unwrap();
        let attendance = report.find("SESSION ATTENDANCE").unwrap();
        assert!(schedules < attendance);

        let zoe = &report[schedules..attendance];
        assert!(zoe.find("• Opening").unwrap() < zoe.find("• Closing").unwrap());
        assert!(zoe.contains("Sun Oct 19 | 8:00 AM"));
        assert!(zoe.contains("Medical Affairs"));

        let by_session = &report[attendance..];
        assert!(by_session.find("Opening").unwrap() < by_session.find("Closing").unwrap());
        assert!(by_session.find("Ada Byron").unwrap() < by_session.find("Zoe Young").unwrap());
        assert!(by_session.contains("Attendees (2):"));
        assert!(!report.contains("gone"));
    }

    #[test]
    fn report_requires_users() {
        let engine = AssignmentEngine::default();
        assert!(matches!(text_report(&engine), Err(AppError::BadRequest(_))));
    }
}
