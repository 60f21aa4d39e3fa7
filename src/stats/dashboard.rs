use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::{AttendanceLine, MemberLine};
use crate::models::{AttendanceStatus, MemberStatus, Position};
use crate::utils::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionCount {
    pub position: Position,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamComposition {
    pub total_members: usize,
    pub positions: Vec<PositionCount>,
}

/// Headcount per position. A member holding several positions is counted
/// under each of them, so the position counts can sum past the headcount.
pub fn team_composition(members: &[MemberLine]) -> TeamComposition {
    let positions = [Position::Gk, Position::Df, Position::Mf, Position::Fw]
        .into_iter()
        .map(|position| PositionCount {
            position,
            count: members.iter().filter(|m| m.positions.contains(&position)).count(),
        })
        .collect();

    TeamComposition {
        total_members: members.len(),
        positions,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub scheduled_matches: usize,
    pub attending: usize,
    pub late: usize,
    pub absent: usize,
    pub maybe: usize,
}

/// Vote counts across the currently scheduled matches. `not_attending` and
/// `absent` are both reported as absent.
pub fn attendance_summary(scheduled_matches: usize, votes: &[AttendanceLine]) -> AttendanceSummary {
    let count = |wanted: &[AttendanceStatus]| votes.iter().filter(|v| wanted.contains(&v.status)).count();
    AttendanceSummary {
        scheduled_matches,
        attending: count(&[AttendanceStatus::Attending]),
        late: count(&[AttendanceStatus::Late]),
        absent: count(&[AttendanceStatus::Absent, AttendanceStatus::NotAttending]),
        maybe: count(&[AttendanceStatus::Maybe]),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub total_members: usize,
    pub active_members: usize,
    pub average_age: f64,
    pub average_attendance: f64,
}

/// Average age covers active members with a known birthdate.
pub fn roster_summary(members: &[MemberLine], today: NaiveDate) -> RosterSummary {
    let ages: Vec<i32> = members
        .iter()
        .filter(|m| m.status == MemberStatus::Active)
        .filter_map(|m| m.birthdate)
        .map(|birthdate| age_on(birthdate, today))
        .collect();
    let average_age = if ages.is_empty() {
        0.0
    } else {
        round_to(ages.iter().sum::<i32>() as f64 / ages.len() as f64, 1)
    };

    RosterSummary {
        total_members: members.len(),
        active_members: members
            .iter()
            .filter(|m| m.status == MemberStatus::Active)
            .count(),
        average_age,
        // not tracked per member; reported as zero
        average_attendance: 0.0,
    }
}

/// Whole years between `birthdate` and `today`.
fn age_on(birthdate: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn member(positions: Vec<Position>, birthdate: Option<NaiveDate>, status: MemberStatus) -> MemberLine {
        MemberLine {
            user_id: Uuid::new_v4(),
            name: "player".into(),
            status,
            birthdate,
            positions,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn members_count_once_per_position() {
        let members = vec![
            member(vec![Position::Gk], None, MemberStatus::Active),
            member(vec![Position::Df, Position::Mf], None, MemberStatus::Active),
            member(vec![Position::Mf], None, MemberStatus::Injured),
        ];
        let composition = team_composition(&members);
        assert_eq!(composition.total_members, 3);
        let counts: Vec<usize> = composition.positions.iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![1, 1, 2, 0]);
    }

    #[test]
    fn not_attending_counts_as_absent() {
        let vote = |status| AttendanceLine {
            match_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status,
        };
        let votes = vec![
            vote(AttendanceStatus::Attending),
            vote(AttendanceStatus::NotAttending),
            vote(AttendanceStatus::Absent),
            vote(AttendanceStatus::Late),
            vote(AttendanceStatus::Maybe),
        ];
        let summary = attendance_summary(2, &votes);
        assert_eq!(summary.scheduled_matches, 2);
        assert_eq!((summary.attending, summary.late, summary.absent, summary.maybe), (1, 1, 2, 1));
    }

    #[test]
    fn age_accounts_for_birthday_not_yet_reached() {
        assert_eq!(age_on(date(1990, 6, 15), date(2024, 6, 14)), 33);
        assert_eq!(age_on(date(1990, 6, 15), date(2024, 6, 15)), 34);
    }

    #[test]
    fn roster_summary_averages_active_ages() {
        let today = date(2024, 1, 1);
        let members = vec![
            member(vec![], Some(date(1994, 1, 1)), MemberStatus::Active),
            member(vec![], Some(date(1999, 6, 1)), MemberStatus::Active),
            member(vec![], Some(date(1980, 1, 1)), MemberStatus::Injured),
            member(vec![], None, MemberStatus::Active),
        ];
        let summary = roster_summary(&members, today);
        // 30 and 24; the injured member is left out
        assert_eq!(summary.total_members, 4);
        assert_eq!(summary.active_members, 3);
        assert_eq!(summary.average_age, 27.0);
        assert_eq!(summary.average_attendance, 0.0);
    }
}
