use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use super::{AttendanceLine, MemberLine, RecordLine};
use crate::models::{AttendanceStatus, GameResult};

pub const ATTENDANCE_RANKING_LIMIT: usize = 5;
pub const TOP10_LIMIT: usize = 10;
pub const WIN_RATE_MIN_GAMES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: usize,
    pub user_id: Uuid,
    pub user_name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinRateEntry {
    pub rank: usize,
    pub user_id: Uuid,
    pub user_name: String,
    pub value: f64,
    pub total_games: i64,
    pub wins: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rankings {
    pub attendance: Vec<RankingEntry>,
    pub games: Vec<RankingEntry>,
    pub goals: Vec<RankingEntry>,
    pub assists: Vec<RankingEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Top10 {
    pub attendance: Vec<RankingEntry>,
    pub game_appearances: Vec<RankingEntry>,
    pub goals: Vec<RankingEntry>,
    pub assists: Vec<RankingEntry>,
    pub win_rates: Vec<WinRateEntry>,
}

/// Running per-user totals that remember the order users were first seen in,
/// so ties keep the order of the underlying rows.
struct Tally {
    order: Vec<Uuid>,
    totals: HashMap<Uuid, i64>,
}

impl Tally {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            totals: HashMap::new(),
        }
    }

    fn add(&mut self, user_id: Uuid, amount: i64) {
        let total = self.totals.entry(user_id).or_insert_with(|| {
            self.order.push(user_id);
            0
        });
        *total += amount;
    }

    fn into_sorted(self) -> Vec<(Uuid, i64)> {
        let mut pairs: Vec<(Uuid, i64)> = self
            .order
            .into_iter()
            .map(|id| (id, self.totals[&id]))
            .collect();
        // stable: equal totals keep first-seen order
        pairs.sort_by(|a, b| b.1.cmp(&a.1));
        pairs
    }
}

fn names(members: &[MemberLine]) -> HashMap<Uuid, &str> {
    members.iter().map(|m| (m.user_id, m.name.as_str())).collect()
}

fn display_name(names: &HashMap<Uuid, &str>, user_id: &Uuid) -> String {
    names.get(user_id).copied().unwrap_or("Unknown").to_string()
}

fn enrich(members: &[MemberLine], pairs: Vec<(Uuid, i64)>, limit: usize) -> Vec<RankingEntry> {
    let names = names(members);
    pairs
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (user_id, value))| RankingEntry {
            rank: i + 1,
            user_name: display_name(&names, &user_id),
            user_id,
            value,
        })
        .collect()
}

/// Attending votes per user; `attendances` should cover the team's finished
/// matches only.
pub fn rank_attendance(
    members: &[MemberLine],
    attendances: &[AttendanceLine],
    limit: usize,
) -> Vec<RankingEntry> {
    let mut tally = Tally::new();
    for a in attendances {
        tally.add(a.user_id, (a.status == AttendanceStatus::Attending) as i64);
    }
    enrich(members, tally.into_sorted(), limit)
}

/// Distinct games with `played = true` per user.
pub fn rank_games_played(members: &[MemberLine], records: &[RecordLine], limit: usize) -> Vec<RankingEntry> {
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();
    let mut tally = Tally::new();
    for r in records.iter().filter(|r| r.played) {
        let Some(game_id) = r.game_id else {
            // still register the user so they rank with zero games
            tally.add(r.user_id, 0);
            continue;
        };
        let first = seen.insert((r.user_id, game_id));
        tally.add(r.user_id, first as i64);
    }
    enrich(members, tally.into_sorted(), limit)
}

pub fn rank_goals(members: &[MemberLine], records: &[RecordLine], limit: usize) -> Vec<RankingEntry> {
    let mut tally = Tally::new();
    for r in records {
        tally.add(r.user_id, r.goals as i64);
    }
    enrich(members, tally.into_sorted(), limit)
}

pub fn rank_assists(members: &[MemberLine], records: &[RecordLine], limit: usize) -> Vec<RankingEntry> {
    let mut tally = Tally::new();
    for r in records {
        tally.add(r.user_id, r.assists as i64);
    }
    enrich(members, tally.into_sorted(), limit)
}

/// Won games over distinct games played, for users with at least
/// `min_games` games.
pub fn rank_win_rate(
    members: &[MemberLine],
    records: &[RecordLine],
    min_games: i64,
    limit: usize,
) -> Vec<WinRateEntry> {
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();
    let mut games = Tally::new();
    let mut wins: HashMap<Uuid, i64> = HashMap::new();

    for r in records.iter().filter(|r| r.played) {
        let Some(game_id) = r.game_id else { continue };
        if !seen.insert((r.user_id, game_id)) {
            continue;
        }
        games.add(r.user_id, 1);
        if r.game_result == Some(GameResult::Win) {
            *wins.entry(r.user_id).or_insert(0) += 1;
        }
    }

    let mut rates: Vec<(Uuid, i64, i64, f64)> = games
        .into_sorted()
        .into_iter()
        .filter(|(_, total)| *total >= min_games)
        .map(|(user_id, total)| {
            let won = wins.get(&user_id).copied().unwrap_or(0);
            (user_id, total, won, won as f64 / total as f64)
        })
        .collect();
    rates.sort_by(|a, b| b.3.total_cmp(&a.3));

    let names = names(members);
    rates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (user_id, total_games, wins, rate))| WinRateEntry {
            rank: i + 1,
            user_name: display_name(&names, &user_id),
            user_id,
            value: rate,
            total_games,
            wins,
        })
        .collect()
}

pub fn rankings(members: &[MemberLine], records: &[RecordLine], attendances: &[AttendanceLine]) -> Rankings {
    let limit = ATTENDANCE_RANKING_LIMIT;
    Rankings {
        attendance: rank_attendance(members, attendances, limit),
        games: rank_games_played(members, records, limit),
        goals: rank_goals(members, records, limit),
        assists: rank_assists(members, records, limit),
    }
}

pub fn top10(members: &[MemberLine], records: &[RecordLine], attendances: &[AttendanceLine]) -> Top10 {
    Top10 {
        attendance: rank_attendance(members, attendances, TOP10_LIMIT),
        game_appearances: rank_games_played(members, records, TOP10_LIMIT),
        goals: rank_goals(members, records, TOP10_LIMIT),
        assists: rank_assists(members, records, TOP10_LIMIT),
        win_rates: rank_win_rate(members, records, WIN_RATE_MIN_GAMES, TOP10_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberStatus;

    fn member(name: &str) -> MemberLine {
        MemberLine {
            user_id: Uuid::new_v4(),
            name: name.into(),
            status: MemberStatus::Active,
            birthdate: None,
            positions: vec![],
        }
    }

    fn played(user_id: Uuid, game_id: Uuid, result: GameResult) -> RecordLine {
        RecordLine {
            user_id,
            game_id: Some(game_id),
            played: true,
            goals: 0,
            assists: 0,
            goal_type: None,
            game_result: Some(result),
        }
    }

    #[test]
    fn distinct_games_are_counted_once() {
        let m = member("Kim");
        let g = Uuid::new_v4();
        let records = vec![
            played(m.user_id, g, GameResult::Win),
            played(m.user_id, g, GameResult::Win),
            played(m.user_id, Uuid::new_v4(), GameResult::Loss),
        ];
        let ranking = rank_games_played(&[m], &records, 5);
        assert_eq!(ranking[0].value, 2);
    }

    #[test]
    fn unplayed_records_do_not_count_as_appearances() {
        let m = member("Lee");
        let mut r = played(m.user_id, Uuid::new_v4(), GameResult::Win);
        r.played = false;
        assert!(rank_games_played(&[m], &[r], 5).is_empty());
    }

    #[test]
    fn attendance_counts_only_attending_votes() {
        let a = member("A");
        let b = member("B");
        let vote = |user_id, status| AttendanceLine {
            match_id: Uuid::new_v4(),
            user_id,
            status,
        };
        let votes = vec![
            vote(a.user_id, AttendanceStatus::Late),
            vote(b.user_id, AttendanceStatus::Attending),
            vote(b.user_id, AttendanceStatus::Attending),
            vote(a.user_id, AttendanceStatus::Attending),
        ];
        let ranking = rank_attendance(&[a.clone(), b.clone()], &votes, 5);
        assert_eq!(ranking[0].user_id, b.user_id);
        assert_eq!(ranking[0].value, 2);
        assert_eq!(ranking[1].user_id, a.user_id);
        assert_eq!(ranking[1].value, 1);
    }

    #[test]
    fn limit_truncates_and_ranks_from_one() {
        let members: Vec<MemberLine> = (0..8).map(|i| member(&format!("p{}", i))).collect();
        let records: Vec<RecordLine> = members
            .iter()
            .enumerate()
            .map(|(i, m)| RecordLine {
                goals: i as i32,
                ..played(m.user_id, Uuid::new_v4(), GameResult::Draw)
            })
            .collect();
        let ranking = rank_goals(&members, &records, ATTENDANCE_RANKING_LIMIT);
        assert_eq!(ranking.len(), 5);
        assert_eq!(ranking.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(ranking[0].value, 7);
    }

    #[test]
    fn win_rate_requires_minimum_games() {
        let veteran = member("Veteran");
        let rookie = member("Rookie");
        let mut records = Vec::new();
        for i in 0..5 {
            let result = if i < 3 { GameResult::Win } else { GameResult::Loss };
            records.push(played(veteran.user_id, Uuid::new_v4(), result));
        }
        for _ in 0..4 {
            records.push(played(rookie.user_id, Uuid::new_v4(), GameResult::Win));
        }

        let ranking = rank_win_rate(&[veteran.clone(), rookie], &records, WIN_RATE_MIN_GAMES, 10);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].user_id, veteran.user_id);
        assert_eq!(ranking[0].total_games, 5);
        assert_eq!(ranking[0].wins, 3);
        assert!((ranking[0].value - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn win_rates_sort_descending() {
        let a = member("A");
        let b = member("B");
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(played(a.user_id, Uuid::new_v4(), if i == 0 { GameResult::Win } else { GameResult::Loss }));
            records.push(played(b.user_id, Uuid::new_v4(), GameResult::Win));
        }
        let ranking = rank_win_rate(&[a, b.clone()], &records, 5, 10);
        assert_eq!(ranking[0].user_id, b.user_id);
        assert_eq!(ranking[0].value, 1.0);
        assert_eq!(ranking[1].value, 0.2);
    }
}
