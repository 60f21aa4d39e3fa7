use serde::Serialize;

use super::{GameLine, MatchLine, RecordLine};
use crate::models::{GameResult, GoalType};
use crate::utils::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatistics {
    pub match_count: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals_per_match: f64,
    pub opponent_goals_per_match: f64,
    pub clean_sheet_ratio: f64,
    pub no_goal_ratio: f64,
    pub clean_sheet_matches: usize,
    pub no_goal_matches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatistics {
    pub game_count: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals_per_game: f64,
    pub opponent_goals_per_game: f64,
    pub clean_sheet_ratio: f64,
    pub no_goal_ratio: f64,
    pub clean_sheet_games: usize,
    pub no_goal_games: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalStatistics {
    pub total_goals: i64,
    pub total_opponent_goals: i64,
    pub goal_difference: i64,
    pub total_assists: i64,
    pub field_goals: usize,
    pub free_kick_goals: usize,
    pub penalty_goals: usize,
    pub own_goals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatistics {
    pub match_statistics: MatchStatistics,
    pub game_statistics: GameStatistics,
    pub total_statistics: TotalStatistics,
}

/// `finished` holds the team's finished matches with their games; `records`
/// holds every record of the team's matches whatever their status.
pub fn team_statistics(finished: &[MatchLine], records: &[RecordLine]) -> TeamStatistics {
    let games: Vec<&GameLine> = finished.iter().flat_map(|m| m.games.iter()).collect();
    let game_statistics = game_statistics(&games);

    let total_goals: i64 = records.iter().map(|r| r.goals as i64).sum();
    let total_assists: i64 = records.iter().map(|r| r.assists as i64).sum();
    let total_opponent_goals: i64 = games.iter().map(|g| g.opponent_score as i64).sum();
    let count_type = |kind: GoalType| records.iter().filter(|r| r.goal_type == Some(kind)).count();

    TeamStatistics {
        match_statistics: match_statistics(finished),
        game_statistics,
        total_statistics: TotalStatistics {
            total_goals,
            total_opponent_goals,
            goal_difference: total_goals - total_opponent_goals,
            total_assists,
            field_goals: count_type(GoalType::Field),
            free_kick_goals: count_type(GoalType::FreeKick),
            penalty_goals: count_type(GoalType::Penalty),
            own_goals: count_type(GoalType::OwnGoal),
        },
    }
}

/// A match is won when any of its games is won and drawn only when every game
/// is drawn; everything else is a loss. A match without games counts as a draw.
fn match_statistics(matches: &[MatchLine]) -> MatchStatistics {
    let match_count = matches.len();
    let wins = matches
        .iter()
        .filter(|m| m.games.iter().any(|g| g.result == GameResult::Win))
        .count();
    let draws = matches
        .iter()
        .filter(|m| m.games.iter().all(|g| g.result == GameResult::Draw))
        .count();
    let losses = match_count - wins - draws;

    let goals: i64 = matches.iter().map(|m| m.total_our_score.unwrap_or(0) as i64).sum();
    let opponent_goals: i64 = matches
        .iter()
        .map(|m| m.total_opponent_score.unwrap_or(0) as i64)
        .sum();
    let clean_sheet_matches = matches
        .iter()
        .filter(|m| m.total_opponent_score.unwrap_or(0) == 0)
        .count();
    let no_goal_matches = matches
        .iter()
        .filter(|m| m.total_our_score.unwrap_or(0) == 0)
        .count();

    MatchStatistics {
        match_count,
        wins,
        draws,
        losses,
        goals_per_match: round_to(ratio(goals as f64, match_count), 1),
        opponent_goals_per_match: round_to(ratio(opponent_goals as f64, match_count), 1),
        clean_sheet_ratio: round_to(ratio(clean_sheet_matches as f64, match_count), 2),
        no_goal_ratio: round_to(ratio(no_goal_matches as f64, match_count), 2),
        clean_sheet_matches,
        no_goal_matches,
    }
}

fn game_statistics(games: &[&GameLine]) -> GameStatistics {
    let game_count = games.len();
    let count = |result: GameResult| games.iter().filter(|g| g.result == result).count();

    let goals: i64 = games.iter().map(|g| g.our_score as i64).sum();
    let opponent_goals: i64 = games.iter().map(|g| g.opponent_score as i64).sum();
    let clean_sheet_games = games.iter().filter(|g| g.opponent_score == 0).count();
    let no_goal_games = games.iter().filter(|g| g.our_score == 0).count();

    GameStatistics {
        game_count,
        wins: count(GameResult::Win),
        draws: count(GameResult::Draw),
        losses: count(GameResult::Loss),
        goals_per_game: round_to(ratio(goals as f64, game_count), 1),
        opponent_goals_per_game: round_to(ratio(opponent_goals as f64, game_count), 1),
        clean_sheet_ratio: round_to(ratio(clean_sheet_games as f64, game_count), 2),
        no_goal_ratio: round_to(ratio(no_goal_games as f64, game_count), 2),
        clean_sheet_games,
        no_goal_games,
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn game(match_id: Uuid, our: i32, opp: i32) -> GameLine {
        GameLine {
            match_id,
            our_score: our,
            opponent_score: opp,
            result: GameResult::from_scores(our, opp),
        }
    }

    fn finished(scores: &[(i32, i32)]) -> MatchLine {
        let id = Uuid::new_v4();
        let games: Vec<GameLine> = scores.iter().map(|(o, p)| game(id, *o, *p)).collect();
        MatchLine {
            id,
            total_our_score: Some(games.iter().map(|g| g.our_score).sum()),
            total_opponent_score: Some(games.iter().map(|g| g.opponent_score).sum()),
            games,
        }
    }

    fn record(goals: i32, goal_type: Option<GoalType>) -> RecordLine {
        RecordLine {
            user_id: Uuid::new_v4(),
            game_id: Some(Uuid::new_v4()),
            played: true,
            goals,
            assists: 1,
            goal_type,
            game_result: None,
        }
    }

    #[test]
    fn any_win_makes_a_match_win_and_only_all_draws_a_draw() {
        let a = finished(&[(2, 1), (1, 1)]);
        let b = finished(&[(0, 2)]);
        let stats = team_statistics(&[a, b], &[]);

        let m = &stats.match_statistics;
        assert_eq!((m.match_count, m.wins, m.draws, m.losses), (2, 1, 0, 1));

        let g = &stats.game_statistics;
        assert_eq!((g.game_count, g.wins, g.draws, g.losses), (3, 1, 1, 1));
    }

    #[test]
    fn mixed_draw_and_loss_is_a_loss() {
        let stats = team_statistics(&[finished(&[(1, 1), (0, 1)])], &[]);
        assert_eq!(stats.match_statistics.losses, 1);
        assert_eq!(stats.match_statistics.draws, 0);
    }

    #[test]
    fn match_without_games_counts_as_draw() {
        let empty = MatchLine {
            id: Uuid::new_v4(),
            total_our_score: None,
            total_opponent_score: None,
            games: vec![],
        };
        let stats = team_statistics(&[empty], &[]);
        assert_eq!(stats.match_statistics.draws, 1);
        assert_eq!(stats.match_statistics.clean_sheet_matches, 1);
        assert_eq!(stats.match_statistics.no_goal_matches, 1);
        assert_eq!(stats.game_statistics.game_count, 0);
        assert_eq!(stats.game_statistics.goals_per_game, 0.0);
    }

    #[test]
    fn ratios_use_separate_denominators() {
        // match A: 3-0 over two games (2-0, 1-0); match B: 0-1 in one game
        let stats = team_statistics(&[finished(&[(2, 0), (1, 0)]), finished(&[(0, 1)])], &[]);

        let m = &stats.match_statistics;
        assert_eq!(m.goals_per_match, 1.5);
        assert_eq!(m.opponent_goals_per_match, 0.5);
        assert_eq!(m.clean_sheet_ratio, 0.5);
        assert_eq!(m.no_goal_ratio, 0.5);

        let g = &stats.game_statistics;
        assert_eq!(g.goals_per_game, 1.0);
        assert_eq!(g.opponent_goals_per_game, 0.3);
        assert_eq!(g.clean_sheet_ratio, 0.67);
        assert_eq!(g.no_goal_ratio, 0.33);
    }

    #[test]
    fn totals_and_goal_types_come_from_records() {
        let records = vec![
            record(2, Some(GoalType::Field)),
            record(1, Some(GoalType::Penalty)),
            record(1, Some(GoalType::Field)),
            record(0, None),
        ];
        let stats = team_statistics(&[finished(&[(3, 1)])], &records);

        let t = &stats.total_statistics;
        assert_eq!(t.total_goals, 4);
        assert_eq!(t.total_assists, 4);
        assert_eq!(t.total_opponent_goals, 1);
        assert_eq!(t.goal_difference, 3);
        assert_eq!((t.field_goals, t.free_kick_goals, t.penalty_goals, t.own_goals), (2, 0, 1, 0));
    }

    #[test]
    fn no_matches_yields_zeroes() {
        let stats = team_statistics(&[], &[]);
        assert_eq!(stats.match_statistics.match_count, 0);
        assert_eq!(stats.match_statistics.clean_sheet_ratio, 0.0);
        assert_eq!(stats.total_statistics.total_goals, 0);
    }
}
