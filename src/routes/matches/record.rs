//! Turns a record-match submission into the rows that replace a match's
//! games, player records and substitutions.
//!
//! Planning is pure: ids are generated here and the model only has to write
//! the plan out, so resubmitting the same payload always yields the same
//! number of rows and the same totals.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{GameResult, GoalType};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInput {
    pub game_number: i32,
    pub our_score: i32,
    pub opponent_score: i32,
    pub result: Option<GameResult>,
    /// Per-game lines overriding the match-wide line of the same player.
    pub player_records: Option<Vec<PlayerRecordInput>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecordInput {
    pub user_id: Uuid,
    pub played: bool,
    pub goals: Option<i32>,
    pub assists: Option<i32>,
    pub goal_type: Option<GoalType>,
    pub goal_time: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionInput {
    pub game_number: Option<i32>,
    pub player_in_id: Uuid,
    pub player_out_id: Uuid,
    pub minute: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMatchRequest {
    pub games: Vec<GameInput>,
    pub player_records: Vec<PlayerRecordInput>,
    #[serde(default)]
    pub substitutions: Vec<SubstitutionInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedGame {
    pub id: Uuid,
    pub game_number: i32,
    pub our_score: i32,
    pub opponent_score: i32,
    pub result: GameResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRecord {
    pub game_id: Uuid,
    pub user_id: Uuid,
    pub played: bool,
    pub goals: i32,
    pub assists: i32,
    pub goal_type: Option<GoalType>,
    pub goal_time: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSubstitution {
    pub game_id: Option<Uuid>,
    pub player_in_id: Uuid,
    pub player_out_id: Uuid,
    pub minute: i32,
}

#[derive(Debug, Clone)]
pub struct RecordPlan {
    pub games: Vec<PlannedGame>,
    pub records: Vec<PlannedRecord>,
    pub substitutions: Vec<PlannedSubstitution>,
    pub total_our_score: i32,
    pub total_opponent_score: i32,
}

impl RecordPlan {
    /// Every user the plan writes a row for.
    pub fn players(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| r.user_id)
            .chain(
                self.substitutions
                    .iter()
                    .flat_map(|s| [s.player_in_id, s.player_out_id]),
            )
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Highest score accepted for one side of a single game.
pub const MAX_GAME_SCORE: i32 = 99;

fn non_negative(value: i32, what: &str) -> AppResult<i32> {
    if value < 0 {
        return Err(AppError::bad_request(format!("{} must not be negative", what)));
    }
    Ok(value)
}

fn game_score(value: i32) -> AppResult<i32> {
    let value = non_negative(value, "score")?;
    if value > MAX_GAME_SCORE {
        return Err(AppError::bad_request(format!(
            "score must not exceed {}",
            MAX_GAME_SCORE
        )));
    }
    Ok(value)
}

/// Sum of game scores, saturating at `i32::MAX`.
pub fn total_score(scores: impl IntoIterator<Item = i32>) -> i32 {
    scores.into_iter().fold(0i32, i32::saturating_add)
}

fn checked_total(scores: impl IntoIterator<Item = i32>) -> AppResult<i32> {
    scores
        .into_iter()
        .try_fold(0i32, i32::checked_add)
        .ok_or_else(|| AppError::bad_request("total score is too large"))
}

fn validate_line(line: &PlayerRecordInput) -> AppResult<()> {
    non_negative(line.goals.unwrap_or(0), "goals")?;
    non_negative(line.assists.unwrap_or(0), "assists")?;
    if let Some(minute) = line.goal_time {
        non_negative(minute, "goal time")?;
    }
    Ok(())
}

fn planned_record(game_id: Uuid, line: &PlayerRecordInput) -> PlannedRecord {
    PlannedRecord {
        game_id,
        user_id: line.user_id,
        played: line.played,
        goals: line.goals.unwrap_or(0),
        assists: line.assists.unwrap_or(0),
        goal_type: line.goal_type,
        goal_time: line.goal_time,
    }
}

/// Builds one record per (player, game) pair. A player's match-wide line is
/// copied to every game unless that game lists its own line for them.
pub fn plan_record(req: &RecordMatchRequest) -> AppResult<RecordPlan> {
    let mut numbers = HashSet::new();
    let mut games = Vec::with_capacity(req.games.len());
    for game in &req.games {
        if !numbers.insert(game.game_number) {
            return Err(AppError::bad_request(format!(
                "duplicate game number {}",
                game.game_number
            )));
        }
        let our_score = game_score(game.our_score)?;
        let opponent_score = game_score(game.opponent_score)?;
        games.push(PlannedGame {
            id: Uuid::new_v4(),
            game_number: game.game_number,
            our_score,
            opponent_score,
            result: game
                .result
                .unwrap_or_else(|| GameResult::from_scores(our_score, opponent_score)),
        });
    }

    let mut match_wide = HashSet::new();
    for line in &req.player_records {
        validate_line(line)?;
        if !match_wide.insert(line.user_id) {
            return Err(AppError::bad_request(format!(
                "duplicate player record for {}",
                line.user_id
            )));
        }
    }

    let mut records = Vec::new();
    for (input, planned) in req.games.iter().zip(&games) {
        let overrides: HashMap<Uuid, &PlayerRecordInput> = input
            .player_records
            .iter()
            .flatten()
            .map(|line| validate_line(line).map(|_| (line.user_id, line)))
            .collect::<AppResult<_>>()?;

        for line in &req.player_records {
            let line = overrides.get(&line.user_id).copied().unwrap_or(line);
            records.push(planned_record(planned.id, line));
        }
        for line in input.player_records.iter().flatten() {
            if !match_wide.contains(&line.user_id) {
                records.push(planned_record(planned.id, line));
            }
        }
    }

    let game_ids: HashMap<i32, Uuid> = games.iter().map(|g| (g.game_number, g.id)).collect();
    let substitutions = req
        .substitutions
        .iter()
        .map(|s| {
            if s.player_in_id == s.player_out_id {
                return Err(AppError::bad_request(
                    "a player cannot be substituted for themselves",
                ));
            }
            let game_id = match s.game_number {
                Some(number) => Some(game_ids.get(&number).copied().ok_or_else(|| {
                    AppError::bad_request(format!("substitution refers to unknown game {}", number))
                })?),
                None => None,
            };
            Ok(PlannedSubstitution {
                game_id,
                player_in_id: s.player_in_id,
                player_out_id: s.player_out_id,
                minute: non_negative(s.minute, "substitution minute")?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(RecordPlan {
        total_our_score: checked_total(games.iter().map(|g| g.our_score))?,
        total_opponent_score: checked_total(games.iter().map(|g| g.opponent_score))?,
        games,
        records,
        substitutions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(number: i32, ours: i32, theirs: i32) -> GameInput {
        GameInput {
            game_number: number,
            our_score: ours,
            opponent_score: theirs,
            result: None,
            player_records: None,
        }
    }

    fn line(user_id: Uuid, goals: i32) -> PlayerRecordInput {
        PlayerRecordInput {
            user_id,
            played: true,
            goals: Some(goals),
            assists: None,
            goal_type: None,
            goal_time: None,
        }
    }

    fn request(games: Vec<GameInput>, player_records: Vec<PlayerRecordInput>) -> RecordMatchRequest {
        RecordMatchRequest {
            games,
            player_records,
            substitutions: vec![],
            notes: None,
        }
    }

    #[test]
    fn records_are_the_cross_product_of_players_and_games() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let req = request(
            vec![game(1, 2, 1), game(2, 1, 1), game(3, 0, 2)],
            vec![line(a, 1), line(b, 0)],
        );
        let plan = plan_record(&req).unwrap();
        assert_eq!(plan.games.len(), 3);
        assert_eq!(plan.records.len(), 6);
        for g in &plan.games {
            assert_eq!(plan.records.iter().filter(|r| r.game_id == g.id).count(), 2);
        }
        assert!(plan.records.iter().filter(|r| r.user_id == a).all(|r| r.goals == 1));
    }

    #[test]
    fn totals_are_the_sum_of_game_scores() {
        let plan = plan_record(&request(vec![game(1, 2, 1), game(2, 1, 1), game(3, 0, 2)], vec![])).unwrap();
        assert_eq!((plan.total_our_score, plan.total_opponent_score), (3, 4));
    }

    #[test]
    fn resubmission_plans_the_same_shape() {
        let a = Uuid::new_v4();
        let req = request(vec![game(1, 1, 0), game(2, 0, 0)], vec![line(a, 2)]);
        let first = plan_record(&req).unwrap();
        let second = plan_record(&req).unwrap();
        assert_eq!(first.records.len(), second.records.len());
        assert_eq!(first.total_our_score, second.total_our_score);
        let results = |p: &RecordPlan| p.games.iter().map(|g| g.result).collect::<Vec<_>>();
        assert_eq!(results(&first), results(&second));
    }

    #[test]
    fn result_is_derived_unless_given() {
        let mut explicit = game(2, 1, 1);
        explicit.result = Some(GameResult::Win);
        let plan = plan_record(&request(vec![game(1, 0, 3), explicit], vec![])).unwrap();
        assert_eq!(plan.games[0].result, GameResult::Loss);
        assert_eq!(plan.games[1].result, GameResult::Win);
    }

    #[test]
    fn per_game_lines_override_match_wide_lines() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut second = game(2, 1, 0);
        second.player_records = Some(vec![line(a, 3), line(b, 1)]);
        let plan = plan_record(&request(vec![game(1, 0, 0), second], vec![line(a, 0)])).unwrap();

        let second_id = plan.games[1].id;
        let in_second: Vec<_> = plan.records.iter().filter(|r| r.game_id == second_id).collect();
        assert_eq!(in_second.len(), 2);
        assert_eq!(in_second.iter().find(|r| r.user_id == a).unwrap().goals, 3);
        assert_eq!(plan.records.len(), 3);
    }

    #[test]
    fn rejects_bad_input() {
        let a = Uuid::new_v4();
        assert!(plan_record(&request(vec![game(1, -1, 0)], vec![])).is_err());
        assert!(plan_record(&request(vec![game(1, 0, 0), game(1, 1, 0)], vec![])).is_err());
        assert!(plan_record(&request(vec![game(1, 0, 0)], vec![line(a, -2)])).is_err());
        assert!(plan_record(&request(vec![game(1, 0, 0)], vec![line(a, 1), line(a, 2)])).is_err());
    }

    #[test]
    fn oversized_scores_are_rejected_instead_of_overflowing() {
        let huge = plan_record(&request(vec![game(1, i32::MAX, 0), game(2, i32::MAX, 0)], vec![]));
        assert!(matches!(huge, Err(AppError::BadRequest(_))));
        assert!(plan_record(&request(vec![game(1, 0, MAX_GAME_SCORE + 1)], vec![])).is_err());

        let capped = plan_record(&request(vec![game(1, MAX_GAME_SCORE, 0), game(2, MAX_GAME_SCORE, 0)], vec![])).unwrap();
        assert_eq!(capped.total_our_score, 2 * MAX_GAME_SCORE);
    }

    #[test]
    fn stored_totals_saturate() {
        assert_eq!(total_score([2, 1, 0]), 3);
        assert_eq!(total_score([i32::MAX, i32::MAX]), i32::MAX);
    }

    #[test]
    fn substitutions_map_to_planned_games() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut req = request(vec![game(1, 0, 0), game(2, 1, 0)], vec![]);
        req.substitutions = vec![
            SubstitutionInput { game_number: Some(2), player_in_id: a, player_out_id: b, minute: 12 },
            SubstitutionInput { game_number: None, player_in_id: b, player_out_id: a, minute: 30 },
        ];
        let plan = plan_record(&req).unwrap();
        assert_eq!(plan.substitutions[0].game_id, Some(plan.games[1].id));
        assert_eq!(plan.substitutions[1].game_id, None);
        assert_eq!(plan.players(), vec![a, b]);

        req.substitutions[0].game_number = Some(9);
        assert!(plan_record(&req).is_err());
    }

    #[test]
    fn request_uses_camel_case() {
        let req: RecordMatchRequest = serde_json::from_str(
            r#"{
                "games": [{"gameNumber": 1, "ourScore": 2, "opponentScore": 1}],
                "playerRecords": [{"userId": "6f1c1c5e-3f0e-4a55-9a51-3f1e4f7d1a10", "played": true, "goalType": "free_kick"}],
                "notes": "rainy"
            }"#,
        )
        .unwrap();
        assert_eq!(req.games[0].our_score, 2);
        assert_eq!(req.player_records[0].goal_type, Some(GoalType::FreeKick));
        assert!(req.substitutions.is_empty());
    }
}
