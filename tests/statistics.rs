use squad_backend::models::{
    AttendanceStatus, GameResult, GoalType, MatchStatus, MemberStatus, Position,
};
use squad_backend::stats::{
    AttendanceLine, GameLine, MatchLine, MemberLine, RecordLine, rank_goals, rankings,
    team_composition, team_statistics, top10,
};
use uuid::Uuid;

fn game(match_id: Uuid, ours: i32, theirs: i32) -> GameLine {
    GameLine {
        match_id,
        our_score: ours,
        opponent_score: theirs,
        result: GameResult::from_scores(ours, theirs),
    }
}

fn finished(games: Vec<(i32, i32)>) -> MatchLine {
    let id = Uuid::new_v4();
    let games: Vec<GameLine> = games.into_iter().map(|(o, t)| game(id, o, t)).collect();
    MatchLine {
        id,
        total_our_score: Some(games.iter().map(|g| g.our_score).sum()),
        total_opponent_score: Some(games.iter().map(|g| g.opponent_score).sum()),
        games,
    }
}

fn member(name: &str) -> MemberLine {
    MemberLine {
        user_id: Uuid::new_v4(),
        name: name.into(),
        status: MemberStatus::Active,
        birthdate: None,
        positions: vec![Position::Mf],
    }
}

fn record(user_id: Uuid, goals: i32) -> RecordLine {
    RecordLine {
        user_id,
        game_id: Some(Uuid::new_v4()),
        played: true,
        goals,
        assists: 0,
        goal_type: (goals > 0).then_some(GoalType::Field),
        game_result: Some(GameResult::Win),
    }
}

#[test]
fn any_won_game_wins_the_match() {
    // A: win 2-1 and draw 1-1, B: loss 0-2
    let matches = vec![finished(vec![(2, 1), (1, 1)]), finished(vec![(0, 2)])];
    let stats = team_statistics(&matches, &[]);

    let m = &stats.match_statistics;
    assert_eq!(m.match_count, 2);
    assert_eq!((m.wins, m.draws, m.losses), (1, 0, 1));

    let g = &stats.game_statistics;
    assert_eq!(g.game_count, 3);
    assert_eq!((g.wins, g.draws, g.losses), (1, 1, 1));
}

#[test]
fn goal_ranking_keeps_ties_in_first_seen_order() {
    let (u1, u2, u3) = (member("u1"), member("u2"), member("u3"));
    let members = vec![u1.clone(), u2.clone(), u3.clone()];
    let records = vec![record(u1.user_id, 5), record(u2.user_id, 3), record(u3.user_id, 5)];

    let ranking = rank_goals(&members, &records, 5);
    let order: Vec<_> = ranking.iter().map(|e| (e.user_name.as_str(), e.value)).collect();
    assert_eq!(order, vec![("u1", 5), ("u3", 5), ("u2", 3)]);
    assert_eq!(ranking.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn rankings_and_top10_use_their_own_limits() {
    let members: Vec<MemberLine> = (0..12).map(|i| member(&format!("p{}", i))).collect();
    let records: Vec<RecordLine> = members.iter().map(|m| record(m.user_id, 1)).collect();
    let votes: Vec<AttendanceLine> = members
        .iter()
        .map(|m| AttendanceLine {
            match_id: Uuid::new_v4(),
            user_id: m.user_id,
            status: AttendanceStatus::Attending,
        })
        .collect();

    let short = rankings(&members, &records, &votes);
    assert_eq!(short.goals.len(), 5);
    assert_eq!(short.attendance.len(), 5);

    let long = top10(&members, &records, &votes);
    assert_eq!(long.goals.len(), 10);
    assert_eq!(long.attendance.len(), 10);
    // one game each, below the win-rate threshold
    assert!(long.win_rates.is_empty());
}

#[test]
fn composition_counts_every_member() {
    let composition = team_composition(&[member("a"), member("b")]);
    assert_eq!(composition.total_members, 2);
    let mf = composition
        .positions
        .iter()
        .find(|p| p.position == Position::Mf)
        .unwrap();
    assert_eq!(mf.count, 2);
}

#[test]
fn match_updates_follow_the_status_machine() {
    assert!(MatchStatus::Scheduled.can_transition_to(MatchStatus::InProgress));
    assert!(!MatchStatus::Scheduled.can_transition_to(MatchStatus::Finished));
    assert!(!MatchStatus::Cancelled.can_transition_to(MatchStatus::Scheduled));
}
