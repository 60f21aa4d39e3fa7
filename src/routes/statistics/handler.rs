use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AppState,
    error::AppResult,
    middleware::AuthUser,
    routes::{TeamQuery, matches::model::resolve_team, team::model::TeamMember},
    stats::{
        self, ATTENDANCE_RANKING_LIMIT, AttendanceLine, MemberLine, RecordLine, attendance_summary,
        team_composition, team_statistics,
    },
    utils::success_to_api_response,
};

use super::model::{self as loaders, DashboardSummary, members_only};

/// Members plus their records and finished-match votes.
async fn ranking_inputs(
    pool: &PgPool,
    team_id: Uuid,
) -> AppResult<(Vec<MemberLine>, Vec<RecordLine>, Vec<AttendanceLine>)> {
    let members = TeamMember::lines(pool, team_id).await?;
    let records = members_only(&members, loaders::team_records(pool, team_id).await?, |r| r.user_id);
    let votes = members_only(
        &members,
        loaders::finished_attendances(pool, team_id).await?,
        |a| a.user_id,
    );
    Ok((members, records, votes))
}

#[axum::debug_handler]
pub async fn get_team_statistics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let matches = loaders::finished_matches(&state.pool, team_id).await?;
    let records = loaders::team_records(&state.pool, team_id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(team_statistics(&matches, &records)),
    ))
}

#[axum::debug_handler]
pub async fn get_top10(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let (members, records, votes) = ranking_inputs(&state.pool, team_id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(stats::top10(&members, &records, &votes)),
    ))
}

#[axum::debug_handler]
pub async fn get_rankings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let (members, records, votes) = ranking_inputs(&state.pool, team_id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(stats::rankings(&members, &records, &votes)),
    ))
}

#[axum::debug_handler]
pub async fn get_attendance_ranking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let (members, _, votes) = ranking_inputs(&state.pool, team_id).await?;
    let ranking = stats::rank_attendance(&members, &votes, ATTENDANCE_RANKING_LIMIT);
    Ok((StatusCode::OK, success_to_api_response(ranking)))
}

#[axum::debug_handler]
pub async fn get_games_ranking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let (members, records, _) = ranking_inputs(&state.pool, team_id).await?;
    let ranking = stats::rank_games_played(&members, &records, ATTENDANCE_RANKING_LIMIT);
    Ok((StatusCode::OK, success_to_api_response(ranking)))
}

#[axum::debug_handler]
pub async fn get_goals_ranking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let (members, records, _) = ranking_inputs(&state.pool, team_id).await?;
    let ranking = stats::rank_goals(&members, &records, ATTENDANCE_RANKING_LIMIT);
    Ok((StatusCode::OK, success_to_api_response(ranking)))
}

#[axum::debug_handler]
pub async fn get_assists_ranking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let (members, records, _) = ranking_inputs(&state.pool, team_id).await?;
    let ranking = stats::rank_assists(&members, &records, ATTENDANCE_RANKING_LIMIT);
    Ok((StatusCode::OK, success_to_api_response(ranking)))
}

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    let team_id = resolve_team(pool, user.id, query.team_id).await?;

    let next_match = loaders::next_match(pool, team_id, Utc::now().date_naive()).await?;
    let matches = loaders::finished_matches(pool, team_id).await?;
    let all_records = loaders::team_records(pool, team_id).await?;
    let team_statistics = team_statistics(&matches, &all_records);

    let (members, records, votes) = ranking_inputs(pool, team_id).await?;
    let (scheduled, upcoming_votes) = loaders::scheduled_votes(pool, team_id).await?;

    let summary = DashboardSummary {
        next_match,
        team_composition: team_composition(&members),
        team_statistics,
        top10: stats::top10(&members, &records, &votes),
        attendance_summary: attendance_summary(scheduled, &upcoming_votes),
    };
    Ok((StatusCode::OK, success_to_api_response(summary)))
}
