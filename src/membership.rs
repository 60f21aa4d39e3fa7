//! Team membership rules.
//!
//! These are checked inside the same transaction that performs the write, after
//! the facts they need have been read. Keeping them free of I/O lets every
//! mutation path share one definition of the rules.

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{JoinRequestStatus, TeamRole};

pub const MAX_VICE_CAPTAINS: i64 = 2;

/// The requester's membership in the team being acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub member_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
}

pub fn require_role(membership: Option<Membership>, allowed: &[TeamRole]) -> AppResult<Membership> {
    let membership = membership.ok_or_else(|| AppError::forbidden("not a member of this team"))?;

    if !allowed.contains(&membership.role) {
        tracing::warn!(
            "user {} with role {:?} denied on team {}",
            membership.user_id,
            membership.role,
            membership.team_id
        );
        return Err(if allowed == [TeamRole::Captain].as_slice() {
            AppError::forbidden("only the captain can perform this action")
        } else {
            AppError::forbidden("only the captain or a vice captain can perform this action")
        });
    }

    Ok(membership)
}

/// Like [`require_role`], but an unknown team is NotFound before any role is
/// looked at.
pub fn require_team_role(
    team: Option<Uuid>,
    membership: Option<Membership>,
    allowed: &[TeamRole],
) -> AppResult<Membership> {
    team.ok_or_else(|| AppError::not_found("team not found"))?;
    require_role(membership, allowed)
}

/// Promotion to vice captain is capped per team; members already holding the
/// role can be updated freely.
pub fn ensure_vice_captain_slot(
    current_role: TeamRole,
    requested_role: Option<TeamRole>,
    vice_captain_count: i64,
) -> AppResult<()> {
    if requested_role == Some(TeamRole::ViceCaptain)
        && current_role != TeamRole::ViceCaptain
        && vice_captain_count >= MAX_VICE_CAPTAINS
    {
        return Err(AppError::bad_request(format!(
            "a team can have at most {} vice captains",
            MAX_VICE_CAPTAINS
        )));
    }
    Ok(())
}

/// The captain role is unique to the team owner; it can't be granted or taken
/// away through member updates.
pub fn ensure_role_change_allowed(current_role: TeamRole, requested_role: Option<TeamRole>) -> AppResult<()> {
    match requested_role {
        Some(TeamRole::Captain) if current_role != TeamRole::Captain => {
            Err(AppError::bad_request("the captain role cannot be assigned"))
        }
        Some(role) if current_role == TeamRole::Captain && role != TeamRole::Captain => {
            Err(AppError::bad_request("the captain role cannot be changed"))
        }
        _ => Ok(()),
    }
}

pub fn ensure_removable(role: TeamRole) -> AppResult<()> {
    if role == TeamRole::Captain {
        return Err(AppError::forbidden("the captain cannot be removed from the team"));
    }
    Ok(())
}

pub fn ensure_can_leave(role: TeamRole) -> AppResult<()> {
    if role == TeamRole::Captain {
        return Err(AppError::forbidden(
            "the captain cannot leave the team; delete the team instead",
        ));
    }
    Ok(())
}

/// What is known about a user before a membership row is created for them.
#[derive(Debug, Clone, Default)]
pub struct MembershipFacts {
    /// Team the user currently belongs to, if any.
    pub current_team: Option<Uuid>,
}

impl MembershipFacts {
    pub fn ensure_free_for(&self, team_id: Uuid) -> AppResult<()> {
        match self.current_team {
            Some(current) if current == team_id => Err(AppError::conflict("already a team member")),
            Some(_) => Err(AppError::conflict(
                "already a member of another team; leave the current team first",
            )),
            None => Ok(()),
        }
    }

    /// Creating a team makes the owner its captain, so they must be teamless.
    pub fn ensure_no_team(&self) -> AppResult<()> {
        if self.current_team.is_some() {
            return Err(AppError::conflict(
                "already a member of a team; leave the current team first",
            ));
        }
        Ok(())
    }
}

/// Facts needed to decide whether a user may file a join request.
#[derive(Debug, Clone, Default)]
pub struct JoinRequestFacts {
    pub membership: MembershipFacts,
    /// Name of the team holding the user's pending request, if any.
    pub pending_team: Option<(Uuid, String)>,
}

impl JoinRequestFacts {
    pub fn ensure_can_request(&self, team_id: Uuid) -> AppResult<()> {
        self.membership.ensure_free_for(team_id)?;

        match &self.pending_team {
            Some((pending_id, _)) if *pending_id == team_id => {
                Err(AppError::conflict("a join request for this team is already pending"))
            }
            Some((_, name)) => Err(AppError::conflict(format!(
                "a join request to \"{}\" is already pending; wait for a response or cancel it",
                name
            ))),
            None => Ok(()),
        }
    }
}

/// A join request leaves `pending` exactly once.
pub fn review_transition(
    current: JoinRequestStatus,
    decision: JoinRequestStatus,
) -> AppResult<JoinRequestStatus> {
    if current != JoinRequestStatus::Pending {
        return Err(AppError::bad_request("join request has already been reviewed"));
    }
    match decision {
        JoinRequestStatus::Approved | JoinRequestStatus::Rejected => Ok(decision),
        JoinRequestStatus::Pending => Err(AppError::bad_request(
            "a review must approve or reject the request",
        )),
    }
}
