// Row-level access rules and the swap status graph, both switchable by config.

use crate::{
    config::{AccessPolicy, TransitionPolicy},
    db::models::{SwapRequest, SwapStatus},
    error::{AppError, Result},
    middleware::auth::AuthUser,
};

#[derive(Clone, Copy, Debug)]
pub struct Access {
    pub policy: AccessPolicy,
    pub transitions: TransitionPolicy,
}

impl Access {
    /// True when rows must be filtered down to what the caller may see.
    pub fn scoped(&self) -> bool {
        self.policy == AccessPolicy::Owner
    }

    pub fn require_owner(&self, caller: &AuthUser, owner_id: i64, message: &str) -> Result<()> {
        if !self.scoped() || caller.id == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(message.to_string()))
        }
    }

    pub fn require_any_of(&self, caller: &AuthUser, allowed: &[i64], message: &str) -> Result<()> {
        if !self.scoped() || allowed.contains(&caller.id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(message.to_string()))
        }
    }

    pub fn check_transition(&self, from: SwapStatus, to: SwapStatus) -> Result<()> {
        match self.transitions {
            TransitionPolicy::Free => Ok(()),
            TransitionPolicy::Strict if from.can_become(to) => Ok(()),
            TransitionPolicy::Strict => Err(AppError::InvalidTransition { from, to }),
        }
    }

    /// New swap requests start out pending unless transitions are free.
    pub fn check_initial_status(&self, status: SwapStatus) -> Result<()> {
        match self.transitions {
            TransitionPolicy::Strict if status != SwapStatus::Pending => Err(AppError::field(
                "status",
                "New swap requests must start as PENDING.",
            )),
            _ => Ok(()),
        }
    }

    /// Only the receiver answers a request and only the requester withdraws it.
    pub fn require_status_role(
        &self,
        caller: &AuthUser,
        swap: &SwapRequest,
        to: SwapStatus,
    ) -> Result<()> {
        if !self.scoped() || to == swap.status {
            return Ok(());
        }
        match to {
            SwapStatus::Accepted | SwapStatus::Rejected => self.require_owner(
                caller,
                swap.receiver,
                "Only the receiver can accept or reject this swap request.",
            ),
            SwapStatus::Cancelled => self.require_owner(
                caller,
                swap.requester,
                "Only the requester can cancel this swap request.",
            ),
            SwapStatus::Pending => self.require_any_of(
                caller,
                &[swap.requester, swap.receiver],
                "Only the participants can reopen this swap request.",
            ),
        }
    }
}
