//! On-disk checkout state and the action needed to reconcile it

use std::fmt;

use crate::models::deployment::{DeployType, DeploymentRequest};

/// What is currently at a request's target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    /// Nothing there yet
    Absent,

    /// An svn working copy (`.svn` present)
    LegacyWorkingCopy,

    /// A git working copy and what it tracks
    Git { origin: String, branch: String },

    /// A directory whose git metadata could not be read
    Unreadable(String),
}

/// Why an existing checkout is being thrown away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClobberReason {
    /// svn working copy where a git deployment is wanted
    LegacyWorkingCopy,

    /// Tracks another repository
    OriginChanged { current: String },

    /// Tracks another branch
    BranchChanged { current: String },

    /// Git metadata is unreadable
    Unreadable,
}

impl fmt::Display for ClobberReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClobberReason::LegacyWorkingCopy => f.write_str("old subversion working copy"),
            ClobberReason::OriginChanged { current } => write!(f, "source repo is {current}"),
            ClobberReason::BranchChanged { current } => write!(f, "source branch is {current}"),
            ClobberReason::Unreadable => f.write_str("could not determine original source"),
        }
    }
}

/// Reconciliation step for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Clone into an empty path
    FreshCheckout,

    /// Remove the existing tree, then clone
    Clobber(ClobberReason),

    /// Fetch the branch and hard-reset onto it
    Update,

    /// `svn up` in place
    LegacyUpdate,

    /// Nothing to do
    Skip,
}

impl Action {
    /// Whether carrying out this action changes what is served
    pub fn deploys(&self) -> bool {
        !matches!(self, Action::Skip)
    }
}

/// Decide what to do for `request` given the state at its path
pub fn plan(request: &DeploymentRequest, state: &CheckoutState) -> Action {
    let wants_svn = request.deploy_type == DeployType::LegacyVcs;
    match state {
        // svn checkouts are provisioned by hand
        CheckoutState::Absent if wants_svn => Action::Skip,
        CheckoutState::Absent => Action::FreshCheckout,

        CheckoutState::LegacyWorkingCopy if wants_svn => Action::LegacyUpdate,
        CheckoutState::LegacyWorkingCopy => Action::Clobber(ClobberReason::LegacyWorkingCopy),

        CheckoutState::Git { origin, .. } if *origin != request.source_url => {
            Action::Clobber(ClobberReason::OriginChanged {
                current: origin.clone(),
            })
        }
        CheckoutState::Git { branch, .. } if *branch != request.branch => {
            Action::Clobber(ClobberReason::BranchChanged {
                current: branch.clone(),
            })
        }
        CheckoutState::Git { .. } => Action::Update,

        CheckoutState::Unreadable(_) => Action::Clobber(ClobberReason::Unreadable),
    }
}
