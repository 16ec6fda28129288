//! Gate for pages that need a session.

use crate::session::SessionSnapshot;

pub const SIGN_IN_PATH: &str = "/auth/sign-in";

/// Where the guard stands on the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Initial auth state not known yet.
    Unknown,
    Authenticated,
    Anonymous,
}

impl GuardState {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        match (snapshot.resolved, snapshot.is_authenticated()) {
            (false, _) => Self::Unknown,
            (true, true) => Self::Authenticated,
            (true, false) => Self::Anonymous,
        }
    }

    pub fn decision(&self) -> GuardDecision {
        match self {
            Self::Unknown => GuardDecision::Loading,
            Self::Authenticated => GuardDecision::Render,
            Self::Anonymous => GuardDecision::Redirect(SIGN_IN_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Loading,
    Redirect(&'static str),
    Render,
}

/// Decide whether a guarded page may render.
pub fn check(snapshot: &SessionSnapshot) -> GuardDecision {
    GuardState::from_snapshot(snapshot).decision()
}
