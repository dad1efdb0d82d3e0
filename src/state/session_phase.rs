/// Phase definitions for a single query's fetch session
///
/// This module defines every phase the fetch controller can be in while it
/// pages through results for one query.
use std::fmt;

/// Represents the current phase of a fetch session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    // ===== Active Phases =====
    /// Session state initialized, no request made yet
    Starting,

    /// Waiting on the rate governor or the page request
    Fetching,

    /// Running the page's items through the filter and sink
    Filtering,

    /// Moving the cursor to the next page
    Paginating,

    /// Waiting before retrying a malformed-request response
    RetryingTransient,

    /// Backing off after a rate-limit response
    RetryingRateLimited,

    // ===== Terminal Phases =====
    /// Result cap reached
    Capped,

    /// No more items or no next page
    Exhausted,

    /// Malformed-request retries used up; the query was dropped
    Abandoned,

    /// Unrecoverable error; reported to the caller
    Fatal,
}

impl SessionPhase {
    /// Returns true if no further requests will be made in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Capped | Self::Exhausted | Self::Abandoned | Self::Fatal
        )
    }

    /// Returns true if the session is waiting out a retry delay
    pub fn is_retrying(&self) -> bool {
        matches!(self, Self::RetryingTransient | Self::RetryingRateLimited)
    }

    /// Returns true if the session ended normally
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Capped | Self::Exhausted)
    }

    /// Returns true if the phase may follow `self`
    ///
    /// Terminal phases accept no successors.
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;

        if next == Fatal {
            return !self.is_terminal();
        }

        match self {
            Starting => matches!(next, Fetching | Capped),
            Fetching => matches!(
                next,
                Filtering | RetryingTransient | RetryingRateLimited | Abandoned
            ),
            Filtering => matches!(next, Paginating | Capped | Exhausted),
            Paginating => matches!(next, Fetching | Exhausted),
            RetryingTransient | RetryingRateLimited => matches!(next, Fetching),
            Capped | Exhausted | Abandoned | Fatal => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Fetching => "fetching",
            Self::Filtering => "filtering",
            Self::Paginating => "paginating",
            Self::RetryingTransient => "retrying_transient",
            Self::RetryingRateLimited => "retrying_rate_limited",
            Self::Capped => "capped",
            Self::Exhausted => "exhausted",
            Self::Abandoned => "abandoned",
            Self::Fatal => "fatal",
        }
    }

    /// Returns all possible phases
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Starting,
            Self::Fetching,
            Self::Filtering,
            Self::Paginating,
            Self::RetryingTransient,
            Self::RetryingRateLimited,
            Self::Capped,
            Self::Exhausted,
            Self::Abandoned,
            Self::Fatal,
        ]
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!SessionPhase::Starting.is_terminal());
        assert!(!SessionPhase::Fetching.is_terminal());
        assert!(!SessionPhase::Filtering.is_terminal());
        assert!(!SessionPhase::Paginating.is_terminal());
        assert!(!SessionPhase::RetryingTransient.is_terminal());
        assert!(!SessionPhase::RetryingRateLimited.is_terminal());

        assert!(SessionPhase::Capped.is_terminal());
        assert!(SessionPhase::Exhausted.is_terminal());
        assert!(SessionPhase::Abandoned.is_terminal());
        assert!(SessionPhase::Fatal.is_terminal());
    }

    #[test]
    fn test_is_success() {
        assert!(SessionPhase::Capped.is_success());
        assert!(SessionPhase::Exhausted.is_success());
        assert!(!SessionPhase::Abandoned.is_success());
        assert!(!SessionPhase::Fatal.is_success());
    }

    #[test]
    fn test_happy_path_transitions() {
        use SessionPhase::*;
        let path = [Starting, Fetching, Filtering, Paginating, Fetching, Filtering, Exhausted];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_retry_transitions() {
        use SessionPhase::*;
        assert!(Fetching.can_transition_to(RetryingRateLimited));
        assert!(RetryingRateLimited.can_transition_to(Fetching));
        assert!(RetryingRateLimited.can_transition_to(Fatal));
        assert!(!RetryingTransient.can_transition_to(Filtering));
        assert!(Fetching.can_transition_to(Abandoned));
    }

    #[test]
    fn test_starting_may_end_capped() {
        use SessionPhase::*;
        assert!(Starting.can_transition_to(Capped));
        assert!(!Starting.can_transition_to(Exhausted));
    }

    #[test]
    fn test_terminal_phases_have_no_successors() {
        for terminal in SessionPhase::all_phases().into_iter().filter(|p| p.is_terminal()) {
            for next in SessionPhase::all_phases() {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", SessionPhase::Capped), "capped");
        assert_eq!(
            format!("{}", SessionPhase::RetryingRateLimited),
            "retrying_rate_limited"
        );
    }

    #[test]
    fn test_all_phases_complete() {
        let all = SessionPhase::all_phases();
        assert_eq!(all.len(), 10);

        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(all[i], all[j], "Duplicate phase found");
            }
        }
    }
}
