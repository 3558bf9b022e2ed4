use crate::error::CoreError;
use crate::models::TaskStatus;

/// Decides whether a status change is legal.
///
/// The transition table is shared with the task-management side, so it sits
/// behind a trait; [`StatusTransitionPolicy`] is the table this crate ships.
pub trait TransitionPolicy: Send + Sync {
    /// `Ok(())` if `from -> to` is allowed, otherwise
    /// [`CoreError::InvalidTransition`] carrying both states and a reason.
    fn check(&self, from: TaskStatus, to: TaskStatus) -> Result<(), CoreError>;

    fn allows(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.check(from, to).is_ok()
    }
}

/// Default lifecycle for templates and occurrences.
///
/// ```text
///   todo <-> in_progress
///   todo, in_progress -> completed | cancelled
///   completed -> todo   (reopen)
///   cancelled -> todo   (reactivate)
/// ```
///
/// Requesting the current status is accepted as a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusTransitionPolicy;

impl StatusTransitionPolicy {
    pub fn new() -> Self {
        Self
    }

    fn rejection(from: TaskStatus, to: TaskStatus) -> Option<&'static str> {
        use TaskStatus::*;
        match (from, to) {
            (a, b) if a == b => None,
            (Todo, _) => None,
            (InProgress, _) => None,
            (Completed, Todo) | (Cancelled, Todo) => None,
            (Completed, InProgress) => Some("a completed task must be reopened to todo first"),
            (Completed, Cancelled) => Some("a completed task cannot be cancelled"),
            (Cancelled, InProgress) => Some("a cancelled task must be reactivated to todo first"),
            (Cancelled, Completed) => Some("a cancelled task cannot be completed"),
            _ => Some("transition not allowed"),
        }
    }
}

impl TransitionPolicy for StatusTransitionPolicy {
    fn check(&self, from: TaskStatus, to: TaskStatus) -> Result<(), CoreError> {
        match Self::rejection(from, to) {
            None => Ok(()),
            Some(reason) => Err(CoreError::InvalidTransition {
                from,
                to,
                reason: reason.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use crate::models::TaskStatus::*;

    #[rstest]
    #[case(Todo, InProgress)]
    #[case(Todo, Completed)]
    #[case(Todo, Cancelled)]
    #[case(InProgress, Todo)]
    #[case(InProgress, Completed)]
    #[case(InProgress, Cancelled)]
    #[case(Completed, Todo)]
    #[case(Cancelled, Todo)]
    #[case(Completed, Completed)]
    #[case(Cancelled, Cancelled)]
    fn test_allowed(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        assert!(StatusTransitionPolicy.check(from, to).is_ok());
    }

    #[rstest]
    #[case(Cancelled, InProgress)]
    #[case(Cancelled, Completed)]
    #[case(Completed, InProgress)]
    #[case(Completed, Cancelled)]
    fn test_rejected_with_pair(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        match StatusTransitionPolicy.check(from, to) {
            Err(CoreError::InvalidTransition { from: f, to: t, reason }) => {
                assert_eq!((f, t), (from, to));
                assert!(!reason.is_empty());
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_every_state_reachable_from_todo() {
        for to in TaskStatus::ALL {
            assert!(StatusTransitionPolicy.allows(Todo, to));
        }
    }

    #[test]
    fn test_error_message_names_both_states() {
        let err = StatusTransitionPolicy.check(Cancelled, InProgress).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cancelled"));
        assert!(message.contains("in_progress"));
    }
}
