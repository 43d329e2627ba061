use serde::Serialize;

use std::fmt;

use crate::error::{Result, SafeError};

/// Where a multisig transaction stands.
///
/// `Executed` is terminal. `Failed` is not: a [`TxEvent::Retry`] re-derives the
/// state from the current confirmation count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TxState {
    Unconfirmed,
    PartiallyConfirmed,
    ReadyToExecute,
    Executed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    /// A confirmation was accepted; `count` valid owner confirmations now exist.
    ConfirmationAccepted { count: usize, threshold: u64 },
    ExecutionMined,
    Failure(String),
    Retry { count: usize, threshold: u64, executed: bool },
}

impl TxState {
    /// State implied by `count` valid confirmations out of `threshold`.
    pub fn derive(count: usize, threshold: u64, executed: bool) -> Self {
        if executed {
            TxState::Executed
        } else if count == 0 {
            TxState::Unconfirmed
        } else if (count as u64) < threshold {
            TxState::PartiallyConfirmed
        } else {
            TxState::ReadyToExecute
        }
    }

    pub fn apply(self, event: TxEvent) -> Result<Self> {
        use TxEvent::*;

        let next = match (&self, &event) {
            (TxState::Executed, ExecutionMined) |
            (TxState::Executed, Retry { executed: true, .. }) => Some(TxState::Executed),
            (TxState::Executed, _) | (TxState::Failed { .. }, ConfirmationAccepted { .. }) => None,

            (_, ConfirmationAccepted { count, threshold }) => {
                Some(TxState::derive(*count, *threshold, false))
            }
            (_, ExecutionMined) => Some(TxState::Executed),
            (_, Failure(reason)) => Some(TxState::Failed { reason: reason.clone() }),
            (_, Retry { count, threshold, executed }) => {
                Some(TxState::derive(*count, *threshold, *executed))
            }
        };

        next.ok_or(SafeError::InvalidTransition { from: self, event })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Executed)
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, TxState::ReadyToExecute)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxState::Unconfirmed => f.write_str("unconfirmed"),
            TxState::PartiallyConfirmed => f.write_str("partially confirmed"),
            TxState::ReadyToExecute => f.write_str("ready to execute"),
            TxState::Executed => f.write_str("executed"),
            TxState::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_from_counts() {
        assert_eq!(TxState::derive(0, 2, false), TxState::Unconfirmed);
        assert_eq!(TxState::derive(1, 2, false), TxState::PartiallyConfirmed);
        assert_eq!(TxState::derive(2, 2, false), TxState::ReadyToExecute);
        assert_eq!(TxState::derive(3, 2, false), TxState::ReadyToExecute);
        assert_eq!(TxState::derive(0, 2, true), TxState::Executed);
    }

    #[test]
    fn happy_path() {
        let state = TxState::Unconfirmed
            .apply(TxEvent::ConfirmationAccepted { count: 1, threshold: 2 })
            .unwrap();
        assert_eq!(state, TxState::PartiallyConfirmed);

        let state = state.apply(TxEvent::ConfirmationAccepted { count: 2, threshold: 2 }).unwrap();
        assert!(state.is_executable());

        let state = state.apply(TxEvent::ExecutionMined).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn failed_recovers_through_retry() {
        let state = TxState::ReadyToExecute.apply(TxEvent::Failure("reverted".into())).unwrap();
        assert_eq!(state, TxState::Failed { reason: "reverted".into() });
        assert!(!state.is_terminal());

        assert!(matches!(
            state.clone().apply(TxEvent::ConfirmationAccepted { count: 2, threshold: 2 }),
            Err(SafeError::InvalidTransition { .. })
        ));

        let state = state.apply(TxEvent::Retry { count: 2, threshold: 2, executed: false }).unwrap();
        assert_eq!(state, TxState::ReadyToExecute);
    }

    #[test]
    fn executed_only_accepts_no_ops() {
        assert_eq!(TxState::Executed.apply(TxEvent::ExecutionMined).unwrap(), TxState::Executed);
        assert_eq!(
            TxState::Executed
                .apply(TxEvent::Retry { count: 2, threshold: 2, executed: true })
                .unwrap(),
            TxState::Executed
        );
        for event in [
            TxEvent::ConfirmationAccepted { count: 3, threshold: 2 },
            TxEvent::Failure("late".into()),
            TxEvent::Retry { count: 1, threshold: 2, executed: false },
        ] {
            assert!(matches!(
                TxState::Executed.apply(event),
                Err(SafeError::InvalidTransition { from: TxState::Executed, .. })
            ));
        }
    }
}
