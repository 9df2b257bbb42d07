//! Per-invocation state machine.
//!
//! ```text
//! Pending -> Evaluating -> Allowed
//!                       -> Denied
//!                       -> NeedsConfirmation -> Allowed | Denied
//! ```

use serde::Serialize;

use super::decision::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum State {
    Pending,
    Evaluating,
    NeedsConfirmation,
    Allowed,
    Denied,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Allowed | State::Denied)
    }

    pub fn can_advance_to(self, next: State) -> bool {
        matches!(
            (self, next),
            (State::Pending, State::Evaluating)
                | (State::Evaluating, State::Allowed)
                | (State::Evaluating, State::Denied)
                | (State::Evaluating, State::NeedsConfirmation)
                | (State::NeedsConfirmation, State::Allowed)
                | (State::NeedsConfirmation, State::Denied)
        )
    }
}

/// The verdict of one invocation and the states it passed through.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub transitions: Vec<State>,
}

impl Evaluation {
    pub(crate) fn start() -> Transitions {
        Transitions {
            states: vec![State::Pending],
        }
    }

    pub fn state(&self) -> State {
        self.transitions.last().copied().unwrap_or(State::Pending)
    }
}

/// Builder that only accepts legal transitions.
#[derive(Debug)]
pub(crate) struct Transitions {
    states: Vec<State>,
}

impl Transitions {
    pub(crate) fn resume(states: Vec<State>) -> Self {
        Self { states }
    }

    pub(crate) fn current(&self) -> State {
        self.states.last().copied().unwrap_or(State::Pending)
    }

    pub(crate) fn advance(&mut self, next: State) {
        let current = self.current();
        if current.can_advance_to(next) {
            self.states.push(next);
        } else {
            log::error!("illegal state transition {current:?} -> {next:?}");
        }
    }

    pub(crate) fn finish(self, verdict: Verdict) -> Evaluation {
        Evaluation {
            verdict,
            transitions: self.states,
        }
    }
}
