//! Confirmation sub-protocol for ask verdicts.
//!
//! The engine suspends in `NeedsConfirmation` and hands a request to a
//! [`Confirmer`]. Every implementation is bounded by a timeout, and anything
//! other than an explicit approval resolves to deny.

use std::io::{BufRead, Write};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRequest {
    pub summary: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmationOutcome {
    Approved,
    Rejected,
    TimedOut,
}

pub trait Confirmer {
    /// Block until the request is answered or `timeout` elapses.
    fn confirm(&self, request: &ConfirmationRequest, timeout: Duration) -> ConfirmationOutcome;
}

/// Confirmer driven through channels, for embedding and tests.
#[derive(Debug)]
pub struct ChannelConfirmer {
    requests: Sender<ConfirmationRequest>,
    answers: Mutex<Receiver<bool>>,
}

/// The answering side of a [`ChannelConfirmer`].
#[derive(Debug)]
pub struct ConfirmationPort {
    requests: Receiver<ConfirmationRequest>,
    answers: Sender<bool>,
}

/// Create a connected confirmer and port.
pub fn channel() -> (ChannelConfirmer, ConfirmationPort) {
    let (request_tx, request_rx) = mpsc::channel();
    let (answer_tx, answer_rx) = mpsc::channel();
    (
        ChannelConfirmer {
            requests: request_tx,
            answers: Mutex::new(answer_rx),
        },
        ConfirmationPort {
            requests: request_rx,
            answers: answer_tx,
        },
    )
}

impl Confirmer for ChannelConfirmer {
    fn confirm(&self, request: &ConfirmationRequest, timeout: Duration) -> ConfirmationOutcome {
        let answers = match self.answers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Answers that arrived after an earlier timeout must not approve this request.
        while answers.try_recv().is_ok() {}

        if self.requests.send(request.clone()).is_err() {
            return ConfirmationOutcome::Rejected;
        }
        match answers.recv_timeout(timeout) {
            Ok(true) => ConfirmationOutcome::Approved,
            Ok(false) => ConfirmationOutcome::Rejected,
            Err(RecvTimeoutError::Timeout) => ConfirmationOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => ConfirmationOutcome::Rejected,
        }
    }
}

impl ConfirmationPort {
    pub fn next_request(&self, timeout: Duration) -> Option<ConfirmationRequest> {
        self.requests.recv_timeout(timeout).ok()
    }

    pub fn answer(&self, approved: bool) -> bool {
        self.answers.send(approved).is_ok()
    }
}

/// Prompts on stderr and reads a `y`/`n` answer from stdin.
#[derive(Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, request: &ConfirmationRequest, timeout: Duration) -> ConfirmationOutcome {
        let mut stderr = std::io::stderr();
        let _ = write!(
            stderr,
            "{}\n  {}\nAllow? [y/N] ({}s) ",
            request.summary,
            request.reason,
            timeout.as_secs()
        );
        let _ = stderr.flush();

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line);
            let _ = tx.send(read.map(|_| line));
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(line)) if is_yes(&line) => ConfirmationOutcome::Approved,
            Ok(_) => ConfirmationOutcome::Rejected,
            Err(RecvTimeoutError::Timeout) => {
                let _ = writeln!(stderr);
                ConfirmationOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => ConfirmationOutcome::Rejected,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ConfirmationRequest {
        ConfirmationRequest {
            summary: "bash: git push --force".into(),
            reason: "force push".into(),
        }
    }

    #[test]
    fn approval_round_trip() {
        let (confirmer, port) = channel();
        let handle = std::thread::spawn(move || {
            let req = port.next_request(Duration::from_secs(5)).unwrap();
            assert_eq!(req.reason, "force push");
            port.answer(true);
            port
        });
        assert_eq!(
            confirmer.confirm(&request(), Duration::from_secs(5)),
            ConfirmationOutcome::Approved
        );
        handle.join().unwrap();
    }

    #[test]
    fn rejection() {
        let (confirmer, port) = channel();
        let handle = std::thread::spawn(move || {
            port.next_request(Duration::from_secs(5)).unwrap();
            port.answer(false);
            port
        });
        assert_eq!(
            confirmer.confirm(&request(), Duration::from_secs(5)),
            ConfirmationOutcome::Rejected
        );
        handle.join().unwrap();
    }

    #[test]
    fn stale_answer_does_not_approve() {
        let (confirmer, port) = channel();
        port.answer(true);
        assert_eq!(
            confirmer.confirm(&request(), Duration::from_millis(50)),
            ConfirmationOutcome::TimedOut
        );
    }

    #[test]
    fn timeout_without_answer() {
        let (confirmer, _port) = channel();
        assert_eq!(
            confirmer.confirm(&request(), Duration::from_millis(20)),
            ConfirmationOutcome::TimedOut
        );
    }

    #[test]
    fn dropped_port_rejects() {
        let (confirmer, port) = channel();
        drop(port);
        assert_eq!(
            confirmer.confirm(&request(), Duration::from_secs(1)),
            ConfirmationOutcome::Rejected
        );
    }

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
    }
}
