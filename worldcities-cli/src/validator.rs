//! Restartable asynchronous duplicate validation
//!
//! Every value change opens a new generation. A check started for an older
//! generation may still complete, but its answer is dropped: the most
//! recently started check wins, whatever order the answers arrive in.

use std::fmt;
use std::future::Future;

use crate::error::Result;

/// Proof that a check was started for a particular generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Monotonic generation counter shared by validators and list views
#[derive(Debug, Default, Clone)]
pub struct Generations {
    current: u64,
}

impl Generations {
    /// Open a new generation; every earlier ticket becomes stale
    pub fn next(&mut self) -> Ticket {
        self.current += 1;
        Ticket(self.current)
    }

    /// Whether `ticket` belongs to the latest generation
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.current
    }

    /// Latest generation number
    pub fn current(&self) -> u64 {
        self.current
    }
}

/// State of one validated control
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationState {
    /// Not checked since the last change
    #[default]
    Idle,
    /// A check is in flight
    Pending,
    /// No other record holds the value
    Valid,
    /// Another record already holds the value
    Invalid,
    /// The check itself failed
    Failed(String),
}

impl ValidationState {
    /// Whether a form showing this state may be submitted
    pub fn blocks_submit(&self) -> bool {
        matches!(self, Self::Pending | Self::Invalid | Self::Failed(_))
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "not checked"),
            Self::Pending => write!(f, "checking"),
            Self::Valid => write!(f, "unique"),
            Self::Invalid => write!(f, "already exists"),
            Self::Failed(message) => write!(f, "check failed: {}", message),
        }
    }
}

/// Duplicate validator of one control (or one whole record)
#[derive(Debug, Default, Clone)]
pub struct DupeValidator {
    state: ValidationState,
    generations: Generations,
}

impl DupeValidator {
    /// An idle validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    /// Forget any result; in-flight checks become stale
    pub fn reset(&mut self) {
        self.generations.next();
        self.state = ValidationState::Idle;
    }

    /// Start a check of the whole record
    pub fn start(&mut self) -> Ticket {
        self.state = ValidationState::Pending;
        self.generations.next()
    }

    /// Start a check of `value`
    ///
    /// An empty value is valid without asking the server, so no ticket is
    /// issued for it.
    pub fn start_for(&mut self, value: &str) -> Option<Ticket> {
        if value.trim().is_empty() {
            self.generations.next();
            self.state = ValidationState::Valid;
            None
        } else {
            Some(self.start())
        }
    }

    /// Record the answer of the check started with `ticket`
    ///
    /// Returns `false`, leaving the state untouched, when the ticket is stale.
    pub fn resolve(&mut self, ticket: Ticket, outcome: Result<bool>) -> bool {
        if !self.generations.is_current(ticket) {
            return false;
        }

        self.state = match outcome {
            Ok(true) => ValidationState::Invalid,
            Ok(false) => ValidationState::Valid,
            Err(e) => ValidationState::Failed(e.to_string()),
        };
        true
    }

    /// Run `check` for the whole record and record its answer
    pub async fn check<F>(&mut self, check: F) -> &ValidationState
    where
        F: Future<Output = Result<bool>>,
    {
        let ticket = self.start();
        let outcome = check.await;
        self.resolve(ticket, outcome);
        &self.state
    }

    /// Run `check` for `value` unless it is empty
    pub async fn check_value<F>(&mut self, value: &str, check: F) -> &ValidationState
    where
        F: Future<Output = Result<bool>>,
    {
        if let Some(ticket) = self.start_for(value) {
            let outcome = check.await;
            self.resolve(ticket, outcome);
        }
        &self.state
    }
}
