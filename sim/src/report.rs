//! How a run ended and what the process should exit with.

use std::fmt;

use crate::framework::EvalFault;

/// Exit status of a run cut short by the cycle budget.
pub const TIMEOUT_STATUS: i32 = 2;
/// Exit status of a run stopped by a model fault.
pub const EVAL_FAULT_STATUS: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// the agent finished with a non-zero code
    Failure { code: i32 },
    EvaluationError { fault: EvalFault },
    Timeout,
}

impl Outcome {
    /// Classify a finished run. A model fault wins over anything the agent
    /// says, and an agent failure wins over the budget.
    pub fn classify(
        fault: Option<&EvalFault>,
        exit_code: i32,
        cycles: u64,
        max_cycles: Option<u64>,
    ) -> Self {
        if let Some(fault) = fault {
            Self::EvaluationError {
                fault: fault.clone(),
            }
        } else if exit_code != 0 {
            Self::Failure { code: exit_code }
        } else if max_cycles == Some(cycles) {
            Self::Timeout
        } else {
            Self::Success
        }
    }

    pub fn exit_status(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure { code } => *code,
            Self::EvaluationError { .. } => EVAL_FAULT_STATUS,
            Self::Timeout => TIMEOUT_STATUS,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: Outcome,
    pub seed: u64,
    /// Cycles run. For a model fault, the cycle it was raised on.
    pub cycles: u64,
    /// Payloads handed to the agent on a faulted cycle. They were valid on
    /// the port but come from a model that already reported an error.
    pub unverified_sends: usize,
}

impl RunReport {
    pub fn exit_status(&self) -> i32 {
        self.outcome.exit_status()
    }

    /// The final diagnostic line. Successful runs only get one when
    /// `announce_success` is set.
    pub fn message(&self, announce_success: bool) -> Option<String> {
        if self.outcome.is_success() && !announce_success {
            return None;
        }
        Some(self.to_string())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (seed, cycles) = (self.seed, self.cycles);
        match &self.outcome {
            Outcome::Success => write!(f, "Completed after {cycles} cycles"),
            Outcome::Failure { code } => write!(
                f,
                "*** FAILED *** (code = {code}, seed {seed}) after {cycles} cycles"
            ),
            Outcome::Timeout => {
                write!(f, "*** FAILED *** (timeout, seed {seed}) after {cycles} cycles")
            }
            Outcome::EvaluationError { fault } => {
                write!(
                    f,
                    "*** FAILED *** (evaluation fault: {fault}, seed {seed}) after {cycles} cycles"
                )?;
                if self.unverified_sends > 0 {
                    write!(
                        f,
                        ", {} unverified payload(s) sent on the faulted cycle",
                        self.unverified_sends
                    )?;
                }
                Ok(())
            }
        }
    }
}
