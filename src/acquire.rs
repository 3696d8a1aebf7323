//! Acquisition policy: decides when the accumulated fix is usable.
//!
//! One acquisition is a bounded run of read attempts. It is satisfied once
//! both GGA and RMC have arrived during the run and more than `min_reads`
//! attempts have succeeded, so the combined fix is fresh rather than merely
//! complete. It fails once `max_reads` successful reads pass without that,
//! or once more than `max_errors` transport failures occur in a row.

use thiserror::Error;

use crate::fix::FixRecord;
use crate::sentence::SentenceType;
use crate::source::TransportError;

/// Errors that end an acquisition.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("transport failed {attempts} times in a row: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error(
        "could not gather enough data after {reads} reads (possibly corrupt stream or wrong device)"
    )]
    DataTimeout { reads: u32 },

    #[error("acquisition cancelled")]
    Cancelled,
}

impl AcquireError {
    /// Returns true if the byte source is gone for good.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, AcquireError::Transport { source, .. } if source.is_disconnect())
    }
}

/// Read and error budgets for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    /// Successful reads that must be exceeded before a fix is accepted.
    pub min_reads: u32,

    /// Successful reads after which the acquisition gives up.
    pub max_reads: u32,

    /// Consecutive transport failures tolerated.
    pub max_errors: u32,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            min_reads: 5,
            max_reads: 25,
            max_errors: 5,
        }
    }
}

/// Where an acquisition stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Satisfied,
    Failed,
}

/// Outcome of a finished acquisition.
#[derive(Debug)]
pub enum Acquisition {
    Satisfied(FixRecord),
    Failed(AcquireError),
}

impl Acquisition {
    pub fn into_result(self) -> Result<FixRecord, AcquireError> {
        match self {
            Acquisition::Satisfied(fix) => Ok(fix),
            Acquisition::Failed(e) => Err(e),
        }
    }
}

/// Per-acquisition counters, created fresh for every run.
#[derive(Debug, Clone)]
pub struct AcquisitionState {
    policy: AcquisitionPolicy,
    reads: u32,
    errors: u32,
    saw_gga: bool,
    saw_rmc: bool,
    phase: Phase,
}

impl AcquisitionState {
    pub fn new(policy: AcquisitionPolicy) -> Self {
        Self {
            policy,
            reads: 0,
            errors: 0,
            saw_gga: false,
            saw_rmc: false,
            phase: Phase::Reading,
        }
    }

    pub fn reads(&self) -> u32 {
        self.reads
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Record a successful read attempt that produced a sentence of `kind`.
    pub fn record_read(&mut self, kind: SentenceType) -> Result<Phase, AcquireError> {
        debug_assert_eq!(self.phase, Phase::Reading);

        self.reads += 1;
        self.errors = 0;
        match kind {
            SentenceType::Gga => self.saw_gga = true,
            SentenceType::Rmc => self.saw_rmc = true,
            _ => {}
        }

        if self.saw_gga && self.saw_rmc && self.reads > self.policy.min_reads {
            self.phase = Phase::Satisfied;
        } else if self.reads > self.policy.max_reads {
            self.phase = Phase::Failed;
            return Err(AcquireError::DataTimeout { reads: self.reads });
        }

        Ok(self.phase)
    }

    /// Record a failed read attempt.
    pub fn record_failure(&mut self, error: TransportError) -> Result<Phase, AcquireError> {
        debug_assert_eq!(self.phase, Phase::Reading);

        self.errors += 1;
        if self.errors > self.policy.max_errors {
            self.phase = Phase::Failed;
            return Err(AcquireError::Transport {
                attempts: self.errors,
                source: error,
            });
        }

        Ok(self.phase)
    }
}
