use thiserror::Error;

/// Headroom at startup: the first tick always sends.
pub const INITIAL_CREDIT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    /// Credit available; the next tick may send.
    Armed,
    /// No credit; ticks keep running but send nothing.
    Throttled,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no credit left to send a frame")]
pub struct Throttled;

#[derive(Debug, Clone)]
pub struct Pacer {
    credit: u32,
    sent: u64,
    acknowledged: u64,
    granted: u64,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(INITIAL_CREDIT)
    }
}

impl Pacer {
    pub fn new(initial_credit: u32) -> Self {
        Self {
            credit: initial_credit,
            sent: 0,
            acknowledged: 0,
            granted: u64::from(initial_credit),
        }
    }

    pub fn credit(&self) -> u32 {
        self.credit
    }

    pub fn state(&self) -> PacerState {
        if self.credit > 0 {
            PacerState::Armed
        } else {
            PacerState::Throttled
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state() == PacerState::Armed
    }

    /// Spend one credit for a frame that is being sent.
    pub fn record_send(&mut self) -> Result<(), Throttled> {
        self.credit = self.credit.checked_sub(1).ok_or(Throttled)?;
        self.sent += 1;
        Ok(())
    }

    /// Return one credit for a `PROCESSED` acknowledgement.
    pub fn acknowledge(&mut self) {
        self.credit = self.credit.saturating_add(1);
        self.acknowledged += 1;
        self.granted += 1;
    }

    /// Frames sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Acknowledgements received so far.
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    /// Initial credit plus every acknowledgement.
    pub fn granted(&self) -> u64 {
        self.granted
    }

    /// Frames sent but not yet acknowledged (zero if the backend
    /// acknowledged more than it was sent).
    pub fn in_flight(&self) -> u64 {
        self.sent.saturating_sub(self.acknowledged)
    }
}
