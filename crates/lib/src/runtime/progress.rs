//! Step progress notifications.
//!
//! Notifications travel over an unbounded channel so reporting never blocks a
//! step. Sends are fire-and-forget: a dropped receiver is not an error.

use tokio::sync::mpsc;

/// `fraction` of step `step` (0-based) out of `total` is done.
///
/// The final message of a successful run has `step == total` and
/// `fraction == 1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
  pub step: usize,
  pub total: usize,
  pub fraction: f64,
}

pub type ProgressSender = mpsc::UnboundedSender<Progress>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<Progress>;

pub fn channel() -> (ProgressSender, ProgressReceiver) {
  mpsc::unbounded_channel()
}

/// Progress reporter handed to collaborators for a single step.
#[derive(Debug, Clone)]
pub struct StepProgress {
  sender: Option<ProgressSender>,
  step: usize,
  total: usize,
}

impl StepProgress {
  pub fn new(sender: ProgressSender, step: usize, total: usize) -> Self {
    Self {
      sender: Some(sender),
      step,
      total,
    }
  }

  /// A reporter that goes nowhere.
  pub fn detached() -> Self {
    Self {
      sender: None,
      step: 0,
      total: 0,
    }
  }

  pub fn step(&self) -> usize {
    self.step
  }

  /// Report a fraction in `[0, 1]`; out-of-range values are clamped.
  pub fn report(&self, fraction: f64) {
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    if let Some(sender) = &self.sender {
      let _ = sender.send(Progress {
        step: self.step,
        total: self.total,
        fraction,
      });
    }
  }

  /// Report `done` out of `size` units.
  pub fn report_ratio(&self, done: u64, size: u64) {
    if size == 0 {
      self.report(1.0);
    } else {
      self.report(done as f64 / size as f64);
    }
  }
}
