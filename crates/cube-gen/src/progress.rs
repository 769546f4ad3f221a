//! Weighted progress reporting for generator runs.
//!
//! A [`ProgressTracker`] is created with the total amount of work a run is
//! expected to do. Each step declares its weight with
//! [`will_work`](ProgressTracker::will_work) before it starts; the weight of
//! the previous step counts as done at that moment. Fractions always refer
//! to the tracker's total, including inside [`NestedProgress`] scopes.
//!
//! Observers receive a begin notification when the tracker is created and
//! exactly one end notification, either from
//! [`finish`](ProgressTracker::finish) or, when the run fails, from `Drop`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Snapshot handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub label: String,
    /// Label of the step currently running.
    pub stage_label: String,
    pub total_work: f64,
    pub completed_work: f64,
    pub start_time: DateTime<Utc>,
    /// Seconds since the tracker was created.
    pub total_time: f64,
    pub finished: bool,
    /// Set on the end notification of a run that did not finish.
    pub failed: bool,
}

impl ProgressState {
    /// Completed fraction of the total work, within `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_work <= 0.0 {
            return if self.finished { 1.0 } else { 0.0 };
        }
        (self.completed_work / self.total_work).clamp(0.0, 1.0)
    }
}

/// Receives progress notifications of a run.
///
/// Notifications are delivered synchronously on the thread running the
/// generator.
pub trait ProgressObserver: Send + Sync {
    fn on_begin(&self, _state: &ProgressState) {}

    fn on_update(&self, _state: &ProgressState) {}

    fn on_end(&self, _state: &ProgressState) {}
}

/// Forwards progress notifications to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProgressObserver;

impl ProgressObserver for LoggingProgressObserver {
    fn on_begin(&self, state: &ProgressState) {
        info!(label = %state.label, total_work = state.total_work, "Progress started");
    }

    fn on_update(&self, state: &ProgressState) {
        debug!(
            label = %state.label,
            stage = %state.stage_label,
            progress = format!("{:.1}%", state.progress() * 100.0),
            "Progress update"
        );
    }

    fn on_end(&self, state: &ProgressState) {
        if state.failed {
            warn!(
                label = %state.label,
                stage = %state.stage_label,
                progress = format!("{:.1}%", state.progress() * 100.0),
                elapsed_secs = state.total_time,
                "Progress aborted"
            );
        } else {
            info!(
                label = %state.label,
                elapsed_secs = state.total_time,
                "Progress finished"
            );
        }
    }
}

/// Accumulates declared work and notifies observers.
pub struct ProgressTracker<'o> {
    state: ProgressState,
    observers: &'o [Arc<dyn ProgressObserver>],
    started: Instant,
    /// Weight of the step currently running.
    pending: f64,
    ended: bool,
}

impl<'o> ProgressTracker<'o> {
    /// Start tracking `total_work` units and emit the begin notification.
    pub fn begin(label: impl Into<String>, total_work: f64, observers: &'o [Arc<dyn ProgressObserver>]) -> Self {
        let tracker = Self {
            state: ProgressState {
                label: label.into(),
                stage_label: String::new(),
                total_work: total_work.max(0.0),
                completed_work: 0.0,
                start_time: Utc::now(),
                total_time: 0.0,
                finished: false,
                failed: false,
            },
            observers,
            started: Instant::now(),
            pending: 0.0,
            ended: false,
        };
        for observer in tracker.observers {
            observer.on_begin(&tracker.state);
        }
        tracker
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Declare that the next `units` of work are about to start.
    ///
    /// The previously declared step counts as completed.
    pub fn will_work(&mut self, units: f64) {
        self.commit_pending();
        let remaining = (self.state.total_work - self.state.completed_work).max(0.0);
        self.pending = units.max(0.0).min(remaining);
        self.touch();
        for observer in self.observers {
            observer.on_update(&self.state);
        }
    }

    /// Label the next step, then declare its work.
    pub fn begin_step(&mut self, stage_label: impl Into<String>, units: f64) {
        self.state.stage_label = stage_label.into();
        self.will_work(units);
    }

    /// Open a scope that spends `units` of this tracker's work in
    /// `nested_total` units of its own.
    pub fn nested(&mut self, units: f64, nested_total: f64) -> NestedProgress<'_, 'o> {
        let scale = if nested_total > 0.0 { units / nested_total } else { 0.0 };
        NestedProgress {
            parent: self,
            scale,
            remaining: units.max(0.0),
        }
    }

    /// Complete the run and emit the end notification.
    pub fn finish(mut self) -> ProgressState {
        self.commit_pending();
        self.state.finished = true;
        self.emit_end();
        self.state.clone()
    }

    fn commit_pending(&mut self) {
        self.state.completed_work = (self.state.completed_work + self.pending).min(self.state.total_work);
        self.pending = 0.0;
    }

    fn touch(&mut self) {
        self.state.total_time = self.started.elapsed().as_secs_f64();
    }

    fn emit_end(&mut self) {
        self.ended = true;
        self.touch();
        for observer in self.observers {
            observer.on_end(&self.state);
        }
    }
}

impl Drop for ProgressTracker<'_> {
    fn drop(&mut self) {
        if !self.ended {
            // The running step never completed; report what was reached.
            self.state.failed = true;
            self.emit_end();
        }
    }
}

/// A share of a parent tracker's work, declared in its own units.
pub struct NestedProgress<'p, 'o> {
    parent: &'p mut ProgressTracker<'o>,
    scale: f64,
    /// Parent units not yet declared.
    remaining: f64,
}

impl NestedProgress<'_, '_> {
    pub fn will_work(&mut self, units: f64) {
        let parent_units = (units * self.scale).max(0.0).min(self.remaining);
        self.remaining -= parent_units;
        self.parent.will_work(parent_units);
    }

    pub fn begin_step(&mut self, stage_label: impl Into<String>, units: f64) {
        self.parent.state.stage_label = stage_label.into();
        self.will_work(units);
    }

    pub fn state(&self) -> &ProgressState {
        self.parent.state()
    }

    /// Declare whatever share of the scope was not declared yet.
    pub fn finish(mut self) {
        if self.remaining > 0.0 {
            let rest = self.remaining;
            self.remaining = 0.0;
            self.parent.will_work(rest);
        }
    }
}
