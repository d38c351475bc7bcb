use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::task::TaskId;
use crate::pool::VmInstanceId;

/// Spot instances younger than this are never interrupted.
pub const GRACE_PERIOD_SECS: f64 = 60.0;

/// Fraction of remaining work added when resuming from a checkpoint.
pub const CHECKPOINT_OVERHEAD: f64 = 0.02;

/// Default interval between interruption checks.
pub const DEFAULT_CHECK_INTERVAL_SECS: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotConfig {
    /// Per-check interruption probability; clamped into `[0, 1]`.
    pub interruption_probability: f64,
    pub check_interval_secs: f64,
    pub seed: u64,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self { interruption_probability: 0.1, check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS, seed: 42 }
    }
}

/// Recorded progress of a task at the moment of interruption.
///
/// Created on interruption, consumed on resume; the model keeps at most one
/// live checkpoint per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub task: TaskId,

    /// Completed-work fraction in `[0, 1]`.
    pub completed_fraction: f64,

    /// Simulation time the checkpoint was taken.
    pub timestamp: f64,

    /// Total work units of the task.
    pub total_work: f64,
}

impl Checkpoint {
    pub fn remaining_work(&self) -> f64 {
        self.total_work * (1.0 - self.completed_fraction)
    }

    pub fn completion_percentage(&self) -> f64 {
        self.completed_fraction * 100.0
    }
}

/// A single spot-capacity reclaim event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptionEvent {
    pub instance: VmInstanceId,
    pub time: f64,
    pub reason: String,
}

/// Stochastic spot-interruption and checkpoint model.
///
/// Draws from a seeded generator so a fixed seed reproduces the exact same
/// interruption pattern.
#[derive(Debug)]
pub struct SpotInterruptModel {
    probability: f64,
    check_interval: f64,
    rng: StdRng,
    events: Vec<InterruptionEvent>,
    checkpoints: HashMap<TaskId, Checkpoint>,
    checkpoints_created: usize,
}

impl SpotInterruptModel {
    pub fn new(config: SpotConfig) -> Self {
        let probability = config.interruption_probability.clamp(0.0, 1.0);
        if probability != config.interruption_probability {
            log::warn!("Interruption probability {} outside [0,1], clamped to {}", config.interruption_probability, probability);
        }
        Self {
            probability,
            check_interval: config.check_interval_secs,
            rng: StdRng::seed_from_u64(config.seed),
            events: Vec::new(),
            checkpoints: HashMap::new(),
            checkpoints_created: 0,
        }
    }

    /// Checks whether a spot instance is interrupted at `current_time`.
    ///
    /// Instances inside the grace period are never interrupted. Otherwise a
    /// single draw from the seeded generator decides; a hit is logged as an
    /// [`InterruptionEvent`].
    pub fn should_interrupt(&mut self, instance: VmInstanceId, current_time: f64, start_time: f64) -> bool {
        let running_time = current_time - start_time;
        if running_time < GRACE_PERIOD_SECS {
            return false;
        }

        if self.rng.random::<f64>() < self.probability {
            self.events.push(InterruptionEvent { instance, time: current_time, reason: "Spot capacity reclaimed".to_string() });
            return true;
        }
        return false;
    }

    /// Sweeps a set of spot instances over `[start, end]` at the configured
    /// check interval, removing interrupted instances from the active set.
    ///
    /// # Returns
    /// The events produced by this sweep.
    pub fn simulate_window(&mut self, instances: &[VmInstanceId], start: f64, end: f64) -> Vec<InterruptionEvent> {
        let before = self.events.len();
        let mut active: Vec<VmInstanceId> = instances.to_vec();

        let mut time = start;
        while time <= end {
            active.retain(|&instance| !self.should_interrupt(instance, time, start));
            time += self.check_interval;
        }

        return self.events[before..].to_vec();
    }

    /// Records a checkpoint for a task, replacing any previous one.
    ///
    /// The completed fraction is `min(1, executed / total)`, zero for a
    /// zero-work task.
    pub fn create_checkpoint(&mut self, task: TaskId, executed_time: f64, total_time: f64, current_time: f64) -> Checkpoint {
        let completed_fraction = if total_time > 0.0 { (executed_time / total_time).min(1.0) } else { 0.0 };
        let checkpoint = Checkpoint { task, completed_fraction, timestamp: current_time, total_work: total_time };
        self.checkpoints.insert(task, checkpoint.clone());
        self.checkpoints_created += 1;
        log::debug!("Checkpoint for task {} at {:.1}% completion", task, checkpoint.completion_percentage());
        return checkpoint;
    }

    /// Consumes the live checkpoint of a task and returns the remaining
    /// work adjusted by the fixed checkpoint overhead.
    pub fn resume_from_checkpoint(&mut self, task: TaskId) -> Option<f64> {
        let checkpoint = self.checkpoints.remove(&task)?;
        Some(checkpoint.remaining_work() * (1.0 + CHECKPOINT_OVERHEAD))
    }

    pub fn live_checkpoint(&self, task: TaskId) -> Option<&Checkpoint> {
        self.checkpoints.get(&task)
    }

    /// Live (not yet resumed) checkpoints.
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Checkpoints taken over the model's lifetime, resumed ones included.
    pub fn checkpoints_created(&self) -> usize {
        self.checkpoints_created
    }

    /// Work lost at interruption: zero with a checkpoint, everything
    /// executed so far without one.
    pub fn work_lost(executed_time: f64, has_checkpoint: bool) -> f64 {
        if has_checkpoint { 0.0 } else { executed_time }
    }

    /// Expected time between interruptions under the geometric model,
    /// in units of checks; infinite for probability zero.
    pub fn mean_time_to_interruption(&self) -> f64 {
        if self.probability == 0.0 {
            return f64::INFINITY;
        }
        return 1.0 / self.probability;
    }

    pub fn interruption_count(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[InterruptionEvent] {
        &self.events
    }
}
