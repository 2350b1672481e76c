// src/task/input.rs

//! Input slots for follower tasks.
//!
//! A [`SingleInputSlot`] holds the one value its owner pushes. A
//! [`MultipleInputBuffer`] accumulates values from several owners and decides,
//! under a single lock, when the follower fires.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::errors::{AutomationError, Result};

/// What a multiple-input follower should do after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDecision<V> {
    /// Threshold not reached yet.
    Wait,
    /// Threshold reached by this event; submit the follower with these inputs.
    Fire(Vec<V>),
    /// The follower already fired; the event changed nothing.
    Ignored,
    /// Failures pushed the threshold below 2; the follower will never fire.
    Abandoned,
}

impl<V> InputDecision<V> {
    pub fn fires(&self) -> bool {
        matches!(self, InputDecision::Fire(_))
    }
}

/// One input slot, no buffering. A second `set_input` overwrites the first.
#[derive(Debug, Default)]
pub struct SingleInputSlot<V> {
    slot: Mutex<Option<V>>,
}

impl<V: Clone> SingleInputSlot<V> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store the input. Returns `true` if a previous value was overwritten.
    pub fn set_input(&self, value: V) -> bool {
        lock(&self.slot).replace(value).is_some()
    }

    pub fn get(&self) -> Option<V> {
        lock(&self.slot).clone()
    }

    pub fn is_set(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

#[derive(Debug)]
struct BufferState<V> {
    threshold: usize,
    inputs: Vec<V>,
    owners: Vec<String>,
    fired: bool,
    abandoned: bool,
}

/// Input buffer of a follower fed by several owners.
///
/// Invariants:
/// - fires at most once, exactly when `buffered == threshold`;
/// - a failure decrements the threshold while it is at least 2;
/// - a threshold brought below 2 by failures abandons the follower.
///
/// A threshold of 1 set at construction is legal and fires on the first input.
#[derive(Debug)]
pub struct MultipleInputBuffer<V> {
    label: String,
    state: Mutex<BufferState<V>>,
}

impl<V: Clone> MultipleInputBuffer<V> {
    pub fn new(label: impl Into<String>, threshold: usize) -> Result<Self> {
        let label = label.into();
        if threshold == 0 {
            return Err(AutomationError::FollowerConfig {
                task: label,
                reason: "input threshold must be >= 1 (got 0)".to_string(),
            });
        }

        Ok(Self {
            label,
            state: Mutex::new(BufferState {
                threshold,
                inputs: Vec::new(),
                owners: Vec::new(),
                fired: false,
                abandoned: false,
            }),
        })
    }

    /// Reconfigure the threshold. Only legal before any input arrived.
    pub fn set_input_threshold(&self, threshold: usize) -> Result<()> {
        let mut state = lock(&self.state);

        if threshold == 0 {
            return Err(AutomationError::FollowerConfig {
                task: self.label.clone(),
                reason: "input threshold must be >= 1 (got 0)".to_string(),
            });
        }
        if state.fired || state.abandoned || !state.inputs.is_empty() {
            return Err(AutomationError::FollowerConfig {
                task: self.label.clone(),
                reason: "input threshold must be set before any input arrives".to_string(),
            });
        }

        state.threshold = threshold;
        Ok(())
    }

    /// Append an input from `owner`.
    pub fn add_input(&self, owner: &str, value: V) -> InputDecision<V> {
        let mut state = lock(&self.state);

        if state.fired {
            debug!(task = %self.label, owner = %owner, "input after follower fired; ignoring");
            return InputDecision::Ignored;
        }
        if state.abandoned {
            debug!(task = %self.label, owner = %owner, "input for abandoned follower; ignoring");
            return InputDecision::Abandoned;
        }

        state.inputs.push(value);
        state.owners.push(owner.to_string());

        debug!(
            task = %self.label,
            owner = %owner,
            buffered = state.inputs.len(),
            threshold = state.threshold,
            "input added"
        );

        if state.inputs.len() == state.threshold {
            state.fired = true;
            InputDecision::Fire(state.inputs.clone())
        } else {
            InputDecision::Wait
        }
    }

    /// Record that `owner` failed or was cancelled and will never deliver.
    pub fn input_failed(&self, owner: &str) -> InputDecision<V> {
        let mut state = lock(&self.state);

        if state.fired {
            debug!(task = %self.label, owner = %owner, "owner failure after follower fired; ignoring");
            return InputDecision::Ignored;
        }
        if state.abandoned {
            return InputDecision::Abandoned;
        }

        if state.threshold >= 2 {
            state.threshold -= 1;
        }

        if state.threshold < 2 {
            state.abandoned = true;
            warn!(
                task = %self.label,
                owner = %owner,
                buffered = state.inputs.len(),
                "input threshold fell below 2; follower abandoned"
            );
            return InputDecision::Abandoned;
        }

        debug!(
            task = %self.label,
            owner = %owner,
            threshold = state.threshold,
            buffered = state.inputs.len(),
            "owner failed; threshold reduced"
        );

        if state.threshold == state.inputs.len() {
            state.fired = true;
            InputDecision::Fire(state.inputs.clone())
        } else {
            InputDecision::Wait
        }
    }

    pub fn threshold(&self) -> usize {
        lock(&self.state).threshold
    }

    pub fn buffered(&self) -> usize {
        lock(&self.state).inputs.len()
    }

    /// Snapshot of the buffered inputs in arrival order.
    pub fn inputs(&self) -> Vec<V> {
        lock(&self.state).inputs.clone()
    }

    /// Owners whose inputs are buffered, in arrival order.
    pub fn owners(&self) -> Vec<String> {
        lock(&self.state).owners.clone()
    }

    pub fn has_fired(&self) -> bool {
        lock(&self.state).fired
    }

    pub fn is_abandoned(&self) -> bool {
        lock(&self.state).abandoned
    }
}

/// The guarded state is updated in single statements, so a panic elsewhere
/// never leaves it half-written.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
