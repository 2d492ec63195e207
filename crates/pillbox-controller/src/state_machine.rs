//! Drawer state machine.
//!
//! One [`DrawerMonitor`] watches the RFID reader beneath one drawer. The
//! drawer tag is in range while the drawer is open, so a tag appearing
//! means "opened" and the tag leaving range means "closed".
//!
//! # States
//!
//! - `Idle`: no tag near the reader
//! - `TagPresent`: a tag was just detected (left immediately for `DrawerOpen`)
//! - `DrawerOpen`: the tag is in range
//! - `Settling`: the tag left range; waiting for the lighting to settle
//!
//! # Valid Transitions
//!
//! - Idle → TagPresent → DrawerOpen → Settling → Idle
//! - Settling → TagPresent (drawer reopened before the capture)
//!
//! Time is always passed in by the caller; the monitor never reads a clock.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use pillbox_core::{Classification, CompartmentId, TagId};
//! use pillbox_controller::{DrawerEvent, DrawerMonitor, DrawerState};
//!
//! let mut monitor = DrawerMonitor::new(CompartmentId::new(2).unwrap(), Duration::from_secs(5));
//! let classify = |_: &TagId| Classification::Authorized;
//! let tag = TagId::new("1047839255856").unwrap();
//! let t0 = Instant::now();
//!
//! monitor.observe(Some(&tag), t0, classify).unwrap();
//! assert_eq!(monitor.current_state(), DrawerState::DrawerOpen);
//!
//! monitor.observe(None, t0 + Duration::from_secs(1), classify).unwrap();
//! assert_eq!(monitor.current_state(), DrawerState::Settling);
//!
//! let events = monitor.observe(None, t0 + Duration::from_secs(6), classify).unwrap();
//! assert!(matches!(events[0], DrawerEvent::SettleElapsed { authorized: true, .. }));
//! assert_eq!(monitor.current_state(), DrawerState::Idle);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use pillbox_core::{Classification, CompartmentId, Error, Result, TagId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of state transitions to keep in history.
///
/// A full drawer cycle takes four transitions, so this keeps the last 25
/// cycles of one drawer.
const MAX_HISTORY_SIZE: usize = 100;

/// States of one drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawerState {
    /// No tag near the reader.
    Idle,

    /// Tag detected; transient.
    TagPresent,

    /// Tag in range, drawer open.
    DrawerOpen,

    /// Tag left range; the settle timer is running.
    Settling,
}

impl fmt::Display for DrawerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            DrawerState::Idle => "IDLE",
            DrawerState::TagPresent => "TAG_PRESENT",
            DrawerState::DrawerOpen => "DRAWER_OPEN",
            DrawerState::Settling => "SETTLING",
        };
        f.write_str(state_str)
    }
}

impl DrawerState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use pillbox_controller::DrawerState;
    ///
    /// assert!(DrawerState::Idle.can_transition_to(&DrawerState::TagPresent));
    /// assert!(DrawerState::Settling.can_transition_to(&DrawerState::TagPresent));
    /// assert!(!DrawerState::Idle.can_transition_to(&DrawerState::Settling));
    /// ```
    pub fn can_transition_to(&self, target: &DrawerState) -> bool {
        matches!(
            (self, target),
            (DrawerState::Idle, DrawerState::TagPresent)
                | (DrawerState::TagPresent, DrawerState::DrawerOpen)
                | (DrawerState::DrawerOpen, DrawerState::Settling)
                | (DrawerState::Settling, DrawerState::Idle | DrawerState::TagPresent)
        )
    }
}

/// A single state transition with the time it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: DrawerState,
    pub to: DrawerState,
    pub timestamp: Instant,
}

/// What a drawer observation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawerEvent {
    /// A tag came into range, or a different tag replaced the one in range.
    TagArrived {
        tag: TagId,
        classification: Classification,
    },

    /// The tag left range; the settle timer started.
    DrawerClosed,

    /// The drawer was reopened while settling; no capture will happen for
    /// the previous cycle.
    SettleCancelled,

    /// The settle timer expired: exactly one capture is due.
    ///
    /// `authorized` is `true` only if every tag seen during the cycle was
    /// authorized.
    SettleElapsed { tag: TagId, authorized: bool },
}

/// State machine of one drawer.
///
/// # Thread Safety
///
/// This struct is not thread-safe by design; the controller owns one per
/// compartment and drives it from a single task.
#[derive(Debug)]
pub struct DrawerMonitor {
    compartment: CompartmentId,

    current_state: DrawerState,

    /// When the current state was entered.
    state_entered_at: Option<Instant>,

    /// History of state transitions (limited to MAX_HISTORY_SIZE).
    history: VecDeque<StateTransition>,

    settle_delay: Duration,

    /// Deadline of the running settle timer.
    settle_deadline: Option<Instant>,

    /// Tag of the current cycle (last one seen in range).
    cycle_tag: Option<TagId>,

    /// Fail-closed: cleared by any unauthorized tag seen during the cycle.
    cycle_authorized: bool,
}

impl DrawerMonitor {
    /// Create a monitor in the Idle state.
    pub fn new(compartment: CompartmentId, settle_delay: Duration) -> Self {
        Self {
            compartment,
            current_state: DrawerState::Idle,
            state_entered_at: None,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            settle_delay,
            settle_deadline: None,
            cycle_tag: None,
            cycle_authorized: false,
        }
    }

    pub fn compartment(&self) -> CompartmentId {
        self.compartment
    }

    pub fn current_state(&self) -> DrawerState {
        self.current_state
    }

    /// Time spent in the current state as of `now`.
    ///
    /// Zero if the monitor never left its initial state.
    pub fn time_in_current_state(&self, now: Instant) -> Duration {
        self.state_entered_at
            .map_or(Duration::ZERO, |entered| now.saturating_duration_since(entered))
    }

    /// Time left before the capture is due, if settling.
    pub fn settle_remaining(&self, now: Instant) -> Option<Duration> {
        self.settle_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Tag of the cycle in progress, if any.
    pub fn cycle_tag(&self) -> Option<&TagId> {
        self.cycle_tag.as_ref()
    }

    /// Get a reference to the state transition history, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last N state transitions.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }

    /// Feed one reader sample taken at `now`.
    ///
    /// `reading` is the tag in range, `None` if the reader saw nothing.
    /// `classify` is consulted for every tag that starts a cycle or replaces
    /// the tag in range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the internal state became
    /// inconsistent; the state is left unchanged in that case.
    pub fn observe<F>(
        &mut self,
        reading: Option<&TagId>,
        now: Instant,
        classify: F,
    ) -> Result<Vec<DrawerEvent>>
    where
        F: Fn(&TagId) -> Classification,
    {
        let mut events = Vec::new();

        match (self.current_state, reading) {
            (DrawerState::Idle, None) => {}

            (DrawerState::Idle, Some(tag)) => {
                self.start_cycle(tag, now, &classify, &mut events)?;
            }

            // Reopened before the capture: the pending capture is dropped.
            (DrawerState::Settling, Some(tag)) => {
                self.settle_deadline = None;
                events.push(DrawerEvent::SettleCancelled);
                self.start_cycle(tag, now, &classify, &mut events)?;
            }

            (DrawerState::DrawerOpen, Some(tag)) => {
                if self.cycle_tag.as_ref() != Some(tag) {
                    let classification = classify(tag);
                    self.cycle_authorized &= classification.is_authorized();
                    self.cycle_tag = Some(tag.clone());
                    events.push(DrawerEvent::TagArrived {
                        tag: tag.clone(),
                        classification,
                    });
                }
            }

            (DrawerState::DrawerOpen, None) => {
                self.transition_to(DrawerState::Settling, now)?;
                self.settle_deadline = Some(now + self.settle_delay);
                events.push(DrawerEvent::DrawerClosed);
            }

            (DrawerState::Settling, None) => {
                if self.settle_deadline.is_some_and(|deadline| now >= deadline) {
                    self.transition_to(DrawerState::Idle, now)?;
                    self.settle_deadline = None;
                    if let Some(tag) = self.cycle_tag.take() {
                        events.push(DrawerEvent::SettleElapsed {
                            tag,
                            authorized: self.cycle_authorized,
                        });
                    }
                    self.cycle_authorized = false;
                }
            }

            // Transient state: finish entering the drawer-open state.
            (DrawerState::TagPresent, _) => {
                self.transition_to(DrawerState::DrawerOpen, now)?;
            }
        }

        Ok(events)
    }

    fn start_cycle<F>(
        &mut self,
        tag: &TagId,
        now: Instant,
        classify: &F,
        events: &mut Vec<DrawerEvent>,
    ) -> Result<()>
    where
        F: Fn(&TagId) -> Classification,
    {
        self.transition_to(DrawerState::TagPresent, now)?;

        let classification = classify(tag);
        self.cycle_tag = Some(tag.clone());
        self.cycle_authorized = classification.is_authorized();
        events.push(DrawerEvent::TagArrived {
            tag: tag.clone(),
            classification,
        });

        self.transition_to(DrawerState::DrawerOpen, now)?;
        Ok(())
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not
    /// allowed from the current state.
    pub fn transition_to(&mut self, new_state: DrawerState, now: Instant) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition {
            from: self.current_state,
            to: new_state,
            timestamp: now,
        };

        debug!(
            compartment = %self.compartment,
            from = %transition.from,
            to = %transition.to,
            "drawer transition"
        );

        self.current_state = new_state;
        self.state_entered_at = Some(now);
        self.add_to_history(transition.clone());

        Ok(transition)
    }

    /// Force the monitor back to Idle, dropping any cycle in progress.
    pub fn reset(&mut self, now: Instant) -> StateTransition {
        let transition = StateTransition {
            from: self.current_state,
            to: DrawerState::Idle,
            timestamp: now,
        };

        self.current_state = DrawerState::Idle;
        self.state_entered_at = Some(now);
        self.settle_deadline = None;
        self.cycle_tag = None;
        self.cycle_authorized = false;
        self.add_to_history(transition.clone());

        transition
    }

    fn add_to_history(&mut self, transition: StateTransition) {
        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}
