// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Per-device state machine with in-flight accounting.
//!
//! ```text
//!   Unattached ──begin_attach──► Probing ──finish_attach(ok)──► Enabled
//!        ▲                          │                              │
//!        │◄──finish_attach(err)─────┘                       begin_detach
//!        │                                                         ▼
//!        └───────────────finish_detach◄── wait_drained ◄──── Detaching
//! ```
//!
//! Operations enter the gate only while it is `Enabled` and hold a
//! `GateGuard` until they finish. Detaching closes the gate to newcomers
//! and `wait_drained` blocks until every guard has dropped.

use core::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not attached, or fully detached.
    Unattached,
    /// Resources are being claimed.
    Probing,
    /// Resources claimed; open, map and commands are served.
    Enabled,
    /// New operations are refused; waiting for in-flight ones.
    Detaching,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unattached => "unattached",
            Self::Probing => "probing",
            Self::Enabled => "enabled",
            Self::Detaching => "detaching",
        };
        f.write_str(name)
    }
}

struct GateInner {
    state: LifecycleState,
    in_flight: usize,
}

/// State machine plus a count of operations currently inside.
pub struct Gate {
    inner: Mutex<GateInner>,
    drained: Condvar,
}

impl Gate {
    /// Create a gate in `Unattached`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                state: LifecycleState::Unattached,
                in_flight: 0,
            }),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Number of operations holding a guard.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// `Unattached` to `Probing`. Returns false from any other state.
    pub fn begin_attach(&self) -> bool {
        self.transition(LifecycleState::Unattached, LifecycleState::Probing)
    }

    /// Leave `Probing` for `Enabled` on success or `Unattached` on failure.
    pub fn finish_attach(&self, claimed: bool) -> bool {
        let to = if claimed {
            LifecycleState::Enabled
        } else {
            LifecycleState::Unattached
        };
        self.transition(LifecycleState::Probing, to)
    }

    /// Admit one operation if the gate is `Enabled`.
    #[must_use]
    pub fn enter(&self) -> Option<GateGuard<'_>> {
        let mut inner = self.lock();
        if inner.state != LifecycleState::Enabled {
            return None;
        }
        inner.in_flight += 1;
        Some(GateGuard { gate: self })
    }

    /// `Enabled` to `Detaching`. Returns false from any other state.
    pub fn begin_detach(&self) -> bool {
        self.transition(LifecycleState::Enabled, LifecycleState::Detaching)
    }

    /// Block until no operation holds a guard.
    pub fn wait_drained(&self) {
        let inner = self.lock();
        let _inner = self
            .drained
            .wait_while(inner, |i| i.in_flight > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// `Detaching` to `Unattached`. Returns false from any other state.
    pub fn finish_detach(&self) -> bool {
        self.transition(LifecycleState::Detaching, LifecycleState::Unattached)
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let mut inner = self.lock();
        if inner.state != from {
            return false;
        }
        inner.state = to;
        true
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// An admitted operation. Dropping it lets a pending detach proceed.
pub struct GateGuard<'a> {
    gate: &'a Gate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.gate.lock();
        inner.in_flight -= 1;
        if inner.in_flight == 0 {
            self.gate.drained.notify_all();
        }
    }
}
