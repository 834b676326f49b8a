// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Attached devices keyed by bus handle.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::gate::Gate;
use crate::platform::{DeviceHandle, Mmio};
use crate::resource::DeviceState;

/// One attached (or attaching) device.
pub struct DeviceEntry<I: Mmio> {
    handle: DeviceHandle,
    minor: u32,
    pub(crate) gate: Gate,
    pub(crate) device: OnceLock<DeviceState<I>>,
}

impl<I: Mmio> DeviceEntry<I> {
    pub(crate) const fn new(handle: DeviceHandle, minor: u32) -> Self {
        Self {
            handle,
            minor,
            gate: Gate::new(),
            device: OnceLock::new(),
        }
    }

    /// Bus handle of the device.
    #[must_use]
    pub const fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Minor identity the device is served under.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Claimed state, once probing succeeded.
    #[must_use]
    pub fn device(&self) -> Option<&DeviceState<I>> {
        self.device.get()
    }
}

/// Devices known to the driver.
///
/// Lookups hand out `Arc`s so no shard lock is held while an operation
/// runs or a detach waits.
pub struct DeviceRegistry<I: Mmio> {
    entries: DashMap<DeviceHandle, Arc<DeviceEntry<I>>>,
}

impl<I: Mmio> DeviceRegistry<I> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Add `entry`, returning false if its handle is already present.
    pub fn insert(&self, entry: Arc<DeviceEntry<I>>) -> bool {
        match self.entries.entry(entry.handle()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Entry for `handle`.
    #[must_use]
    pub fn get(&self, handle: DeviceHandle) -> Option<Arc<DeviceEntry<I>>> {
        self.entries.get(&handle).map(|e| Arc::clone(e.value()))
    }

    /// Remove and return the entry for `handle`.
    pub fn remove(&self, handle: DeviceHandle) -> Option<Arc<DeviceEntry<I>>> {
        self.entries.remove(&handle).map(|(_, entry)| entry)
    }

    /// Returns true if `handle` is present.
    #[must_use]
    pub fn contains(&self, handle: DeviceHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Entry served under `minor`.
    #[must_use]
    pub fn by_minor(&self, minor: u32) -> Option<Arc<DeviceEntry<I>>> {
        self.entries
            .iter()
            .find(|e| e.minor() == minor)
            .map(|e| Arc::clone(e.value()))
    }

    /// Lowest minor in `base..base + count` not yet taken.
    #[must_use]
    pub fn free_minor(&self, base: u32, count: u32) -> Option<u32> {
        (base..base.saturating_add(count)).find(|&minor| self.by_minor(minor).is_none())
    }

    /// Handles of every entry, in ascending order.
    #[must_use]
    pub fn handles(&self) -> Vec<DeviceHandle> {
        let mut handles: Vec<_> = self.entries.iter().map(|e| *e.key()).collect();
        handles.sort_unstable();
        handles
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no device is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<I: Mmio> Default for DeviceRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}
