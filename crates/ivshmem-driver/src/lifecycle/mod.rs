// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Attach, detach and gating of device operations.
//!
//! The controller owns every `DeviceState`. Bus attach events claim a
//! device into the registry; detach events close its gate, wait for
//! in-flight maps and commands, and only then release the resources.
//! Maps, commands and opens are served only while the device is
//! `Enabled`.

mod gate;
mod registry;

#[cfg(test)]
mod lifecycle_test;

use std::sync::{Arc, Mutex, PoisonError};

use ivshmem_abi::{ControlCommand, Vaddr};
use tracing::{debug, error, info, warn};

pub use gate::{Gate, GateGuard, LifecycleState};
pub use registry::{DeviceEntry, DeviceRegistry};

use crate::command::CommandDispatcher;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::mapping::{MappingBridge, MappingRequest};
use crate::platform::{AddressSpace, DeviceHandle, PciBus};
use crate::resource::{DeviceState, ResourceManager};

/// Drives devices through `Unattached → Probing → Enabled → Detaching`.
pub struct Lifecycle<B: PciBus> {
    resources: ResourceManager<B>,
    registry: DeviceRegistry<B::Io>,
    bridge: MappingBridge,
    dispatcher: CommandDispatcher,
    config: DriverConfig,
    attach_lock: Mutex<()>,
}

impl<B: PciBus> Lifecycle<B> {
    /// Create a controller for devices on `bus`.
    #[must_use]
    pub fn new(bus: Arc<B>, config: DriverConfig) -> Self {
        Self {
            resources: ResourceManager::new(bus, config.register_window_len),
            registry: DeviceRegistry::new(),
            bridge: MappingBridge::new(),
            dispatcher: CommandDispatcher::new(config.command_policy),
            config,
            attach_lock: Mutex::new(()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The underlying bus.
    #[must_use]
    pub fn bus(&self) -> &B {
        self.resources.bus()
    }

    /// Devices currently known.
    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry<B::Io> {
        &self.registry
    }

    /// Claim `handle` and return the minor identity it is served under.
    ///
    /// # Errors
    ///
    /// - `NoSuchDevice` if the device does not match the configured id
    /// - `ResourceUnavailable` if the device is already attached, every
    ///   minor is taken, or claiming its resources fails
    pub fn attach(&self, handle: DeviceHandle) -> Result<u32, DriverError> {
        match self.bus().device_id(handle) {
            Some(id) if id == self.config.pci_id => {}
            other => {
                debug!(%handle, id = ?other, "device not in match table");
                return Err(DriverError::NoSuchDevice);
            }
        }

        let entry = {
            let _attach = self
                .attach_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.registry.contains(handle) {
                warn!(%handle, "device already attached");
                return Err(DriverError::ResourceUnavailable);
            }
            let Some(minor) = self
                .registry
                .free_minor(self.config.minor_base, self.config.max_devices)
            else {
                warn!(%handle, max = self.config.max_devices, "no free minor");
                return Err(DriverError::ResourceUnavailable);
            };
            let entry = Arc::new(DeviceEntry::new(handle, minor));
            entry.gate.begin_attach();
            self.registry.insert(Arc::clone(&entry));
            entry
        };

        info!(%handle, minor = entry.minor(), "attaching device");
        let state = match self.resources.claim(handle) {
            Ok(state) => state,
            Err(e) => {
                error!(%handle, error = %e, "attach failed");
                entry.gate.finish_attach(false);
                self.registry.remove(handle);
                return Err(e);
            }
        };
        if let Err(state) = entry.device.set(state) {
            self.resources.release(&state);
            entry.gate.finish_attach(false);
            self.registry.remove(handle);
            return Err(DriverError::ResourceUnavailable);
        }
        entry.gate.finish_attach(true);
        info!(%handle, minor = entry.minor(), "device enabled");
        Ok(entry.minor())
    }

    /// Detach `handle`, waiting for in-flight operations first.
    ///
    /// # Errors
    ///
    /// - `NoSuchDevice` if the device is not attached
    /// - `NotEnabled` if it is still probing or already detaching
    pub fn detach(&self, handle: DeviceHandle) -> Result<(), DriverError> {
        let entry = self.registry.get(handle).ok_or(DriverError::NoSuchDevice)?;
        if !entry.gate.begin_detach() {
            warn!(%handle, state = %entry.gate.state(), "detach refused");
            return Err(DriverError::NotEnabled);
        }

        let pending = entry.gate.in_flight();
        if pending > 0 {
            debug!(%handle, pending, "waiting for in-flight operations");
        }
        entry.gate.wait_drained();

        if let Some(state) = entry.device() {
            self.resources.release(state);
        }
        entry.gate.finish_detach();
        self.registry.remove(handle);
        info!(%handle, "device detached");
        Ok(())
    }

    /// Detach every enabled device.
    pub fn detach_all(&self) {
        for handle in self.registry.handles() {
            if let Err(e) = self.detach(handle) {
                warn!(%handle, error = %e, "device left attached");
            }
        }
    }

    /// Current state of `handle`.
    #[must_use]
    pub fn state(&self, handle: DeviceHandle) -> LifecycleState {
        self.registry
            .get(handle)
            .map_or(LifecycleState::Unattached, |e| e.gate.state())
    }

    /// Resolve an open of `minor` to the device served under it.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchDevice` unless `minor` is served and its device is
    /// enabled.
    pub fn open(&self, minor: u32) -> Result<DeviceHandle, DriverError> {
        let entry = self
            .config
            .serves_minor(minor)
            .then(|| self.registry.by_minor(minor))
            .flatten()
            .filter(|e| e.gate.state() == LifecycleState::Enabled)
            .ok_or_else(|| {
                warn!(minor, "open of unknown minor");
                DriverError::NoSuchDevice
            })?;
        debug!(handle = %entry.handle(), minor, "device opened");
        Ok(entry.handle())
    }

    /// Map part of the shared window of `handle` into `space`.
    ///
    /// # Errors
    ///
    /// `NoSuchDevice`, `NotEnabled`, or any error of
    /// [`MappingBridge::map`].
    pub fn map<S: AddressSpace + ?Sized>(
        &self,
        handle: DeviceHandle,
        request: &MappingRequest,
        space: &S,
    ) -> Result<(), DriverError> {
        self.with_enabled(handle, |state| self.bridge.map(request, state, space))
    }

    /// Run a control command against `handle`.
    ///
    /// # Errors
    ///
    /// `NoSuchDevice`, `NotEnabled`, or any error of
    /// [`CommandDispatcher::dispatch`].
    pub fn command(&self, handle: DeviceHandle, command: ControlCommand) -> Result<(), DriverError> {
        self.with_enabled(handle, |state| self.dispatcher.dispatch(command, state))
    }

    /// Kernel-side virtual base of the shared window of `handle`.
    #[must_use]
    pub fn shared_base(&self, handle: DeviceHandle) -> Option<Vaddr> {
        self.registry
            .get(handle)?
            .device()
            .and_then(DeviceState::shared_base)
    }

    fn with_enabled<R>(
        &self,
        handle: DeviceHandle,
        op: impl FnOnce(&DeviceState<B::Io>) -> Result<R, DriverError>,
    ) -> Result<R, DriverError> {
        let entry = self.registry.get(handle).ok_or(DriverError::NoSuchDevice)?;
        let Some(_guard) = entry.gate.enter() else {
            debug!(%handle, state = %entry.gate.state(), "operation refused");
            return Err(DriverError::NotEnabled);
        };
        let state = entry.device().ok_or(DriverError::NotEnabled)?;
        op(state)
    }
}
