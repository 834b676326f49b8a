// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bus resource claiming and release.
//!
//! A device contributes two windows: BAR0 (control registers) and BAR2 (the
//! shared-memory payload). Claiming runs the sequence
//!
//! 1. enable the device
//! 2. take exclusive ownership of its regions
//! 3. iomap the shared window
//! 4. iomap the register window
//! 5. mask every interrupt
//!
//! and any failure unwinds the completed steps in reverse, so a failed claim
//! leaves nothing owned, mapped or enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use ivshmem_abi::pci::{Bar, REGION_NAME};
use ivshmem_abi::regs::INTR_MASK_ALL;
use ivshmem_abi::{Paddr, Vaddr};
use tracing::{debug, error, info};

use crate::error::DriverError;
use crate::platform::{BarInfo, DeviceHandle, Mmio, PciBus};
use crate::registers::Registers;

#[cfg(test)]
mod resource_test;

/// Which window a resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// BAR0, the control registers.
    ControlRegisters,
    /// BAR2, the shared-memory window.
    SharedMemory,
}

impl ResourceKind {
    /// BAR backing this kind of window.
    #[must_use]
    pub const fn bar(self) -> Bar {
        match self {
            Self::ControlRegisters => Bar::Registers,
            Self::SharedMemory => Bar::SharedMemory,
        }
    }
}

/// One claimed and mapped bus window.
pub struct DeviceResource<I: Mmio> {
    kind: ResourceKind,
    base: Paddr,
    size: u64,
    io: I,
}

impl<I: Mmio> DeviceResource<I> {
    /// Which window this is.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Bus-assigned physical base.
    #[must_use]
    pub const fn base(&self) -> Paddr {
        self.base
    }

    /// Size of the window as reported by the bus.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Kernel-side virtual base of the mapping.
    #[must_use]
    pub fn virt_base(&self) -> Vaddr {
        self.io.base()
    }

    /// The driver-side mapping.
    #[must_use]
    pub const fn io(&self) -> &I {
        &self.io
    }
}

/// Both windows of a claimed device.
pub struct ClaimedResources<I: Mmio> {
    /// BAR0 mapping.
    pub registers: DeviceResource<I>,
    /// BAR2 mapping.
    pub shared: DeviceResource<I>,
}

/// State of one attached device.
///
/// `enabled` is only true while both windows are claimed and mapped.
/// The mapping bridge and the command dispatcher read from this; only the
/// resource manager changes it.
pub struct DeviceState<I: Mmio> {
    handle: DeviceHandle,
    resources: RwLock<Option<ClaimedResources<I>>>,
    enabled: AtomicBool,
}

impl<I: Mmio> DeviceState<I> {
    /// Bus handle of the owning device.
    #[must_use]
    pub const fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Whether both windows are claimed and mapped.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Read access to the claimed windows, `None` once released.
    ///
    /// Release waits for every outstanding guard to drop.
    pub fn resources(&self) -> RwLockReadGuard<'_, Option<ClaimedResources<I>>> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Physical base and size of the shared window.
    #[must_use]
    pub fn shared_window(&self) -> Option<(Paddr, u64)> {
        self.resources()
            .as_ref()
            .map(|r| (r.shared.base(), r.shared.size()))
    }

    /// Kernel-side virtual base of the shared window.
    #[must_use]
    pub fn shared_base(&self) -> Option<Vaddr> {
        self.resources().as_ref().map(|r| r.shared.virt_base())
    }
}

/// Undoes a partially completed claim when dropped.
struct ClaimUnwind<'a, B: PciBus> {
    bus: &'a B,
    handle: DeviceHandle,
    enabled: bool,
    regions: bool,
    shared: Option<B::Io>,
    registers: Option<B::Io>,
}

impl<'a, B: PciBus> ClaimUnwind<'a, B> {
    const fn new(bus: &'a B, handle: DeviceHandle) -> Self {
        Self {
            bus,
            handle,
            enabled: false,
            regions: false,
            shared: None,
            registers: None,
        }
    }

    /// Keep everything acquired so far.
    fn commit(mut self) -> Option<(B::Io, B::Io)> {
        if self.shared.is_none() || self.registers.is_none() {
            return None;
        }
        let shared = self.shared.take()?;
        let registers = self.registers.take()?;
        self.enabled = false;
        self.regions = false;
        Some((shared, registers))
    }
}

impl<B: PciBus> Drop for ClaimUnwind<'_, B> {
    fn drop(&mut self) {
        if let Some(io) = self.registers.take() {
            self.bus.iounmap(self.handle, io);
        }
        if let Some(io) = self.shared.take() {
            self.bus.iounmap(self.handle, io);
        }
        if self.regions {
            self.bus.release_regions(self.handle);
        }
        if self.enabled {
            self.bus.disable_device(self.handle);
        }
    }
}

/// Claims and releases device windows on a bus.
pub struct ResourceManager<B: PciBus> {
    bus: Arc<B>,
    register_window_len: usize,
}

impl<B: PciBus> ResourceManager<B> {
    /// Create a manager mapping `register_window_len` bytes of BAR0.
    #[must_use]
    pub const fn new(bus: Arc<B>, register_window_len: usize) -> Self {
        Self {
            bus,
            register_window_len,
        }
    }

    /// The bus this manager claims from.
    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Claim and map both windows of `handle`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceUnavailable` if any claim step fails. Nothing stays
    /// claimed, mapped or enabled in that case.
    pub fn claim(&self, handle: DeviceHandle) -> Result<DeviceState<B::Io>, DriverError> {
        let bus = &*self.bus;
        let mut unwind = ClaimUnwind::new(bus, handle);

        bus.enable_device(handle).map_err(|e| {
            error!(%handle, error = %e, "cannot enable device");
            DriverError::from(e)
        })?;
        unwind.enabled = true;

        bus.request_regions(handle, REGION_NAME).map_err(|e| {
            error!(%handle, error = %e, "cannot request regions");
            DriverError::from(e)
        })?;
        unwind.regions = true;

        let shared_info = window_info(bus, handle, Bar::SharedMemory)?;
        unwind.shared = Some(bus.iomap(handle, Bar::SharedMemory, 0).ok_or_else(|| {
            error!(%handle, size = shared_info.len, "cannot iomap shared window");
            DriverError::ResourceUnavailable
        })?);
        info!(
            %handle,
            paddr = %shared_info.start,
            size = shared_info.len,
            "shared window mapped"
        );

        let register_info = window_info(bus, handle, Bar::Registers)?;
        unwind.registers = Some(
            bus.iomap(handle, Bar::Registers, self.register_window_len)
                .ok_or_else(|| {
                    error!(%handle, size = register_info.len, "cannot iomap registers");
                    DriverError::ResourceUnavailable
                })?,
        );

        let Some(regs) = unwind.registers.as_ref().and_then(Registers::new) else {
            error!(%handle, "register window too short");
            return Err(DriverError::ResourceUnavailable);
        };
        regs.set_intr_mask(INTR_MASK_ALL);

        let Some((shared_io, register_io)) = unwind.commit() else {
            return Err(DriverError::ResourceUnavailable);
        };

        let state = DeviceState {
            handle,
            resources: RwLock::new(Some(ClaimedResources {
                registers: DeviceResource {
                    kind: ResourceKind::ControlRegisters,
                    base: register_info.start,
                    size: register_info.len,
                    io: register_io,
                },
                shared: DeviceResource {
                    kind: ResourceKind::SharedMemory,
                    base: shared_info.start,
                    size: shared_info.len,
                    io: shared_io,
                },
            })),
            enabled: AtomicBool::new(true),
        };
        debug!(%handle, "device claimed");
        Ok(state)
    }

    /// Unmap both windows and give up bus ownership.
    ///
    /// Calling this on an already released state does nothing.
    pub fn release(&self, state: &DeviceState<B::Io>) {
        let handle = state.handle;
        let claimed = {
            let mut guard = state
                .resources
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            state.enabled.store(false, Ordering::Release);
            guard.take()
        };

        let Some(claimed) = claimed else {
            debug!(%handle, "release on already released device");
            return;
        };

        self.bus.iounmap(handle, claimed.registers.io);
        self.bus.iounmap(handle, claimed.shared.io);
        self.bus.release_regions(handle);
        self.bus.disable_device(handle);
        info!(%handle, "device released");
    }
}

fn window_info<B: PciBus>(
    bus: &B,
    handle: DeviceHandle,
    bar: Bar,
) -> Result<BarInfo, DriverError> {
    match bus.resource(handle, bar) {
        Some(info) if info.len > 0 => Ok(info),
        _ => {
            error!(%handle, bar = bar.index(), "BAR missing or empty");
            Err(DriverError::ResourceUnavailable)
        }
    }
}
