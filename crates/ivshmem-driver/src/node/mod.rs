// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The character device node callers talk to.
//!
//! `DeviceNode::open` resolves a minor identity to an attached device and
//! returns a `DeviceFile`, which carries the mmap, control and release
//! entry points. Teardown is driven by detach, never by closing a file.

use std::sync::Arc;

use ivshmem_abi::{ControlCommand, IVSHMEM_IOCTL_COMM, Vaddr};
use tracing::{debug, info, warn};

use crate::error::DriverError;
use crate::lifecycle::Lifecycle;
use crate::mapping::MappingRequest;
use crate::platform::{AddressSpace, DeviceHandle, PciBus, VmArea};


/// Entry point for opens on the driver's node.
pub struct DeviceNode<B: PciBus> {
    lifecycle: Arc<Lifecycle<B>>,
}

impl<B: PciBus> Clone for DeviceNode<B> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<B: PciBus> DeviceNode<B> {
    /// Create a node served by `lifecycle`.
    #[must_use]
    pub const fn new(lifecycle: Arc<Lifecycle<B>>) -> Self {
        Self { lifecycle }
    }

    /// Open the device served under `minor`.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchDevice` unless `minor` names an enabled device.
    pub fn open(&self, minor: u32) -> Result<DeviceFile<B>, DriverError> {
        let handle = self.lifecycle.open(minor)?;
        Ok(DeviceFile {
            lifecycle: Arc::clone(&self.lifecycle),
            handle,
            minor,
        })
    }
}

/// An open file on the device node.
pub struct DeviceFile<B: PciBus> {
    lifecycle: Arc<Lifecycle<B>>,
    handle: DeviceHandle,
    minor: u32,
}

impl<B: PciBus> DeviceFile<B> {
    /// Device this file was opened on.
    #[must_use]
    pub const fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Minor identity this file was opened with.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Map the shared window starting at page `pgoff` into `area` of `space`.
    ///
    /// # Errors
    ///
    /// - `InvalidRange` if the range does not fit the page-aligned window
    /// - `MappingFailed` if the host could not install the mapping
    /// - `NoSuchDevice` or `NotEnabled` if the device went away
    pub fn mmap<S: AddressSpace + ?Sized>(
        &self,
        pgoff: u64,
        area: VmArea,
        space: &S,
    ) -> Result<(), DriverError> {
        let request = MappingRequest::from_pgoff(pgoff, area).ok_or_else(|| {
            warn!(handle = %self.handle, pgoff, "mmap offset overflows");
            DriverError::InvalidRange
        })?;
        self.lifecycle.map(self.handle, &request, space)
    }

    /// Control-channel entry point.
    ///
    /// Always reports success to the caller. Unknown identifiers and
    /// failed commands are only logged; use [`Self::control`] to see
    /// command errors.
    pub fn ioctl(&self, cmd: u32, arg: u64) -> i64 {
        if cmd != IVSHMEM_IOCTL_COMM {
            warn!(handle = %self.handle, cmd, "bad ioctl");
            return 0;
        }
        if let Err(e) = self.control(arg) {
            warn!(handle = %self.handle, error = %e, "command failed");
        }
        if let Some(base) = self.shared_base() {
            info!(handle = %self.handle, %base, "bar2 map base");
        }
        0
    }

    /// Decode `arg` and run the command, reporting its outcome.
    ///
    /// # Errors
    ///
    /// `NotMapped`, `NotEnabled`, `NoSuchDevice`, or `UnsupportedCommand`
    /// under the strict policy.
    pub fn control(&self, arg: u64) -> Result<(), DriverError> {
        let command = ControlCommand::decode(arg);
        debug!(handle = %self.handle, code = command.code(), "command");
        self.lifecycle.command(self.handle, command)
    }

    /// Kernel-side virtual base of the shared window.
    #[must_use]
    pub fn shared_base(&self) -> Option<Vaddr> {
        self.lifecycle.shared_base(self.handle)
    }

    /// Close the file. Never fails and tears nothing down.
    pub fn release(self) {
        debug!(handle = %self.handle, minor = self.minor, "device released by caller");
    }
}
