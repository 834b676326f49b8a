// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Driver configuration.

use ivshmem_abi::PciId;
use ivshmem_abi::pci::DEVICE_MINOR;
use ivshmem_abi::regs::REGISTER_WINDOW_LEN;

/// How the dispatcher treats command codes outside the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandPolicy {
    /// Log and succeed. Existing callers rely on this.
    #[default]
    Lenient,
    /// Fail with `UnsupportedCommand`.
    Strict,
}

/// Static configuration of one driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Vendor/device pair the driver attaches to.
    pub pci_id: PciId,
    /// Bytes of the register BAR to map.
    pub register_window_len: usize,
    /// First minor identity handed out to attached devices.
    pub minor_base: u32,
    /// Number of devices that may be attached at once.
    pub max_devices: u32,
    /// Treatment of unknown command codes.
    pub command_policy: CommandPolicy,
}

impl DriverConfig {
    /// Configuration matching the stock ivshmem device.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pci_id: PciId::IVSHMEM,
            register_window_len: REGISTER_WINDOW_LEN,
            minor_base: DEVICE_MINOR,
            max_devices: 1,
            command_policy: CommandPolicy::Lenient,
        }
    }

    /// Set the number of devices that may be attached at once.
    #[must_use]
    pub const fn with_max_devices(mut self, max_devices: u32) -> Self {
        self.max_devices = max_devices;
        self
    }

    /// Set the unknown-command policy.
    #[must_use]
    pub const fn with_command_policy(mut self, policy: CommandPolicy) -> Self {
        self.command_policy = policy;
        self
    }

    /// Set the vendor/device pair to match.
    #[must_use]
    pub const fn with_pci_id(mut self, pci_id: PciId) -> Self {
        self.pci_id = pci_id;
        self
    }

    /// Returns true if `minor` is one of the identities this driver serves.
    #[must_use]
    pub const fn serves_minor(&self, minor: u32) -> bool {
        minor >= self.minor_base && minor - self.minor_base < self.max_devices
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}
