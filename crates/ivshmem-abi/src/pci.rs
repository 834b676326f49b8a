// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! PCI identity of the ivshmem device.

use core::fmt;

/// Vendor/device identifier pair used for bus matching.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciId {
    /// PCI vendor identifier.
    pub vendor: u16,
    /// PCI device identifier.
    pub device: u16,
}

impl PciId {
    /// The inter-VM shared memory device (Red Hat / Qumranet).
    pub const IVSHMEM: Self = Self::new(0x1af4, 0x1110);

    /// Create a new identifier pair.
    #[inline]
    #[must_use]
    pub const fn new(vendor: u16, device: u16) -> Self {
        Self { vendor, device }
    }
}

impl fmt::Debug for PciId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PciId({:04x}:{:04x})", self.vendor, self.device)
    }
}

impl fmt::Display for PciId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.device)
    }
}

/// Base address registers the driver claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Bar {
    /// BAR0: control registers.
    Registers = 0,
    /// BAR2: the shared-memory window.
    SharedMemory = 2,
}

impl Bar {
    /// BAR index as seen by the bus.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Name the bus driver registers under.
pub const DRIVER_NAME: &str = "kvm-ivshmem";

/// Owner name attached to claimed regions.
pub const REGION_NAME: &str = "kvm_ivshmem";

/// Name of the character device node.
pub const NODE_NAME: &str = "kvm_ivshmem";

/// The single minor identity the node accepts.
pub const DEVICE_MINOR: u32 = 0;
