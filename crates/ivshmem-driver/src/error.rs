// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Driver error type.

use core::fmt;

use crate::platform::{BusError, MapError};

/// Host errno values reported back through the device node.
pub mod errno {
    /// No such device or address.
    pub const ENXIO: i32 = 6;
    /// Device or resource busy.
    pub const EBUSY: i32 = 16;
    /// No such device.
    pub const ENODEV: i32 = 19;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Inappropriate control request for device.
    pub const ENOTTY: i32 = 25;
}

/// Errors surfaced by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// A bus resource is already owned, absent, or could not be mapped.
    ResourceUnavailable,
    /// The host memory system could not install a process mapping.
    MappingFailed,
    /// The requested mapping does not fit inside the shared window.
    InvalidRange,
    /// An action needs a window that has not been claimed.
    NotMapped,
    /// Unknown device identity.
    NoSuchDevice,
    /// The device is not in the enabled state.
    NotEnabled,
    /// Command code outside the supported set (strict policy only).
    UnsupportedCommand(u32),
}

impl DriverError {
    /// Negative errno for this error, as returned through the device node.
    #[must_use]
    pub const fn to_errno(self) -> i32 {
        match self {
            Self::ResourceUnavailable => -errno::EBUSY,
            Self::MappingFailed | Self::NotMapped => -errno::ENXIO,
            Self::InvalidRange => -errno::EINVAL,
            Self::NoSuchDevice | Self::NotEnabled => -errno::ENODEV,
            Self::UnsupportedCommand(_) => -errno::ENOTTY,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceUnavailable => write!(f, "bus resource unavailable"),
            Self::MappingFailed => write!(f, "failed to install mapping"),
            Self::InvalidRange => write!(f, "mapping exceeds shared window"),
            Self::NotMapped => write!(f, "device not mapped"),
            Self::NoSuchDevice => write!(f, "no such device"),
            Self::NotEnabled => write!(f, "device not enabled"),
            Self::UnsupportedCommand(code) => write!(f, "unsupported command {code:#x}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<BusError> for DriverError {
    fn from(_: BusError) -> Self {
        Self::ResourceUnavailable
    }
}

impl From<MapError> for DriverError {
    fn from(_: MapError) -> Self {
        Self::MappingFailed
    }
}
