// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform abstraction layer.
//!
//! The driver never touches hardware or page tables directly. Everything it
//! needs from the host is expressed as a capability trait, so the same logic
//! runs against a real bus in production and a simulated one on the
//! development host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Driver Logic                          │
//! │  (Lifecycle, ResourceManager, MappingBridge, Commands)   │
//! └─────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              Platform Traits                             │
//! │  (`PciBus`, `Mmio`, `AddressSpace`, `DriverHost`)        │
//! └─────────────────────────────────────────────────────────┘
//!            │                              │
//!            ▼                              ▼
//! ┌─────────────────────┐      ┌─────────────────────────────┐
//! │   `MockPlatform`    │      │     host bus / MMU          │
//! │   (for testing)     │      │     (for production)        │
//! └─────────────────────┘      └─────────────────────────────┘
//! ```

#[cfg(any(test, feature = "mock"))]
mod mock;
mod traits;

#[cfg(test)]
mod traits_test;

#[cfg(any(test, feature = "mock"))]
pub use mock::{DeviceFaults, Installed, MOCK_REGISTER_BASE, MockIo, MockPlatform, MockProcess, MockWindow};
pub use traits::{
    AddressSpace, BarInfo, BusError, CacheAttr, DeviceHandle, DriverHost, MapAttrs, MapError,
    Mmio, PciBus, VmArea,
};
