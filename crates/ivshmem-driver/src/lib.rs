// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # ivshmem driver
//!
//! Driver for the inter-VM shared memory PCI device. It claims the
//! device's two windows, exposes the shared window to processes through a
//! device node, and runs a small set of diagnostic control commands.
//!
//! ## Architecture
//!
//! - [`resource`]: claim and release of BAR0 (registers) and BAR2 (shared
//!   memory), with full unwind on failure
//! - [`registers`]: typed access to the control registers
//! - [`mapping`]: page-aligned mapping of the shared window into a process
//! - [`command`]: pattern fill, zero fill and comm-register writes
//! - [`lifecycle`]: attach/detach state machine and the device registry
//! - [`node`] and [`module`]: the caller-facing node and load/unload
//!
//! Host services (bus, MMIO, process address spaces, node registration)
//! are traits in [`platform`]. The `mock` feature provides an in-memory
//! implementation of all of them.


pub mod command;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mapping;
pub mod module;
pub mod node;
pub mod platform;
pub mod registers;
pub mod resource;

pub use command::CommandDispatcher;
pub use config::{CommandPolicy, DriverConfig};
pub use error::DriverError;
pub use lifecycle::{DeviceRegistry, Lifecycle, LifecycleState};
pub use mapping::{MappingBridge, MappingRequest, WindowGeometry};
pub use module::DriverModule;
pub use node::{DeviceFile, DeviceNode};
pub use platform::{AddressSpace, DeviceHandle, DriverHost, Mmio, PciBus, VmArea};
pub use registers::Registers;
pub use resource::{DeviceState, ResourceManager};

/// Crate version for runtime queries.
///
/// Uses the git-derived version from `IVSHMEM_VERSION` when available,
/// falling back to "unknown" otherwise.
pub const VERSION: &str = match option_env!("IVSHMEM_VERSION") {
    Some(v) => v,
    None => "unknown",
};
