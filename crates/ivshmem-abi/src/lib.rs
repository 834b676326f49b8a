// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared definitions for the inter-VM shared memory (ivshmem) device.
//!
//! This crate defines the contract between the driver and its callers:
//! - Physical and virtual address newtypes with page arithmetic
//! - The control-register map of BAR0
//! - PCI identity (vendor/device pair, BAR indices, names)
//! - The control-channel identifier and command codes
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data types, 100% host-testable
//! - **Stable values**: Every constant matches what the device and
//!   existing user-space callers already expect

#![no_std]

#[cfg(test)]
extern crate std;


pub mod addr;
pub mod ioctl;
pub mod layout;
pub mod pci;
pub mod regs;

pub use addr::{Paddr, Vaddr};
pub use ioctl::{ControlCommand, FILL_PATTERN, IVSHMEM_IOCTL_COMM};
pub use layout::{PAGE_SHIFT, PAGE_SIZE};
pub use pci::{Bar, PciId};
pub use regs::Register;
