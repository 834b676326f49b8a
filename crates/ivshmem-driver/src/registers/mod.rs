// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Typed access to the control-register window.
//!
//! Each accessor is exactly one MMIO access, issued in the order the caller
//! makes the calls. Nothing here serializes concurrent writers; the command
//! dispatcher holds its own lock around general-command writes.

use ivshmem_abi::Register;

use crate::platform::Mmio;

#[cfg(test)]
mod registers_test;

/// View of the control registers over a mapped BAR0.
pub struct Registers<'a, I: Mmio> {
    io: &'a I,
}

impl<'a, I: Mmio> Registers<'a, I> {
    /// Wrap a mapped register window.
    ///
    /// Returns `None` if the window is too short to hold every register.
    #[must_use]
    pub fn new(io: &'a I) -> Option<Self> {
        Register::ALL
            .iter()
            .all(|reg| reg.offset() + 4 <= io.len())
            .then_some(Self { io })
    }

    /// Read a register.
    #[inline]
    #[must_use]
    pub fn read(&self, reg: Register) -> u32 {
        self.io.read32(reg.offset())
    }

    /// Write a register.
    #[inline]
    pub fn write(&self, reg: Register, value: u32) {
        self.io.write32(reg.offset(), value);
    }

    /// Current interrupt mask.
    #[must_use]
    pub fn intr_mask(&self) -> u32 {
        self.read(Register::IntrMask)
    }

    /// Replace the interrupt mask.
    pub fn set_intr_mask(&self, mask: u32) {
        self.write(Register::IntrMask, mask);
    }

    /// Current interrupt status.
    #[must_use]
    pub fn intr_status(&self) -> u32 {
        self.read(Register::IntrStatus)
    }

    /// This VM's position among the peers.
    #[must_use]
    pub fn iv_position(&self) -> u32 {
        self.read(Register::IvPosition)
    }

    /// Ring a peer's doorbell.
    pub fn ring_doorbell(&self, value: u32) {
        self.write(Register::Doorbell, value);
    }

    /// Last value in the general command register.
    #[must_use]
    pub fn comm(&self) -> u32 {
        self.read(Register::Comm)
    }

    /// Write the general command register.
    pub fn write_comm(&self, value: u32) {
        self.write(Register::Comm, value);
    }
}
