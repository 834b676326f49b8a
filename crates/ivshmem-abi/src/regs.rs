// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Control-register map of BAR0.
//!
//! # Register Layout
//!
//! | Offset | Register | Access |
//! |--------|----------|--------|
//! | 0x00 | Interrupt mask | RW |
//! | 0x04 | Interrupt status | RW |
//! | 0x08 | Position (VM identity) | RO |
//! | 0x0c | Doorbell | WO |
//! | 0x10 | General command (user-mode agent) | RW |
//!
//! All registers are 32 bits wide.

/// Number of bytes of BAR0 the driver maps.
pub const REGISTER_WINDOW_LEN: usize = 0x100;

/// Interrupt-mask value with every source masked.
///
/// The driver never consumes interrupts, so this is written once at claim.
pub const INTR_MASK_ALL: u32 = 0;

/// A 32-bit register in the control window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Register {
    /// Interrupt mask.
    IntrMask = 0x00,
    /// Interrupt status.
    IntrStatus = 0x04,
    /// Position of this VM among the peers sharing the region.
    IvPosition = 0x08,
    /// Doorbell to a peer.
    Doorbell = 0x0c,
    /// General command register, read by the device-side agent.
    Comm = 0x10,
}

impl Register {
    /// Every register, in offset order.
    pub const ALL: [Self; 5] = [
        Self::IntrMask,
        Self::IntrStatus,
        Self::IvPosition,
        Self::Doorbell,
        Self::Comm,
    ];

    /// Byte offset of this register within BAR0.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self as usize
    }

    /// Look up the register at a byte offset.
    #[must_use]
    pub const fn from_offset(offset: usize) -> Option<Self> {
        match offset {
            0x00 => Some(Self::IntrMask),
            0x04 => Some(Self::IntrStatus),
            0x08 => Some(Self::IvPosition),
            0x0c => Some(Self::Doorbell),
            0x10 => Some(Self::Comm),
            _ => None,
        }
    }
}

const _: () = {
    let mut i = 0;
    while i < Register::ALL.len() {
        assert!(Register::ALL[i].offset() % 4 == 0);
        assert!(Register::ALL[i].offset() + 4 <= REGISTER_WINDOW_LEN);
        i += 1;
    }
};
