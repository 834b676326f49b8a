// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Control-channel identifier and command codes.
//!
//! Callers issue a single control request, `IVSHMEM_IOCTL_COMM`, whose
//! argument carries the command code. For the comm-write range the code
//! itself is the operand written to the general command register.
//!
//! | Code | Command |
//! |------|---------|
//! | 1 | Fill the shared window with `ABCD...` |
//! | 2 | Zero the shared window |
//! | 3 | Reserved (no-op) |
//! | 0x50-0x52 | Write the code to the general command register |

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_READ: u32 = 2;

/// Encode a read-direction control identifier.
#[must_use]
pub const fn ior(kind: u8, nr: u8, size: u32) -> u32 {
    (IOC_READ << IOC_DIRSHIFT)
        | (size << IOC_SIZESHIFT)
        | ((kind as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
}

/// The one control identifier the device node understands.
pub const IVSHMEM_IOCTL_COMM: u32 = ior(b'K', 0, 4);

/// Byte pattern written by the pattern-fill command, indexed by offset mod 4.
pub const FILL_PATTERN: [u8; 4] = *b"ABCD";

/// A decoded command carried by `IVSHMEM_IOCTL_COMM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    /// Write `FILL_PATTERN` across the whole shared window.
    PatternFill,
    /// Zero the whole shared window.
    ZeroFill,
    /// Reserved for future use.
    Reserved,
    /// Write the value verbatim to the general command register.
    CommWrite(u32),
    /// Any other code.
    Unknown(u32),
}

impl ControlCommand {
    /// Code for [`Self::PatternFill`].
    pub const PATTERN_FILL: u32 = 1;
    /// Code for [`Self::ZeroFill`].
    pub const ZERO_FILL: u32 = 2;
    /// Code for [`Self::Reserved`].
    pub const RESERVED: u32 = 3;
    /// First code of the comm-write range.
    pub const COMM_FIRST: u32 = 0x50;
    /// Last code of the comm-write range (inclusive).
    pub const COMM_LAST: u32 = 0x52;

    /// Decode a control argument.
    ///
    /// The channel carries an `int`, so only the low 32 bits are significant.
    #[must_use]
    pub const fn decode(arg: u64) -> Self {
        let code = arg as u32;
        match code {
            Self::PATTERN_FILL => Self::PatternFill,
            Self::ZERO_FILL => Self::ZeroFill,
            Self::RESERVED => Self::Reserved,
            Self::COMM_FIRST..=Self::COMM_LAST => Self::CommWrite(code),
            _ => Self::Unknown(code),
        }
    }

    /// The raw code this command was decoded from.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::PatternFill => Self::PATTERN_FILL,
            Self::ZeroFill => Self::ZERO_FILL,
            Self::Reserved => Self::RESERVED,
            Self::CommWrite(code) | Self::Unknown(code) => code,
        }
    }
}
