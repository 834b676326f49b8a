// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Page geometry of the host memory system.

/// Log2 of the host page size.
pub const PAGE_SHIFT: u32 = 12;

/// Host page size (4 KiB).
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Mask selecting the in-page offset bits of an address.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Round `len` up to a whole number of pages.
///
/// Returns `None` if the rounded length does not fit in a `u64`.
#[inline]
#[must_use]
pub const fn page_align_len(len: u64) -> Option<u64> {
    match len.checked_add(PAGE_OFFSET_MASK) {
        Some(v) => Some(v & !PAGE_OFFSET_MASK),
        None => None,
    }
}

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PAGE_SIZE == 4096);
};
