// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the platform value types.

use super::{DeviceHandle, MapError, VmArea};
use ivshmem_abi::Vaddr;

#[test]
fn vm_area_len_and_alignment() {
    let area = VmArea::new(Vaddr::new(0x1000), Vaddr::new(0x3000));
    assert_eq!(area.len(), 0x2000);
    assert!(area.is_page_aligned());
    assert!(!area.is_empty());

    let inverted = VmArea::new(Vaddr::new(0x3000), Vaddr::new(0x1000));
    assert!(inverted.is_empty());
}

#[test]
fn vm_area_overlap() {
    let a = VmArea::new(Vaddr::new(0x1000), Vaddr::new(0x3000));
    let b = VmArea::new(Vaddr::new(0x2000), Vaddr::new(0x4000));
    let c = VmArea::new(Vaddr::new(0x3000), Vaddr::new(0x4000));
    assert!(a.overlaps(&b));
    assert!(!a.overlaps(&c));
}

#[test]
fn vm_area_with_len_wraps() {
    assert!(VmArea::with_len(Vaddr::new(u64::MAX - 10), 0x1000).is_none());
}

#[test]
fn only_resource_exhaustion_leaves_partial_install() {
    assert!(MapError::InsufficientResources.may_leave_partial());
    assert!(!MapError::AlreadyMapped.may_leave_partial());
    assert!(!MapError::MisalignedAddress.may_leave_partial());
}

#[test]
fn map_error_display() {
    assert_eq!(
        format!("{}", MapError::AlreadyMapped),
        "virtual address already mapped"
    );
}

#[test]
fn handle_display() {
    assert_eq!(format!("{}", DeviceHandle::new(3)), "pci#3");
}
