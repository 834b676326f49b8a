// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for resource claiming.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::platform::{DeviceFaults, MockPlatform};
use ivshmem_abi::Register;
use ivshmem_abi::regs::REGISTER_WINDOW_LEN;

const SHARED_BASE: Paddr = Paddr::new(0xFD00_0000);

fn setup(len: usize) -> (Arc<MockPlatform>, DeviceHandle, ResourceManager<MockPlatform>) {
    let bus = Arc::new(MockPlatform::new());
    let dev = bus.add_ivshmem(SHARED_BASE, len);
    let manager = ResourceManager::new(Arc::clone(&bus), REGISTER_WINDOW_LEN);
    (bus, dev, manager)
}

fn assert_nothing_held(bus: &MockPlatform, dev: DeviceHandle) {
    assert!(!bus.is_enabled(dev));
    assert_eq!(bus.region_owner(dev), None);
    assert_eq!(bus.live_iomaps(dev), 0);
}

#[test]
fn claim_maps_both_windows() {
    let (bus, dev, manager) = setup(0x10_0000);
    let state = manager.claim(dev).unwrap();

    assert!(state.is_enabled());
    assert_eq!(state.handle(), dev);
    assert_eq!(state.shared_window(), Some((SHARED_BASE, 0x10_0000)));
    assert!(bus.is_enabled(dev));
    assert_eq!(bus.region_owner(dev), Some(REGION_NAME));
    assert_eq!(bus.live_iomaps(dev), 2);

    let resources = state.resources();
    let claimed = resources.as_ref().unwrap();
    assert_eq!(claimed.registers.kind(), ResourceKind::ControlRegisters);
    assert_eq!(claimed.shared.kind(), ResourceKind::SharedMemory);
    assert_eq!(claimed.registers.io().len(), REGISTER_WINDOW_LEN);
    assert_eq!(claimed.shared.io().len(), 0x10_0000);
    assert_eq!(claimed.shared.virt_base(), state.shared_base().unwrap());
}

#[test]
fn claim_masks_interrupts() {
    let (bus, dev, manager) = setup(0x1000);
    let window = bus.window(dev, Bar::Registers).unwrap();
    window.poke32(Register::IntrMask.offset(), 0xFFFF_FFFF);

    let _state = manager.claim(dev).unwrap();

    assert_eq!(window.peek32(Register::IntrMask.offset()), INTR_MASK_ALL);
    assert_eq!(
        window.register_writes(),
        vec![(Register::IntrMask.offset(), INTR_MASK_ALL)]
    );
}

#[test]
fn enable_failure_holds_nothing() {
    let (bus, dev, manager) = setup(0x1000);
    bus.set_faults(
        dev,
        DeviceFaults {
            fail_enable: true,
            ..DeviceFaults::default()
        },
    );

    assert!(matches!(
        manager.claim(dev),
        Err(DriverError::ResourceUnavailable)
    ));
    assert_nothing_held(&bus, dev);
}

#[test]
fn busy_regions_disable_device_again() {
    let (bus, dev, manager) = setup(0x1000);
    bus.claim_externally(dev, "other");

    assert!(matches!(
        manager.claim(dev),
        Err(DriverError::ResourceUnavailable)
    ));
    assert!(!bus.is_enabled(dev));
    assert_eq!(bus.region_owner(dev), Some("other"));
    assert_eq!(bus.live_iomaps(dev), 0);
}

#[test]
fn shared_iomap_failure_releases_regions() {
    let (bus, dev, manager) = setup(0x1000);
    bus.set_faults(
        dev,
        DeviceFaults {
            fail_iomap: Some(Bar::SharedMemory),
            ..DeviceFaults::default()
        },
    );

    assert!(manager.claim(dev).is_err());
    assert_nothing_held(&bus, dev);
}

#[test]
fn register_iomap_failure_unmaps_shared_window() {
    let (bus, dev, manager) = setup(0x1000);
    bus.set_faults(
        dev,
        DeviceFaults {
            fail_iomap: Some(Bar::Registers),
            ..DeviceFaults::default()
        },
    );

    assert!(manager.claim(dev).is_err());
    assert_nothing_held(&bus, dev);
}

#[test]
fn missing_shared_bar_is_unavailable() {
    let bus = Arc::new(MockPlatform::new());
    let dev = bus.add_device(
        ivshmem_abi::PciId::IVSHMEM,
        &[(Bar::Registers, Paddr::new(0xFEBF_1000), 0x100)],
    );
    let manager = ResourceManager::new(Arc::clone(&bus), REGISTER_WINDOW_LEN);

    assert!(manager.claim(dev).is_err());
    assert_nothing_held(&bus, dev);
}

#[test]
fn empty_shared_bar_is_unavailable() {
    let (bus, dev, manager) = setup(0);
    assert!(manager.claim(dev).is_err());
    assert_nothing_held(&bus, dev);
}

#[test]
fn release_returns_everything_and_is_idempotent() {
    let (bus, dev, manager) = setup(0x1000);
    let state = manager.claim(dev).unwrap();

    manager.release(&state);
    assert!(!state.is_enabled());
    assert!(state.resources().is_none());
    assert_eq!(state.shared_base(), None);
    assert_nothing_held(&bus, dev);

    manager.release(&state);
    assert_nothing_held(&bus, dev);
}

#[test]
fn claim_release_claim_cycles_without_leaks() {
    let (bus, dev, manager) = setup(0x2000);

    for _ in 0..5 {
        let state = manager.claim(dev).unwrap();
        assert!(state.is_enabled());
        assert_eq!(state.shared_window(), Some((SHARED_BASE, 0x2000)));
        assert_eq!(bus.live_iomaps(dev), 2);
        manager.release(&state);
        assert_nothing_held(&bus, dev);
    }
}
