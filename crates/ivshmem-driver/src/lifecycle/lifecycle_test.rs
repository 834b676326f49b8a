// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the lifecycle controller.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use super::*;
use crate::config::CommandPolicy;
use crate::platform::{DeviceFaults, MockPlatform, VmArea};
use ivshmem_abi::pci::{Bar, REGION_NAME};
use ivshmem_abi::{Paddr, PciId};

const SHARED_BASE: Paddr = Paddr::new(0xFD00_0000);
const SHARED_LEN: usize = 0x4000;

fn setup(config: DriverConfig) -> (Arc<MockPlatform>, Lifecycle<MockPlatform>) {
    let bus = Arc::new(MockPlatform::new());
    let lifecycle = Lifecycle::new(Arc::clone(&bus), config);
    (bus, lifecycle)
}

fn assert_released(bus: &MockPlatform, dev: DeviceHandle) {
    assert!(!bus.is_enabled(dev));
    assert_eq!(bus.region_owner(dev), None);
    assert_eq!(bus.live_iomaps(dev), 0);
}

fn one_page() -> MappingRequest {
    MappingRequest::new(
        0,
        VmArea::with_len(Vaddr::new(0x7f00_0000_0000), 0x1000).unwrap(),
    )
}

// Gate

#[test]
fn gate_walks_the_state_machine() {
    let gate = Gate::new();
    assert_eq!(gate.state(), LifecycleState::Unattached);
    assert!(gate.enter().is_none());
    assert!(!gate.begin_detach());

    assert!(gate.begin_attach());
    assert_eq!(gate.state(), LifecycleState::Probing);
    assert!(gate.enter().is_none());
    assert!(!gate.begin_attach());

    assert!(gate.finish_attach(true));
    assert_eq!(gate.state(), LifecycleState::Enabled);

    assert!(gate.begin_detach());
    assert!(gate.enter().is_none());
    assert!(gate.finish_detach());
    assert_eq!(gate.state(), LifecycleState::Unattached);
}

#[test]
fn failed_attach_returns_to_unattached() {
    let gate = Gate::new();
    gate.begin_attach();
    assert!(gate.finish_attach(false));
    assert_eq!(gate.state(), LifecycleState::Unattached);
    assert!(gate.begin_attach());
}

#[test]
fn guards_are_counted() {
    let gate = Gate::new();
    gate.begin_attach();
    gate.finish_attach(true);

    let a = gate.enter().unwrap();
    let b = gate.enter().unwrap();
    assert_eq!(gate.in_flight(), 2);
    drop(a);
    assert_eq!(gate.in_flight(), 1);
    drop(b);
    assert_eq!(gate.in_flight(), 0);
    gate.wait_drained();
}

#[test]
fn wait_drained_blocks_until_guard_drops() {
    let gate = Arc::new(Gate::new());
    gate.begin_attach();
    gate.finish_attach(true);
    let entered = Arc::new(Barrier::new(2));
    let released = Arc::new(AtomicBool::new(false));

    let holder = {
        let gate = Arc::clone(&gate);
        let entered = Arc::clone(&entered);
        let released = Arc::clone(&released);
        thread::spawn(move || {
            let guard = gate.enter().unwrap();
            entered.wait();
            thread::sleep(Duration::from_millis(50));
            released.store(true, Ordering::SeqCst);
            drop(guard);
        })
    };

    entered.wait();
    assert!(gate.begin_detach());
    gate.wait_drained();
    assert!(released.load(Ordering::SeqCst));
    holder.join().unwrap();
}

#[test]
fn state_names() {
    assert_eq!(LifecycleState::Enabled.to_string(), "enabled");
    assert_eq!(LifecycleState::Detaching.to_string(), "detaching");
}

// Controller

#[test]
fn attach_enables_device() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);

    assert_eq!(lifecycle.state(dev), LifecycleState::Unattached);
    assert_eq!(lifecycle.attach(dev), Ok(0));
    assert_eq!(lifecycle.state(dev), LifecycleState::Enabled);
    assert_eq!(bus.region_owner(dev), Some(REGION_NAME));
    assert_eq!(lifecycle.registry().len(), 1);
    assert!(lifecycle.shared_base(dev).is_some());
}

#[test]
fn attach_rejects_foreign_device() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_device(
        PciId::new(0x8086, 0x100e),
        &[(Bar::SharedMemory, SHARED_BASE, SHARED_LEN)],
    );

    assert_eq!(lifecycle.attach(dev), Err(DriverError::NoSuchDevice));
    assert!(!bus.is_enabled(dev));
    assert!(lifecycle.registry().is_empty());
}

#[test]
fn attach_twice_is_refused() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    lifecycle.attach(dev).unwrap();

    assert_eq!(lifecycle.attach(dev), Err(DriverError::ResourceUnavailable));
    assert_eq!(lifecycle.state(dev), LifecycleState::Enabled);
    assert_eq!(bus.live_iomaps(dev), 2);
}

#[test]
fn single_instance_by_default() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let first = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    let second = bus.add_ivshmem(Paddr::new(0xFC00_0000), SHARED_LEN);
    lifecycle.attach(first).unwrap();

    assert_eq!(
        lifecycle.attach(second),
        Err(DriverError::ResourceUnavailable)
    );
    assert_released(&bus, second);
}

#[test]
fn minors_are_assigned_in_order() {
    let (bus, lifecycle) = setup(DriverConfig::new().with_max_devices(2));
    let first = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    let second = bus.add_ivshmem(Paddr::new(0xFC00_0000), SHARED_LEN);

    assert_eq!(lifecycle.attach(first), Ok(0));
    assert_eq!(lifecycle.attach(second), Ok(1));
    assert_eq!(lifecycle.open(1), Ok(second));

    lifecycle.detach(first).unwrap();
    let third = bus.add_ivshmem(Paddr::new(0xFB00_0000), SHARED_LEN);
    assert_eq!(lifecycle.attach(third), Ok(0));
}

#[test]
fn failed_claim_leaves_device_unattached() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    bus.set_faults(
        dev,
        DeviceFaults {
            fail_iomap: Some(Bar::Registers),
            ..DeviceFaults::default()
        },
    );

    assert_eq!(lifecycle.attach(dev), Err(DriverError::ResourceUnavailable));
    assert_eq!(lifecycle.state(dev), LifecycleState::Unattached);
    assert!(lifecycle.registry().is_empty());
    assert_released(&bus, dev);

    bus.set_faults(dev, DeviceFaults::default());
    assert_eq!(lifecycle.attach(dev), Ok(0));
}

#[test]
fn busy_regions_fail_attach() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    bus.claim_externally(dev, "other");

    assert_eq!(lifecycle.attach(dev), Err(DriverError::ResourceUnavailable));
    assert_eq!(bus.region_owner(dev), Some("other"));
    assert!(!bus.is_enabled(dev));
}

#[test]
fn detach_releases_everything() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    lifecycle.attach(dev).unwrap();

    lifecycle.detach(dev).unwrap();
    assert_eq!(lifecycle.state(dev), LifecycleState::Unattached);
    assert!(lifecycle.shared_base(dev).is_none());
    assert_released(&bus, dev);
    assert_eq!(lifecycle.detach(dev), Err(DriverError::NoSuchDevice));
}

#[test]
fn repeated_attach_detach_cycles() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    for _ in 0..5 {
        assert_eq!(lifecycle.attach(dev), Ok(0));
        lifecycle.command(dev, ControlCommand::PatternFill).unwrap();
        lifecycle.detach(dev).unwrap();
        assert_released(&bus, dev);
    }
}

#[test]
fn open_requires_enabled_served_minor() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);

    assert_eq!(lifecycle.open(0), Err(DriverError::NoSuchDevice));
    lifecycle.attach(dev).unwrap();
    assert_eq!(lifecycle.open(0), Ok(dev));
    assert_eq!(lifecycle.open(1), Err(DriverError::NoSuchDevice));
    assert_eq!(lifecycle.open(u32::MAX), Err(DriverError::NoSuchDevice));

    lifecycle.detach(dev).unwrap();
    assert_eq!(lifecycle.open(0), Err(DriverError::NoSuchDevice));
}

#[test]
fn operations_after_detach_are_refused() {
    let (bus, lifecycle) = setup(DriverConfig::default());
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    let process = bus.new_process();
    lifecycle.attach(dev).unwrap();
    lifecycle.map(dev, &one_page(), &process).unwrap();
    lifecycle.detach(dev).unwrap();

    assert_eq!(
        lifecycle.command(dev, ControlCommand::ZeroFill),
        Err(DriverError::NoSuchDevice)
    );
    assert_eq!(
        lifecycle.map(dev, &one_page(), &process),
        Err(DriverError::NoSuchDevice)
    );
}

#[test]
fn strict_policy_reaches_dispatcher() {
    let (bus, lifecycle) =
        setup(DriverConfig::new().with_command_policy(CommandPolicy::Strict));
    let dev = bus.add_ivshmem(SHARED_BASE, SHARED_LEN);
    lifecycle.attach(dev).unwrap();

    assert_eq!(
        lifecycle.command(dev, ControlCommand::decode(7)),
        Err(DriverError::UnsupportedCommand(7))
    );
}

#[test]
fn detach_all_clears_registry() {
    let (bus, lifecycle) = setup(DriverConfig::new().with_max_devices(3));
    let devs: Vec<_> = (0..3_u64)
        .map(|i| bus.add_ivshmem(Paddr::new(0xF000_0000 + i * 0x10_0000), SHARED_LEN))
        .collect();
    for &dev in &devs {
        lifecycle.attach(dev).unwrap();
    }

    lifecycle.detach_all();
    assert!(lifecycle.registry().is_empty());
    for &dev in &devs {
        assert_released(&bus, dev);
    }
}
