// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the register interface.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::platform::{MockPlatform, PciBus};
use ivshmem_abi::Paddr;
use ivshmem_abi::pci::Bar;

#[test]
fn accessors_hit_fixed_offsets() {
    let bus = MockPlatform::new();
    let dev = bus.add_ivshmem(Paddr::new(0xFD00_0000), 0x1000);
    let io = bus.iomap(dev, Bar::Registers, 0x100).unwrap();
    let regs = Registers::new(&io).unwrap();

    regs.set_intr_mask(0xFFFF_FFFF);
    regs.ring_doorbell(0x0001_0002);
    regs.write_comm(0x51);

    let window = bus.window(dev, Bar::Registers).unwrap();
    assert_eq!(
        window.register_writes(),
        vec![(0x00, 0xFFFF_FFFF), (0x0c, 0x0001_0002), (0x10, 0x51)]
    );
    assert_eq!(regs.intr_mask(), 0xFFFF_FFFF);
    assert_eq!(regs.comm(), 0x51);
    bus.iounmap(dev, io);
}

#[test]
fn device_side_values_are_visible() {
    let bus = MockPlatform::new();
    let dev = bus.add_ivshmem(Paddr::new(0xFD00_0000), 0x1000);
    let io = bus.iomap(dev, Bar::Registers, 0x100).unwrap();
    let regs = Registers::new(&io).unwrap();

    let window = bus.window(dev, Bar::Registers).unwrap();
    window.poke32(Register::IvPosition.offset(), 3);
    window.poke32(Register::IntrStatus.offset(), 0x1);

    assert_eq!(regs.iv_position(), 3);
    assert_eq!(regs.intr_status(), 0x1);
    assert!(window.register_writes().is_empty());
    bus.iounmap(dev, io);
}

#[test]
fn short_window_is_rejected() {
    let bus = MockPlatform::new();
    let dev = bus.add_ivshmem(Paddr::new(0xFD00_0000), 0x1000);
    let io = bus.iomap(dev, Bar::Registers, 0x10).unwrap();
    assert!(Registers::new(&io).is_none());
    bus.iounmap(dev, io);
}
