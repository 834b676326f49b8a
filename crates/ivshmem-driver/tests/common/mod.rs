// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for integration tests.
//!
//! This module provides:
//! - [`Session`] - a mock platform with one attached ivshmem device
//! - [`BlockingSpace`] - an address space that parks inside `remap_pfn_range`
//!
//! This module is not a test file, so it must comply with full clippy rules.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::{Arc, Barrier};

use ivshmem_abi::{Paddr, Vaddr};
use ivshmem_driver::platform::{MapAttrs, MapError, MockPlatform, MockProcess};
use ivshmem_driver::{AddressSpace, DeviceHandle, DriverConfig, DriverError, Lifecycle, VmArea};

/// Base of the user range tests map into.
pub const USER_BASE: Vaddr = Vaddr::new(0x7f00_0000_0000);

/// A mock platform with one attached device.
pub struct Session {
    pub platform: Arc<MockPlatform>,
    pub lifecycle: Arc<Lifecycle<MockPlatform>>,
    pub dev: DeviceHandle,
}

impl Session {
    /// Add an ivshmem device at `base` and attach it.
    pub fn attached(base: Paddr, len: usize, config: DriverConfig) -> Result<Self, DriverError> {
        let platform = Arc::new(MockPlatform::new());
        let dev = platform.add_ivshmem(base, len);
        let lifecycle = Arc::new(Lifecycle::new(Arc::clone(&platform), config));
        lifecycle.attach(dev)?;
        Ok(Self {
            platform,
            lifecycle,
            dev,
        })
    }
}

/// User range of `len` bytes starting `skip` bytes above [`USER_BASE`].
#[must_use]
pub fn user_area(skip: u64, len: u64) -> VmArea {
    let start = Vaddr::new(USER_BASE.as_u64() + skip);
    VmArea::new(start, Vaddr::new(start.as_u64() + len))
}

/// Address space that meets a barrier twice inside `remap_pfn_range`.
///
/// The first barrier tells the test the install is in flight. The install
/// then stays parked until the test reaches the second barrier.
pub struct BlockingSpace {
    pub process: MockProcess,
    pub entered: Arc<Barrier>,
    pub proceed: Arc<Barrier>,
}

impl BlockingSpace {
    #[must_use]
    pub fn new(process: MockProcess) -> Self {
        Self {
            process,
            entered: Arc::new(Barrier::new(2)),
            proceed: Arc::new(Barrier::new(2)),
        }
    }
}

impl AddressSpace for BlockingSpace {
    fn remap_pfn_range(
        &self,
        area: &VmArea,
        pfn: u64,
        len: u64,
        attrs: MapAttrs,
    ) -> Result<(), MapError> {
        self.entered.wait();
        self.proceed.wait();
        self.process.remap_pfn_range(area, pfn, len, attrs)
    }

    fn zap_range(&self, area: &VmArea) {
        self.process.zap_range(area);
    }
}
