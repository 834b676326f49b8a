// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock platform implementation for testing.
//!
//! Simulates a PCI bus populated with ivshmem-like devices whose BARs are
//! backed by heap memory, plus process address spaces whose mappings
//! resolve through the same physical map. A byte written through a
//! process mapping is therefore visible through the driver's `Mmio` view
//! and the other way round.

#![allow(clippy::panic)] // Test infrastructure - panicking on invalid input is correct

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ivshmem_abi::layout::PAGE_SIZE;
use ivshmem_abi::pci::Bar;
use ivshmem_abi::regs::REGISTER_WINDOW_LEN;
use ivshmem_abi::{Paddr, PciId, Vaddr};

use super::traits::{
    AddressSpace, BarInfo, BusError, DeviceHandle, DriverHost, MapAttrs, MapError, Mmio, PciBus,
    VmArea,
};

/// Offset between a physical address and its kernel-side mapping.
const KERNEL_DIRECT_MAP: u64 = 0xFFFF_8000_0000_0000;

/// Physical base of BAR0 of the first device added by `MockPlatform::add_ivshmem`.
///
/// Each later device gets its BAR0 one page higher.
pub const MOCK_REGISTER_BASE: Paddr = Paddr::new(0xFEBF_1000);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Heap-backed physical window (one BAR).
pub struct MockWindow {
    base: Paddr,
    cells: Box<[AtomicU8]>,
    writes: Mutex<Vec<(usize, u32)>>,
}

impl MockWindow {
    fn new(base: Paddr, len: usize) -> Self {
        Self {
            base,
            cells: (0..len).map(|_| AtomicU8::new(0)).collect(),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Physical base of the window.
    #[must_use]
    pub const fn base(&self) -> Paddr {
        self.base
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the window has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns true if `paddr` falls inside the window.
    #[must_use]
    pub fn contains(&self, paddr: Paddr) -> bool {
        paddr >= self.base && paddr.as_u64() - self.base.as_u64() < self.cells.len() as u64
    }

    /// Device-side byte read.
    #[must_use]
    pub fn peek8(&self, offset: usize) -> u8 {
        self.cell(offset).load(Ordering::SeqCst)
    }

    /// Device-side byte write. Not recorded in the write log.
    pub fn poke8(&self, offset: usize, value: u8) {
        self.cell(offset).store(value, Ordering::SeqCst);
    }

    /// Device-side word read.
    #[must_use]
    pub fn peek32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.peek8(offset),
            self.peek8(offset + 1),
            self.peek8(offset + 2),
            self.peek8(offset + 3),
        ])
    }

    /// Device-side word write. Not recorded in the write log.
    pub fn poke32(&self, offset: usize, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.poke8(offset + i, byte);
        }
    }

    /// Copy of every byte in the window.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }

    /// Word writes issued through `Mmio`, in order.
    #[must_use]
    pub fn register_writes(&self) -> Vec<(usize, u32)> {
        lock(&self.writes).clone()
    }

    fn cell(&self, offset: usize) -> &AtomicU8 {
        self.cells.get(offset).unwrap_or_else(|| {
            panic!(
                "offset {offset:#x} is beyond end of window at {} ({:#x} bytes)",
                self.base,
                self.cells.len()
            )
        })
    }
}

/// Driver-side mapping of a `MockWindow`.
pub struct MockIo {
    window: Arc<MockWindow>,
    len: usize,
}

impl Mmio for MockIo {
    fn len(&self) -> usize {
        self.len
    }

    fn base(&self) -> Vaddr {
        Vaddr::new(KERNEL_DIRECT_MAP | self.window.base.as_u64())
    }

    fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.len, "read32 at {offset:#x} would exceed window");
        self.window.peek32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.len, "write32 at {offset:#x} would exceed window");
        lock(&self.window.writes).push((offset, value));
        self.window.poke32(offset, value);
    }

    fn read8(&self, offset: usize) -> u8 {
        assert!(offset < self.len, "read8 at {offset:#x} would exceed window");
        self.window.peek8(offset)
    }

    fn write8(&self, offset: usize, value: u8) {
        assert!(offset < self.len, "write8 at {offset:#x} would exceed window");
        self.window.poke8(offset, value);
    }
}

/// Faults injected into the claim sequence of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFaults {
    /// `enable_device` fails.
    pub fail_enable: bool,
    /// `iomap` of this BAR returns `None`.
    pub fail_iomap: Option<Bar>,
}

struct MockDevice {
    id: PciId,
    bars: BTreeMap<u8, Arc<MockWindow>>,
    enabled: bool,
    owner: Option<&'static str>,
    live_iomaps: usize,
    faults: DeviceFaults,
}

#[derive(Default)]
struct HostState {
    nodes: Vec<(u32, &'static str)>,
    drivers: Vec<(&'static str, PciId)>,
    fail_node: bool,
    fail_driver: bool,
}

struct Inner {
    devices: Mutex<BTreeMap<DeviceHandle, MockDevice>>,
    next_handle: AtomicU32,
    next_major: AtomicU32,
    host: Mutex<HostState>,
}

impl Inner {
    fn window_at(&self, paddr: Paddr) -> Option<Arc<MockWindow>> {
        lock(&self.devices)
            .values()
            .flat_map(|dev| dev.bars.values())
            .find(|w| w.contains(paddr))
            .cloned()
    }
}

/// A simulated bus and host.
#[derive(Clone)]
pub struct MockPlatform {
    inner: Arc<Inner>,
}

impl MockPlatform {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                devices: Mutex::new(BTreeMap::new()),
                next_handle: AtomicU32::new(1),
                next_major: AtomicU32::new(240),
                host: Mutex::new(HostState::default()),
            }),
        }
    }

    /// Add a device with arbitrary BARs.
    pub fn add_device(&self, id: PciId, bars: &[(Bar, Paddr, usize)]) -> DeviceHandle {
        let handle = DeviceHandle::new(self.inner.next_handle.fetch_add(1, Ordering::SeqCst));
        let bars = bars
            .iter()
            .map(|&(bar, base, len)| (bar.index(), Arc::new(MockWindow::new(base, len))))
            .collect();
        lock(&self.inner.devices).insert(
            handle,
            MockDevice {
                id,
                bars,
                enabled: false,
                owner: None,
                live_iomaps: 0,
                faults: DeviceFaults::default(),
            },
        );
        handle
    }

    /// Add an ivshmem device whose shared window starts at `shared_base`.
    pub fn add_ivshmem(&self, shared_base: Paddr, shared_len: usize) -> DeviceHandle {
        let slot = lock(&self.inner.devices).len() as u64;
        let register_base = Paddr::new(MOCK_REGISTER_BASE.as_u64() + slot * PAGE_SIZE);
        self.add_device(
            PciId::IVSHMEM,
            &[
                (Bar::Registers, register_base, REGISTER_WINDOW_LEN),
                (Bar::SharedMemory, shared_base, shared_len),
            ],
        )
    }

    /// Inject faults into the claim sequence of `dev`.
    pub fn set_faults(&self, dev: DeviceHandle, faults: DeviceFaults) {
        self.with_device(dev, |d| d.faults = faults);
    }

    /// Mark the regions of `dev` as owned by someone else.
    pub fn claim_externally(&self, dev: DeviceHandle, owner: &'static str) {
        self.with_device(dev, |d| d.owner = Some(owner));
    }

    /// Drop an external claim made by `claim_externally`.
    pub fn release_externally(&self, dev: DeviceHandle) {
        self.with_device(dev, |d| d.owner = None);
    }

    /// Whether `dev` is currently enabled.
    #[must_use]
    pub fn is_enabled(&self, dev: DeviceHandle) -> bool {
        self.with_device(dev, |d| d.enabled)
    }

    /// Current owner of the regions of `dev`.
    #[must_use]
    pub fn region_owner(&self, dev: DeviceHandle) -> Option<&'static str> {
        self.with_device(dev, |d| d.owner)
    }

    /// Number of iomaps of `dev` not yet unmapped.
    #[must_use]
    pub fn live_iomaps(&self, dev: DeviceHandle) -> usize {
        self.with_device(dev, |d| d.live_iomaps)
    }

    /// Device-side view of a BAR.
    #[must_use]
    pub fn window(&self, dev: DeviceHandle, bar: Bar) -> Option<Arc<MockWindow>> {
        self.with_device(dev, |d| d.bars.get(&bar.index()).cloned())
    }

    /// Create an empty process address space on this platform.
    #[must_use]
    pub fn new_process(&self) -> MockProcess {
        MockProcess {
            platform: Arc::clone(&self.inner),
            mappings: Mutex::new(Vec::new()),
            fail_after_pages: Mutex::new(None),
        }
    }

    /// Make the next node or driver registration fail.
    pub fn fail_registration(&self, node: bool, driver: bool) {
        let mut host = lock(&self.inner.host);
        host.fail_node = node;
        host.fail_driver = driver;
    }

    /// Currently registered device nodes as (major, name).
    #[must_use]
    pub fn registered_nodes(&self) -> Vec<(u32, &'static str)> {
        lock(&self.inner.host).nodes.clone()
    }

    /// Currently registered bus drivers.
    #[must_use]
    pub fn registered_drivers(&self) -> Vec<(&'static str, PciId)> {
        lock(&self.inner.host).drivers.clone()
    }

    fn with_device<R>(&self, dev: DeviceHandle, f: impl FnOnce(&mut MockDevice) -> R) -> R {
        let mut devices = lock(&self.inner.devices);
        let device = devices
            .get_mut(&dev)
            .unwrap_or_else(|| panic!("unknown mock device {dev}"));
        f(device)
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PciBus for MockPlatform {
    type Io = MockIo;

    fn device_id(&self, dev: DeviceHandle) -> Option<PciId> {
        lock(&self.inner.devices).get(&dev).map(|d| d.id)
    }

    fn enable_device(&self, dev: DeviceHandle) -> Result<(), BusError> {
        self.with_device(dev, |d| {
            if d.faults.fail_enable {
                return Err(BusError::EnableFailed);
            }
            d.enabled = true;
            Ok(())
        })
    }

    fn disable_device(&self, dev: DeviceHandle) {
        self.with_device(dev, |d| d.enabled = false);
    }

    fn request_regions(&self, dev: DeviceHandle, owner: &'static str) -> Result<(), BusError> {
        self.with_device(dev, |d| {
            if d.owner.is_some() {
                return Err(BusError::Busy);
            }
            d.owner = Some(owner);
            Ok(())
        })
    }

    fn release_regions(&self, dev: DeviceHandle) {
        self.with_device(dev, |d| d.owner = None);
    }

    fn resource(&self, dev: DeviceHandle, bar: Bar) -> Option<BarInfo> {
        self.with_device(dev, |d| {
            d.bars.get(&bar.index()).map(|w| BarInfo {
                start: w.base(),
                len: w.len() as u64,
            })
        })
    }

    fn iomap(&self, dev: DeviceHandle, bar: Bar, max_len: usize) -> Option<MockIo> {
        self.with_device(dev, |d| {
            if d.faults.fail_iomap == Some(bar) {
                return None;
            }
            let window = d.bars.get(&bar.index())?;
            let len = if max_len == 0 {
                window.len()
            } else {
                max_len.min(window.len())
            };
            d.live_iomaps += 1;
            Some(MockIo {
                window: Arc::clone(window),
                len,
            })
        })
    }

    fn iounmap(&self, dev: DeviceHandle, io: MockIo) {
        drop(io);
        self.with_device(dev, |d| {
            assert!(d.live_iomaps > 0, "iounmap without matching iomap on {dev}");
            d.live_iomaps -= 1;
        });
    }
}

impl DriverHost for MockPlatform {
    fn register_node(&self, name: &'static str) -> Result<u32, BusError> {
        let mut host = lock(&self.inner.host);
        if host.fail_node {
            return Err(BusError::RegistrationFailed);
        }
        let major = self.inner.next_major.fetch_sub(1, Ordering::SeqCst);
        host.nodes.push((major, name));
        Ok(major)
    }

    fn unregister_node(&self, major: u32, name: &'static str) {
        lock(&self.inner.host)
            .nodes
            .retain(|&(m, n)| m != major || n != name);
    }

    fn register_driver(&self, name: &'static str, id: PciId) -> Result<(), BusError> {
        let mut host = lock(&self.inner.host);
        if host.fail_driver {
            return Err(BusError::RegistrationFailed);
        }
        host.drivers.push((name, id));
        Ok(())
    }

    fn unregister_driver(&self, name: &'static str) {
        lock(&self.inner.host).drivers.retain(|&(n, _)| n != name);
    }
}

/// A mapping installed into a `MockProcess`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Installed {
    /// Virtual range covered.
    pub area: VmArea,
    /// First physical frame mapped at `area.start`.
    pub pfn: u64,
    /// Attributes the mapping was installed with.
    pub attrs: MapAttrs,
}

impl Installed {
    /// Physical address backing `vaddr`, if the mapping covers it.
    #[must_use]
    pub fn translate(&self, vaddr: Vaddr) -> Option<Paddr> {
        if vaddr < self.area.start || vaddr >= self.area.end {
            return None;
        }
        let offset = vaddr.checked_diff(self.area.start)?;
        Paddr::from_pfn(self.pfn).checked_add(offset)
    }
}

/// A simulated process address space.
pub struct MockProcess {
    platform: Arc<Inner>,
    mappings: Mutex<Vec<Installed>>,
    fail_after_pages: Mutex<Option<u64>>,
}

impl MockProcess {
    /// Make the next `remap_pfn_range` fail after installing `pages` pages.
    pub fn fail_after_pages(&self, pages: Option<u64>) {
        *lock(&self.fail_after_pages) = pages;
    }

    /// Mappings currently installed.
    #[must_use]
    pub fn mappings(&self) -> Vec<Installed> {
        lock(&self.mappings).clone()
    }

    /// Read bytes through the process's mappings.
    ///
    /// Returns `None` if any byte is unmapped or not backed by a window.
    #[must_use]
    pub fn read(&self, vaddr: Vaddr, len: usize) -> Option<Vec<u8>> {
        (0..len as u64)
            .map(|i| {
                let (window, offset) = self.resolve(vaddr.checked_add(i)?)?;
                Some(window.peek8(offset))
            })
            .collect()
    }

    /// Write bytes through the process's mappings.
    ///
    /// Returns false, after writing the bytes before it, if any byte is
    /// unmapped.
    pub fn write(&self, vaddr: Vaddr, bytes: &[u8]) -> bool {
        for (i, &byte) in bytes.iter().enumerate() {
            let Some((window, offset)) = vaddr
                .checked_add(i as u64)
                .and_then(|addr| self.resolve(addr))
            else {
                return false;
            };
            window.poke8(offset, byte);
        }
        true
    }

    fn resolve(&self, vaddr: Vaddr) -> Option<(Arc<MockWindow>, usize)> {
        let paddr = lock(&self.mappings)
            .iter()
            .find_map(|m| m.translate(vaddr))?;
        let window = self.platform.window_at(paddr)?;
        let offset = usize::try_from(paddr.as_u64() - window.base().as_u64()).ok()?;
        Some((window, offset))
    }
}

impl AddressSpace for MockProcess {
    fn remap_pfn_range(
        &self,
        area: &VmArea,
        pfn: u64,
        len: u64,
        attrs: MapAttrs,
    ) -> Result<(), MapError> {
        if !area.is_page_aligned() || len % PAGE_SIZE != 0 || len != area.len() {
            return Err(MapError::MisalignedAddress);
        }

        let mut mappings = lock(&self.mappings);
        if mappings.iter().any(|m| m.area.overlaps(area)) {
            return Err(MapError::AlreadyMapped);
        }

        let pages = len / PAGE_SIZE;
        if let Some(limit) = lock(&self.fail_after_pages).take() {
            if limit < pages {
                if let Some(partial) = VmArea::with_len(area.start, limit * PAGE_SIZE) {
                    if !partial.is_empty() {
                        mappings.push(Installed {
                            area: partial,
                            pfn,
                            attrs,
                        });
                    }
                }
                return Err(MapError::InsufficientResources);
            }
        }

        mappings.push(Installed {
            area: *area,
            pfn,
            attrs,
        });
        Ok(())
    }

    fn zap_range(&self, area: &VmArea) {
        lock(&self.mappings).retain(|m| !m.area.overlaps(area));
    }
}
