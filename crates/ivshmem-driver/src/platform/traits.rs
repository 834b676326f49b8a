// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform capability traits.

use core::fmt;

use ivshmem_abi::pci::Bar;
use ivshmem_abi::{Paddr, PciId, Vaddr};

/// Identifies one device instance on the bus.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceHandle(u32);

impl DeviceHandle {
    /// Create a handle from the bus's raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw bus identifier.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceHandle({})", self.0)
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pci#{}", self.0)
    }
}

/// Location and size of a BAR as assigned by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarInfo {
    /// Bus-assigned physical start.
    pub start: Paddr,
    /// Length in bytes.
    pub len: u64,
}

/// Errors reported by the bus subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The device could not be enabled.
    EnableFailed,
    /// The regions are owned by another driver.
    Busy,
    /// The node or driver could not be registered.
    RegistrationFailed,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnableFailed => write!(f, "device enable failed"),
            Self::Busy => write!(f, "regions already claimed"),
            Self::RegistrationFailed => write!(f, "registration failed"),
        }
    }
}

/// Ordered access to one memory-mapped window.
///
/// Every call is a single uncached access performed in program order.
/// Offsets are in bytes from the start of the window and must lie inside
/// `len()`.
pub trait Mmio: Send + Sync {
    /// Length of the mapped window in bytes.
    fn len(&self) -> usize;

    /// Kernel-side virtual base of the mapping.
    fn base(&self) -> Vaddr;

    /// Read a 32-bit word.
    fn read32(&self, offset: usize) -> u32;

    /// Write a 32-bit word.
    fn write32(&self, offset: usize, value: u32);

    /// Read a byte.
    fn read8(&self, offset: usize) -> u8;

    /// Write a byte.
    fn write8(&self, offset: usize, value: u8);

    /// Returns true if the window is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set every byte of the window to `value`.
    fn fill(&self, value: u8) {
        for offset in 0..self.len() {
            self.write8(offset, value);
        }
    }
}

/// The bus operations used to claim and release a device.
pub trait PciBus: Send + Sync {
    /// Window handle returned by `iomap`.
    type Io: Mmio;

    /// Vendor/device pair of an enumerated device.
    fn device_id(&self, dev: DeviceHandle) -> Option<PciId>;

    /// Power up the device and enable its decoders.
    ///
    /// # Errors
    ///
    /// Returns `EnableFailed` if the device cannot be enabled.
    fn enable_device(&self, dev: DeviceHandle) -> Result<(), BusError>;

    /// Reverse `enable_device`.
    fn disable_device(&self, dev: DeviceHandle);

    /// Take exclusive ownership of every BAR of the device.
    ///
    /// # Errors
    ///
    /// Returns `Busy` if another owner holds any of the regions.
    fn request_regions(&self, dev: DeviceHandle, owner: &'static str) -> Result<(), BusError>;

    /// Reverse `request_regions`.
    fn release_regions(&self, dev: DeviceHandle);

    /// Location of a BAR, or `None` if the device does not implement it.
    fn resource(&self, dev: DeviceHandle, bar: Bar) -> Option<BarInfo>;

    /// Map a BAR into the driver's address space.
    ///
    /// `max_len` of zero maps the whole BAR.
    fn iomap(&self, dev: DeviceHandle, bar: Bar, max_len: usize) -> Option<Self::Io>;

    /// Reverse `iomap`.
    fn iounmap(&self, dev: DeviceHandle, io: Self::Io);
}

/// Registration points for the device node and the bus driver.
pub trait DriverHost: Send + Sync {
    /// Register a character device node, returning its major number.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationFailed` if no major number is available.
    fn register_node(&self, name: &'static str) -> Result<u32, BusError>;

    /// Reverse `register_node`.
    fn unregister_node(&self, major: u32, name: &'static str);

    /// Register the bus driver for a vendor/device pair.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationFailed` if the bus refuses the driver.
    fn register_driver(&self, name: &'static str, id: PciId) -> Result<(), BusError>;

    /// Reverse `register_driver`.
    fn unregister_driver(&self, name: &'static str);
}

/// A page-aligned virtual range in a requesting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmArea {
    /// First byte of the range.
    pub start: Vaddr,
    /// One past the last byte of the range.
    pub end: Vaddr,
}

impl VmArea {
    /// Create a range covering `[start, end)`.
    #[inline]
    #[must_use]
    pub const fn new(start: Vaddr, end: Vaddr) -> Self {
        Self { start, end }
    }

    /// Create a range of `len` bytes starting at `start`.
    ///
    /// Returns `None` if the range would wrap the address space.
    #[must_use]
    pub const fn with_len(start: Vaddr, len: u64) -> Option<Self> {
        match start.checked_add(len) {
            Some(end) => Some(Self { start, end }),
            None => None,
        }
    }

    /// Length in bytes, or zero for an inverted range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        match self.end.checked_diff(self.start) {
            Some(len) => len,
            None => 0,
        }
    }

    /// Returns true if the range covers no bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if both ends sit on page boundaries.
    #[inline]
    #[must_use]
    pub const fn is_page_aligned(&self) -> bool {
        self.start.is_page_aligned() && self.end.is_page_aligned()
    }

    /// Returns true if the two ranges share any byte.
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start.as_u64() < other.end.as_u64() && other.start.as_u64() < self.end.as_u64()
    }
}

/// Cache attributes for a process mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAttr {
    /// Normal cached memory.
    Cached,
    /// Device memory (uncached, strongly ordered).
    Device,
}

/// Attributes applied to an installed mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapAttrs {
    /// Writes are visible to every mapper and the device.
    pub shared: bool,
    /// Never duplicated into a child on fork, never grown by mremap.
    pub dont_copy: bool,
    /// Excluded from core dumps.
    pub dont_dump: bool,
    /// Cacheability of the pages.
    pub cache: CacheAttr,
}

impl MapAttrs {
    /// Live device memory shared between processes and the device.
    pub const DEVICE_SHARED: Self = Self {
        shared: true,
        dont_copy: true,
        dont_dump: true,
        cache: CacheAttr::Device,
    };
}

/// Errors from the host memory system while installing a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// Part of the range is already mapped.
    AlreadyMapped,
    /// Page tables could not be allocated.
    InsufficientResources,
    /// Address or length not page-aligned.
    MisalignedAddress,
}

impl MapError {
    /// Returns true if pages may have been installed before the failure.
    #[must_use]
    pub const fn may_leave_partial(self) -> bool {
        matches!(self, Self::InsufficientResources)
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyMapped => write!(f, "virtual address already mapped"),
            Self::InsufficientResources => write!(f, "insufficient resources"),
            Self::MisalignedAddress => write!(f, "address not properly aligned"),
        }
    }
}

/// A requesting process's address space.
pub trait AddressSpace: Send + Sync {
    /// Map `len` bytes of physical frames starting at `pfn` over `area`.
    ///
    /// # Errors
    ///
    /// `AlreadyMapped` and `MisalignedAddress` are reported before any page
    /// is touched. `InsufficientResources` may leave the pages installed
    /// before the failure in place until `zap_range` is called.
    fn remap_pfn_range(
        &self,
        area: &VmArea,
        pfn: u64,
        len: u64,
        attrs: MapAttrs,
    ) -> Result<(), MapError>;

    /// Remove every page mapped inside `area`.
    fn zap_range(&self, area: &VmArea);
}

const _: () = {
    assert!(MapAttrs::DEVICE_SHARED.shared);
    assert!(MapAttrs::DEVICE_SHARED.dont_copy);
    assert!(MapAttrs::DEVICE_SHARED.dont_dump);
};
