// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mapping the shared window into a requesting process.
//!
//! The bus may place BAR2 at an address that is not page-aligned, while a
//! process can only map whole pages. The window is therefore widened to
//! page granularity first:
//!
//! ```text
//!   aligned base        true base                     true end   aligned end
//!        │◄── page_offset ──►│◄──────── size ─────────►│            │
//!        ├───────────────────┴─────────────────────────┴────────────┤
//!        │◄──────────────────── aligned len ───────────────────────►│
//! ```
//!
//! A request's offset is measured from the aligned base, and
//! `offset + len` must fit inside the aligned length. Oversized requests
//! are rejected, never clamped.

use std::sync::{Mutex, PoisonError};

use ivshmem_abi::layout::{PAGE_SIZE, page_align_len};
use ivshmem_abi::{PAGE_SHIFT, Paddr};
use tracing::{debug, error, info, warn};

use crate::error::DriverError;
use crate::platform::{AddressSpace, MapAttrs, Mmio, VmArea};
use crate::resource::DeviceState;


/// A request to expose part of the shared window to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRequest {
    /// Byte offset into the page-aligned window.
    pub offset: u64,
    /// Target virtual range; its length is the requested length.
    pub area: VmArea,
}

impl MappingRequest {
    /// Create a request for `area` at byte `offset`.
    #[must_use]
    pub const fn new(offset: u64, area: VmArea) -> Self {
        Self { offset, area }
    }

    /// Create a request from a page offset, as carried by mmap.
    ///
    /// Returns `None` if the byte offset overflows.
    #[must_use]
    pub const fn from_pgoff(pgoff: u64, area: VmArea) -> Option<Self> {
        if pgoff > (u64::MAX >> PAGE_SHIFT) {
            return None;
        }
        Some(Self::new(pgoff << PAGE_SHIFT, area))
    }

    /// Requested length in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.area.len()
    }

    /// Returns true if the request covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.area.is_empty()
    }
}

/// The shared window widened to whole pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// True base rounded down to a page boundary.
    pub base: Paddr,
    /// Length from `base` to the end of the window, rounded up to pages.
    pub len: u64,
}

impl WindowGeometry {
    /// Widen a window at `base` of `size` bytes.
    ///
    /// Returns `None` if the widened window overflows.
    #[must_use]
    pub const fn of(base: Paddr, size: u64) -> Option<Self> {
        let Some(span) = base.page_offset().checked_add(size) else {
            return None;
        };
        let Some(len) = page_align_len(span) else {
            return None;
        };
        Some(Self {
            base: base.page_align_down(),
            len,
        })
    }

    /// Physical address the request's first page maps to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if the request is empty, not page-granular,
    /// or reaches past the aligned window.
    pub fn resolve(&self, request: &MappingRequest) -> Result<Paddr, DriverError> {
        if request.is_empty()
            || !request.area.is_page_aligned()
            || request.offset % PAGE_SIZE != 0
        {
            return Err(DriverError::InvalidRange);
        }
        let fits = request
            .offset
            .checked_add(request.len())
            .is_some_and(|end| end <= self.len);
        if !fits {
            return Err(DriverError::InvalidRange);
        }
        self.base
            .checked_add(request.offset)
            .ok_or(DriverError::InvalidRange)
    }
}

/// Installs shared-window mappings into process address spaces.
///
/// Validation and installation run under one lock so two concurrent
/// requests never interleave their alignment math.
pub struct MappingBridge {
    install: Mutex<()>,
}

impl MappingBridge {
    /// Create a bridge.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            install: Mutex::new(()),
        }
    }

    /// Map the part of the shared window described by `request` into `space`.
    ///
    /// # Errors
    ///
    /// - `NotEnabled` if the device is not claimed
    /// - `InvalidRange` if the request does not fit the aligned window
    /// - `MappingFailed` if the host could not install the pages; nothing
    ///   stays mapped in the target range
    pub fn map<I: Mmio, S: AddressSpace + ?Sized>(
        &self,
        request: &MappingRequest,
        state: &DeviceState<I>,
        space: &S,
    ) -> Result<(), DriverError> {
        let handle = state.handle();
        let _install = self.install.lock().unwrap_or_else(PoisonError::into_inner);

        // Held across install so the window cannot be released underneath.
        let resources = state.resources();
        let shared = match resources.as_ref() {
            Some(claimed) if state.is_enabled() => &claimed.shared,
            _ => {
                warn!(%handle, "mmap on disabled device");
                return Err(DriverError::NotEnabled);
            }
        };

        let geometry =
            WindowGeometry::of(shared.base(), shared.size()).ok_or(DriverError::InvalidRange)?;
        debug!(
            %handle,
            start = %request.area.start,
            end = %request.area.end,
            offset = request.offset,
            aligned_base = %geometry.base,
            aligned_len = geometry.len,
            "mmap request"
        );

        let paddr = geometry.resolve(request).inspect_err(|_| {
            warn!(
                %handle,
                len = request.len(),
                offset = request.offset,
                aligned_len = geometry.len,
                "mmap request exceeds shared window"
            );
        })?;

        if let Err(e) =
            space.remap_pfn_range(&request.area, paddr.pfn(), request.len(), MapAttrs::DEVICE_SHARED)
        {
            // Mappings that predate this request stay untouched.
            if e.may_leave_partial() {
                space.zap_range(&request.area);
            }
            error!(%handle, error = %e, "mmap failed");
            return Err(DriverError::from(e));
        }

        info!(
            %handle,
            start = %request.area.start,
            %paddr,
            len = request.len(),
            "shared window mapped into process"
        );
        Ok(())
    }
}

impl Default for MappingBridge {
    fn default() -> Self {
        Self::new()
    }
}
