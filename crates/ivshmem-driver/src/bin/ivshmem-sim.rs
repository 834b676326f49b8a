// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Simulated ivshmem session.
//!
//! Loads the driver against the mock platform and runs one full
//! attach, open, map, command and detach cycle, logging every step.
//! Set `IVSHMEM_LOG` to change the filter (default `info`).

use std::process::ExitCode;
use std::sync::Arc;

use ivshmem_abi::pci::Bar;
use ivshmem_abi::{IVSHMEM_IOCTL_COMM, Paddr, Register, Vaddr};
use ivshmem_driver::platform::MockPlatform;
use ivshmem_driver::{DriverConfig, DriverError, DriverModule, VmArea, WindowGeometry};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared window placed off a page boundary to exercise the alignment math.
const SHARED_BASE: Paddr = Paddr::new(0xFD00_0400);
const SHARED_LEN: usize = 0x10_0000;
const USER_BASE: Vaddr = Vaddr::new(0x7f00_0000_0000);

fn run() -> Result<(), DriverError> {
    let platform = Arc::new(MockPlatform::new());
    let dev = platform.add_ivshmem(SHARED_BASE, SHARED_LEN);

    let module = DriverModule::load(Arc::clone(&platform), DriverConfig::default())?;
    let minor = module.bind(dev)?;
    let file = module.node().open(minor)?;

    let process = platform.new_process();
    let geometry =
        WindowGeometry::of(SHARED_BASE, SHARED_LEN as u64).ok_or(DriverError::InvalidRange)?;
    let area = VmArea::with_len(USER_BASE, geometry.len).ok_or(DriverError::InvalidRange)?;
    file.mmap(0, area, &process)?;

    let window_start = USER_BASE
        .checked_add(SHARED_BASE.page_offset())
        .ok_or(DriverError::InvalidRange)?;
    file.ioctl(IVSHMEM_IOCTL_COMM, 1);
    if let Some(bytes) = process.read(window_start, 16) {
        info!(bytes = %String::from_utf8_lossy(&bytes), "after pattern fill");
    }

    file.ioctl(IVSHMEM_IOCTL_COMM, 0x50);
    if let Some(regs) = platform.window(dev, Bar::Registers) {
        info!(comm = regs.peek32(Register::Comm.offset()), "after comm write");
    }

    file.ioctl(IVSHMEM_IOCTL_COMM, 2);
    let zeroed = process
        .read(window_start, 16)
        .is_some_and(|bytes| bytes.iter().all(|&b| b == 0));
    info!(zeroed, "after zero fill");

    file.ioctl(0xdead, 0);
    file.release();

    module.remove(dev)?;
    module.unload();
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("IVSHMEM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run() {
        Ok(()) => {
            info!("session complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, errno = e.to_errno(), "session failed");
            ExitCode::FAILURE
        }
    }
}
