// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Driver load and unload.
//!
//! Load registers the device node first, taking whatever major the host
//! assigns, then registers the bus driver with its match table. A failed
//! bus registration rolls the node back. Unload runs the same steps in
//! reverse after detaching every device.

use std::sync::Arc;

use ivshmem_abi::pci::{DRIVER_NAME, NODE_NAME};
use tracing::{error, info};

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::lifecycle::Lifecycle;
use crate::node::DeviceNode;
use crate::platform::{DeviceHandle, DriverHost, PciBus};


/// A loaded driver instance.
pub struct DriverModule<B: PciBus + DriverHost> {
    host: Arc<B>,
    lifecycle: Arc<Lifecycle<B>>,
    major: u32,
}

impl<B: PciBus + DriverHost> DriverModule<B> {
    /// Register the node and the bus driver.
    ///
    /// # Errors
    ///
    /// Returns `ResourceUnavailable` if either registration fails. Nothing
    /// stays registered in that case.
    pub fn load(host: Arc<B>, config: DriverConfig) -> Result<Self, DriverError> {
        let major = host.register_node(NODE_NAME).map_err(|e| {
            error!(error = %e, "cannot register device node");
            DriverError::from(e)
        })?;

        if let Err(e) = host.register_driver(DRIVER_NAME, config.pci_id) {
            error!(error = %e, "cannot register bus driver");
            host.unregister_node(major, NODE_NAME);
            return Err(DriverError::from(e));
        }

        info!(major, id = %config.pci_id, "driver loaded");
        Ok(Self {
            lifecycle: Arc::new(Lifecycle::new(Arc::clone(&host), config)),
            host,
            major,
        })
    }

    /// Major number assigned to the node.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// The lifecycle controller.
    #[must_use]
    pub const fn lifecycle(&self) -> &Arc<Lifecycle<B>> {
        &self.lifecycle
    }

    /// The device node.
    #[must_use]
    pub fn node(&self) -> DeviceNode<B> {
        DeviceNode::new(Arc::clone(&self.lifecycle))
    }

    /// Bus bind entry point.
    ///
    /// # Errors
    ///
    /// See [`Lifecycle::attach`].
    pub fn bind(&self, dev: DeviceHandle) -> Result<u32, DriverError> {
        self.lifecycle.attach(dev)
    }

    /// Bus remove entry point.
    ///
    /// # Errors
    ///
    /// See [`Lifecycle::detach`].
    pub fn remove(&self, dev: DeviceHandle) -> Result<(), DriverError> {
        self.lifecycle.detach(dev)
    }

    /// Detach everything and unregister the driver, then the node.
    pub fn unload(self) {
        self.lifecycle.detach_all();
        self.host.unregister_driver(DRIVER_NAME);
        self.host.unregister_node(self.major, NODE_NAME);
        info!(major = self.major, "driver unloaded");
    }
}
