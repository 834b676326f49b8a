// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Control-command execution.
//!
//! Fill commands touch every byte of the shared window through the
//! driver-side mapping. Comm writes go to the general command register and
//! are serialized so each one lands as a single whole-word write.

use std::sync::{Mutex, PoisonError};

use ivshmem_abi::{ControlCommand, FILL_PATTERN};
use tracing::{debug, info, warn};

use crate::config::CommandPolicy;
use crate::error::DriverError;
use crate::platform::Mmio;
use crate::registers::Registers;
use crate::resource::DeviceState;


/// Executes decoded control commands against a device.
pub struct CommandDispatcher {
    comm_lock: Mutex<()>,
    policy: CommandPolicy,
}

impl CommandDispatcher {
    /// Create a dispatcher applying `policy` to unknown codes.
    #[must_use]
    pub const fn new(policy: CommandPolicy) -> Self {
        Self {
            comm_lock: Mutex::new(()),
            policy,
        }
    }

    /// Policy for unknown codes.
    #[must_use]
    pub const fn policy(&self) -> CommandPolicy {
        self.policy
    }

    /// Run `command` against `state`.
    ///
    /// # Errors
    ///
    /// - `NotMapped` if the command needs a window that is not claimed
    /// - `UnsupportedCommand` for an unknown code under the strict policy
    pub fn dispatch<I: Mmio>(
        &self,
        command: ControlCommand,
        state: &DeviceState<I>,
    ) -> Result<(), DriverError> {
        let handle = state.handle();
        match command {
            ControlCommand::PatternFill => {
                let resources = state.resources();
                let shared = resources.as_ref().ok_or(DriverError::NotMapped)?.shared.io();
                for offset in 0..shared.len() {
                    shared.write8(offset, FILL_PATTERN[offset % FILL_PATTERN.len()]);
                }
                info!(%handle, len = shared.len(), "shared window filled with pattern");
                Ok(())
            }
            ControlCommand::ZeroFill => {
                let resources = state.resources();
                let shared = resources.as_ref().ok_or(DriverError::NotMapped)?.shared.io();
                shared.fill(0);
                info!(%handle, len = shared.len(), "shared window zeroed");
                Ok(())
            }
            ControlCommand::Reserved => {
                debug!(%handle, "reserved command");
                Ok(())
            }
            ControlCommand::CommWrite(value) => {
                let resources = state.resources();
                let registers = resources
                    .as_ref()
                    .and_then(|r| Registers::new(r.registers.io()))
                    .ok_or(DriverError::NotMapped)?;
                let _comm = self.comm_lock.lock().unwrap_or_else(PoisonError::into_inner);
                registers.write_comm(value);
                debug!(%handle, value, "comm register written");
                Ok(())
            }
            ControlCommand::Unknown(code) => match self.policy {
                CommandPolicy::Lenient => {
                    warn!(%handle, code, "ignoring unknown command");
                    Ok(())
                }
                CommandPolicy::Strict => {
                    warn!(%handle, code, "rejecting unknown command");
                    Err(DriverError::UnsupportedCommand(code))
                }
            },
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(CommandPolicy::default())
    }
}
