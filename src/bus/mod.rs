/*
 *  bus/mod.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared I2C bus subsystem - one connection per bus, many device handles
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

//! Shared I2C bus access
//!
//! Several device drivers usually sit on the same physical bus (a sensor, a
//! display, a port expander on `/dev/i2c-1`). This module keeps exactly one
//! open connection per bus path and hands out a [`DeviceHandle`] per device
//! address:
//!
//! ```ignore
//! let registry = BusRegistry::new(LinuxDriver);
//! let mut sensor = registry.open("/dev/i2c-1", 0x76)?;
//! let mut oled = registry.open("/dev/i2c-1", 0x3C)?;   // same connection
//! let id = sensor.read_byte_data(0xD0)?;
//! sensor.close();
//! oled.close();                                         // bus closed here
//! ```
//!
//! ## Locking
//!
//! Two lock tiers, always taken in this order:
//!
//! 1. the registry map lock, held around map lookups and changes
//! 2. the per-bus record lock, held around refcount changes and for the
//!    whole of every address-select + transfer pair
//!
//! Holding the record lock across select and transfer is what keeps a
//! transaction from going out to another handle's address.

pub mod drivers;
pub mod error;
pub mod handle;
pub mod registry;
pub mod traits;

pub use drivers::dryrun::DryRunDriver;
pub use drivers::mock::{MockDriver, MockDriverState, MockEvent};
pub use error::{BusError, DriverError};
pub use handle::DeviceHandle;
pub use registry::BusRegistry;
pub use traits::{BusDriver, Reply, Transaction};

#[cfg(feature = "driver-linux")]
pub use drivers::linux::LinuxDriver;

#[cfg(feature = "driver-linux")]
mod system {
    use std::sync::OnceLock;

    use super::{BusError, BusRegistry, DeviceHandle, LinuxDriver};

    static SYSTEM: OnceLock<BusRegistry<LinuxDriver>> = OnceLock::new();

    /// Process-wide registry on the real i2c-dev driver
    ///
    /// Library code should take a [`BusRegistry`] as a parameter; this is for
    /// the outermost layer of an application.
    pub fn system() -> &'static BusRegistry<LinuxDriver> {
        SYSTEM.get_or_init(|| BusRegistry::new(LinuxDriver))
    }

    /// Open a device on the process-wide registry
    pub fn open(path: &str, address: u16) -> Result<DeviceHandle<LinuxDriver>, BusError> {
        system().open(path, address)
    }

    /// Close every bus opened through the process-wide registry
    pub fn close_all() {
        if let Some(registry) = SYSTEM.get() {
            registry.close_all();
        }
    }

}

#[cfg(feature = "driver-linux")]
pub use system::{close_all, open, system};
