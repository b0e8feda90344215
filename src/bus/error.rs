/*
 *  bus/error.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for the shared I2C bus subsystem
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

use thiserror::Error;

/// Failure reported by a bus driver implementation
#[derive(Debug, Error)]
pub enum DriverError {
    /// Operating system level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transaction was attempted before any target address was selected
    #[error("no target address selected")]
    NoAddress,

    /// The driver answered a transaction with the wrong kind of reply
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    /// Injected failure (mock and dry-run drivers)
    #[error("simulated failure: {0}")]
    Simulated(String),

    /// Foreign driver error, rendered as text
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced to users of the bus registry and device handles
#[derive(Debug, Error)]
pub enum BusError {
    /// Device address outside 0..=255, rejected at open
    #[error("invalid I2C address {0} (must be 0..=255)")]
    InvalidAddress(u16),

    /// The driver could not open the physical bus
    #[error("error opening I2C bus {path}: {source}")]
    BusOpen {
        path: String,
        #[source]
        source: DriverError,
    },

    /// Operation on a handle that was closed, or torn down by close-all
    #[error("I2C device already closed")]
    HandleClosed,

    /// Address select or transaction failed in the driver
    #[error("I2C transaction on {path} at 0x{address:02X} failed: {source}")]
    Transaction {
        path: String,
        address: u8,
        #[source]
        source: DriverError,
    },
}

impl BusError {
    /// True for errors caused by a closed or stale handle
    pub fn is_closed(&self) -> bool {
        matches!(self, BusError::HandleClosed)
    }
}

#[cfg(feature = "driver-linux")]
impl From<linux_embedded_hal::I2CError> for DriverError {
    fn from(err: linux_embedded_hal::I2CError) -> Self {
        DriverError::Other(format!("{:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_bus_open_error_has_source() {
        let err = BusError::BusOpen {
            path: "/dev/i2c-1".to_string(),
            source: DriverError::Simulated("no such device".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "error opening I2C bus /dev/i2c-1: simulated failure: no such device"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_error_converts_to_driver_error() {
        let err = DriverError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(matches!(err, DriverError::Io(ref io) if io.kind() == std::io::ErrorKind::PermissionDenied));
        assert!(err.to_string().starts_with("I/O error: "));
    }

    #[test]
    fn test_transaction_error_formats_address_as_hex() {
        let err = BusError::Transaction {
            path: "bus0".to_string(),
            address: 0x0A,
            source: DriverError::NoAddress,
        };
        assert!(err.to_string().contains("at 0x0A"));
        assert!(!err.is_closed());
        assert!(BusError::HandleClosed.is_closed());
    }
}
