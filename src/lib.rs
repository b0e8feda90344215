/*
 *  lib.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared I2C bus access for LyMonS device drivers
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

//! # LyMonS hardware bus layer
//!
//! Device drivers (sensors, displays, expanders) open a [`DeviceHandle`] for
//! their address; handles on the same bus path share one open connection.
//!
//! ## Features
//!
//! - `driver-linux` (default) - real `/dev/i2c-N` access and the process-wide
//!   [`bus::system`] registry
//!
//! The dry-run and mock drivers are always available.

pub mod bus;
pub mod config;
pub mod word;

pub use bus::{BusDriver, BusError, BusRegistry, DeviceHandle, DriverError};
pub use word::{bytes_to_word, word_to_bytes, WordError};
