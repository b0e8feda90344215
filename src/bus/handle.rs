/*
 *  bus/handle.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Device handle - one device address on a shared bus connection
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

use std::fmt;
use std::sync::Arc;

use log::{debug, info, trace};

use crate::bus::error::{BusError, DriverError};
use crate::bus::registry::{lock, ConnectionRecord, Shared};
use crate::bus::traits::{BusDriver, Reply, Transaction};

/// Handle to a single device on a shared I2C bus
///
/// Created by [`BusRegistry::open`](crate::bus::BusRegistry::open). Every
/// transaction selects this handle's address and runs the operation while
/// holding the bus lock, so handles for different devices on the same bus
/// can be used from different threads without stepping on each other.
///
/// Call [`close`](Self::close) when done. A handle that is dropped without
/// being closed is released on drop as a fallback.
pub struct DeviceHandle<D: BusDriver> {
    shared: Arc<Shared<D>>,

    /// `None` once closed
    record: Option<Arc<ConnectionRecord<D::Connection>>>,

    address: u8,
}

impl<D: BusDriver> DeviceHandle<D> {
    pub(crate) fn new(
        shared: Arc<Shared<D>>,
        record: Arc<ConnectionRecord<D::Connection>>,
        address: u8,
    ) -> Self {
        Self {
            shared,
            record: Some(record),
            address,
        }
    }

    /// Device address this handle is bound to
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Bus path, or `None` once the handle is closed
    pub fn path(&self) -> Option<&str> {
        self.record.as_ref().map(|record| record.path.as_str())
    }

    /// True if the handle was closed or its bus was torn down by `close_all`
    pub fn is_closed(&self) -> bool {
        match &self.record {
            Some(record) => lock(&record.state).connection.is_none(),
            None => true,
        }
    }

    /// Human readable description, `"I2C device: closed"` when unusable
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Release the handle
    ///
    /// The last handle on a bus closes the bus connection. Calling this more
    /// than once has no further effect.
    pub fn close(&mut self) {
        if self.release() {
            debug!("Closed I2C device at 0x{:02X}", self.address);
        }
    }

    /// Returns false if the handle was already closed.
    fn release(&mut self) -> bool {
        let Some(record) = self.record.take() else {
            return false;
        };

        let idle = {
            let mut state = lock(&record.state);
            if state.refcount == 0 {
                // bus already torn down by close_all
                false
            } else {
                state.refcount -= 1;
                if state.refcount == 0 {
                    if let Some(connection) = state.connection.take() {
                        self.shared.driver.close(connection);
                        info!("Closed I2C bus {}", record.path);
                    }
                    true
                } else {
                    false
                }
            }
        };

        if idle {
            self.shared.retire(&record);
        }
        true
    }

    /// Select this device and run `transaction` under the bus lock
    fn transact(&self, transaction: Transaction<'_>) -> Result<Reply, BusError> {
        let record = self.record.as_ref().ok_or(BusError::HandleClosed)?;
        let mut state = lock(&record.state);
        let connection = state.connection.as_mut().ok_or(BusError::HandleClosed)?;

        let name = transaction.name();
        trace!("{}:{:02X} {}", record.path, self.address, name);

        let driver = &self.shared.driver;
        driver
            .set_address(connection, self.address)
            .and_then(|()| driver.transact(connection, transaction))
            .map_err(|source| self.failed(record, source))
    }

    fn failed(&self, record: &ConnectionRecord<D::Connection>, source: DriverError) -> BusError {
        debug!(
            "I2C transaction on {}:{:02X} failed: {}",
            record.path, self.address, source
        );
        BusError::Transaction {
            path: record.path.clone(),
            address: self.address,
            source,
        }
    }

    fn unexpected(&self, name: &'static str) -> BusError {
        BusError::Transaction {
            path: self.path().unwrap_or_default().to_string(),
            address: self.address,
            source: DriverError::UnexpectedReply(name),
        }
    }

    fn byte_reply(&self, transaction: Transaction<'_>) -> Result<u8, BusError> {
        let name = transaction.name();
        match self.transact(transaction)? {
            Reply::Byte(value) => Ok(value),
            _ => Err(self.unexpected(name)),
        }
    }

    fn done_reply(&self, transaction: Transaction<'_>) -> Result<(), BusError> {
        let name = transaction.name();
        match self.transact(transaction)? {
            Reply::Done => Ok(()),
            _ => Err(self.unexpected(name)),
        }
    }

    fn count_reply(&self, transaction: Transaction<'_>) -> Result<usize, BusError> {
        let name = transaction.name();
        match self.transact(transaction)? {
            Reply::Count(count) => Ok(count),
            _ => Err(self.unexpected(name)),
        }
    }

    /// Read a byte from the device
    pub fn read_byte(&self) -> Result<u8, BusError> {
        self.byte_reply(Transaction::ReadByte)
    }

    /// Write a byte to the device
    pub fn write_byte(&self, value: u8) -> Result<(), BusError> {
        self.done_reply(Transaction::WriteByte(value))
    }

    /// Send command `cmd` and read a data byte
    pub fn read_byte_data(&self, cmd: u8) -> Result<u8, BusError> {
        self.byte_reply(Transaction::ReadByteData(cmd))
    }

    /// Send command `cmd` followed by a data byte
    pub fn write_byte_data(&self, cmd: u8, value: u8) -> Result<(), BusError> {
        self.done_reply(Transaction::WriteByteData(cmd, value))
    }

    /// Send command `cmd` and read a data word
    pub fn read_word_data(&self, cmd: u8) -> Result<u16, BusError> {
        match self.transact(Transaction::ReadWordData(cmd))? {
            Reply::Word(value) => Ok(value),
            _ => Err(self.unexpected("read_word_data")),
        }
    }

    /// Send command `cmd` followed by a data word
    pub fn write_word_data(&self, cmd: u8, value: u16) -> Result<(), BusError> {
        self.done_reply(Transaction::WriteWordData(cmd, value))
    }

    /// Fill `buf` from the device, returns the number of bytes read
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, BusError> {
        self.count_reply(Transaction::Read(buf))
    }

    /// Write all of `buf` to the device, returns the number of bytes written
    pub fn write(&self, buf: &[u8]) -> Result<usize, BusError> {
        self.count_reply(Transaction::Write(buf))
    }

    /// Write `wbuf` then read into `rbuf` without releasing the bus
    pub fn write_read(&self, wbuf: &[u8], rbuf: &mut [u8]) -> Result<usize, BusError> {
        self.count_reply(Transaction::WriteRead(wbuf, rbuf))
    }
}

impl<D: BusDriver> Drop for DeviceHandle<D> {
    fn drop(&mut self) {
        if self.release() {
            debug!(
                "I2C device at 0x{:02X} dropped without close, released",
                self.address
            );
        }
    }
}

impl<D: BusDriver> fmt::Display for DeviceHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record {
            Some(record) if !self.is_closed() => {
                write!(f, "I2C device {}:{:02X}", record.path, self.address)
            }
            _ => write!(f, "I2C device: closed"),
        }
    }
}

impl<D: BusDriver> fmt::Debug for DeviceHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.path())
            .field("address", &self.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}
