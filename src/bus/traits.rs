/*
 *  bus/traits.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Bus driver abstraction and transaction descriptors
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

use crate::bus::error::DriverError;

/// A single bus operation, executed against the currently selected address
#[derive(Debug)]
pub enum Transaction<'a> {
    /// Read one byte without selecting a register
    ReadByte,

    /// Write one byte without selecting a register
    WriteByte(u8),

    /// Select register `cmd` and read one byte
    ReadByteData(u8),

    /// Select register `cmd` and write one byte
    WriteByteData(u8, u8),

    /// Select register `cmd` and read a 16-bit word
    ReadWordData(u8),

    /// Select register `cmd` and write a 16-bit word
    WriteWordData(u8, u16),

    /// Bulk read filling the whole buffer
    Read(&'a mut [u8]),

    /// Bulk write of the whole buffer
    Write(&'a [u8]),

    /// Write then read with a repeated start
    WriteRead(&'a [u8], &'a mut [u8]),
}

impl Transaction<'_> {
    /// Short name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Transaction::ReadByte => "read_byte",
            Transaction::WriteByte(_) => "write_byte",
            Transaction::ReadByteData(_) => "read_byte_data",
            Transaction::WriteByteData(..) => "write_byte_data",
            Transaction::ReadWordData(_) => "read_word_data",
            Transaction::WriteWordData(..) => "write_word_data",
            Transaction::Read(_) => "read",
            Transaction::Write(_) => "write",
            Transaction::WriteRead(..) => "write_read",
        }
    }
}

/// Result of a transaction as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// A single data byte
    Byte(u8),

    /// A 16-bit data word
    Word(u16),

    /// Number of bytes transferred by a bulk operation
    Count(usize),

    /// Write completed, nothing to return
    Done,
}

/// Low-level bus driver - everything the registry needs from the hardware
///
/// A driver hands out opaque connection tokens for a bus path. The registry
/// guarantees that at most one token per path is open at a time, that
/// `set_address` immediately precedes every `transact` on the same token with
/// no other call in between, and that every token is passed back to `close`
/// exactly once.
pub trait BusDriver: Send + Sync {
    /// Open connection to a bus (e.g. a file descriptor on `/dev/i2c-1`)
    type Connection: Send;

    /// Driver name for logs
    fn name(&self) -> &'static str;

    /// Open the bus at `path`
    fn open(&self, path: &str) -> Result<Self::Connection, DriverError>;

    /// Close a connection; the token is consumed
    fn close(&self, connection: Self::Connection);

    /// Select the target device for the following transaction
    fn set_address(
        &self,
        connection: &mut Self::Connection,
        address: u8,
    ) -> Result<(), DriverError>;

    /// Execute one transaction against the selected device
    fn transact(
        &self,
        connection: &mut Self::Connection,
        transaction: Transaction<'_>,
    ) -> Result<Reply, DriverError>;
}
