/*
 *  bus/drivers/linux.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Linux userspace I2C driver (i2c-dev) via linux-embedded-hal
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

use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use log::debug;

use crate::bus::error::DriverError;
use crate::bus::traits::{BusDriver, Reply, Transaction};

/// Bus driver for `/dev/i2c-N` character devices
///
/// SMBus style operations are issued as plain I2C transfers; word data is
/// little-endian on the wire as SMBus specifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxDriver;

/// Open i2c-dev file plus the currently selected device address
pub struct LinuxConnection {
    dev: I2cdev,
    address: Option<u8>,
}

impl BusDriver for LinuxDriver {
    type Connection = LinuxConnection;

    fn name(&self) -> &'static str {
        "linux"
    }

    fn open(&self, path: &str) -> Result<LinuxConnection, DriverError> {
        // i2c-dev open failures are plain OS errors (ENOENT, EACCES, ...)
        let dev = I2cdev::new(path).map_err(std::io::Error::from)?;
        Ok(LinuxConnection { dev, address: None })
    }

    fn close(&self, connection: LinuxConnection) {
        // the file descriptor is closed when I2cdev drops
        drop(connection.dev);
    }

    fn set_address(&self, connection: &mut LinuxConnection, address: u8) -> Result<(), DriverError> {
        if address > 0x7F {
            debug!("Address 0x{:02X} is outside the 7-bit range", address);
        }
        connection.address = Some(address);
        Ok(())
    }

    fn transact(
        &self,
        connection: &mut LinuxConnection,
        transaction: Transaction<'_>,
    ) -> Result<Reply, DriverError> {
        let address = connection.address.ok_or(DriverError::NoAddress)?;
        let dev = &mut connection.dev;

        let reply = match transaction {
            Transaction::ReadByte => {
                let mut byte = [0u8; 1];
                dev.read(address, &mut byte)?;
                Reply::Byte(byte[0])
            }
            Transaction::WriteByte(value) => {
                dev.write(address, &[value])?;
                Reply::Done
            }
            Transaction::ReadByteData(cmd) => {
                let mut byte = [0u8; 1];
                dev.write_read(address, &[cmd], &mut byte)?;
                Reply::Byte(byte[0])
            }
            Transaction::WriteByteData(cmd, value) => {
                dev.write(address, &[cmd, value])?;
                Reply::Done
            }
            Transaction::ReadWordData(cmd) => {
                let mut word = [0u8; 2];
                dev.write_read(address, &[cmd], &mut word)?;
                Reply::Word(u16::from_le_bytes(word))
            }
            Transaction::WriteWordData(cmd, value) => {
                let [lo, hi] = value.to_le_bytes();
                dev.write(address, &[cmd, lo, hi])?;
                Reply::Done
            }
            Transaction::Read(buf) => {
                dev.read(address, buf)?;
                Reply::Count(buf.len())
            }
            Transaction::Write(buf) => {
                dev.write(address, buf)?;
                Reply::Count(buf.len())
            }
            Transaction::WriteRead(wbuf, rbuf) => {
                dev.write_read(address, wbuf, rbuf)?;
                Reply::Count(rbuf.len())
            }
        };

        Ok(reply)
    }
}
