/*
 *  bus/drivers/dryrun.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Dry-run bus driver - logs every bus call, touches no hardware
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

use log::info;

use crate::bus::error::DriverError;
use crate::bus::traits::{BusDriver, Reply, Transaction};

/// Driver for bring-up on machines without an I2C adapter
///
/// Opening always succeeds, writes are logged and discarded, reads return
/// zeros. Useful for checking device wiring code and configuration before
/// the hardware is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunDriver;

/// Fake connection; remembers the path for log output
#[derive(Debug)]
pub struct DryRunConnection {
    path: String,
    address: Option<u8>,
}

impl BusDriver for DryRunDriver {
    type Connection = DryRunConnection;

    fn name(&self) -> &'static str {
        "dryrun"
    }

    fn open(&self, path: &str) -> Result<DryRunConnection, DriverError> {
        info!("[dryrun] Opening I2C bus {}", path);
        Ok(DryRunConnection {
            path: path.to_string(),
            address: None,
        })
    }

    fn close(&self, connection: DryRunConnection) {
        info!("[dryrun] Closing I2C bus {}", connection.path);
    }

    fn set_address(&self, connection: &mut DryRunConnection, address: u8) -> Result<(), DriverError> {
        connection.address = Some(address);
        Ok(())
    }

    fn transact(
        &self,
        connection: &mut DryRunConnection,
        transaction: Transaction<'_>,
    ) -> Result<Reply, DriverError> {
        let address = connection.address.ok_or(DriverError::NoAddress)?;
        let target = format!("{}:{:02X}", connection.path, address);

        let reply = match transaction {
            Transaction::ReadByte => {
                info!("[dryrun] {} reading a byte", target);
                Reply::Byte(0)
            }
            Transaction::WriteByte(value) => {
                info!("[dryrun] {} writing a byte {:02X}", target, value);
                Reply::Done
            }
            Transaction::ReadByteData(cmd) => {
                info!("[dryrun] {} reading byte data with command {:02X}", target, cmd);
                Reply::Byte(0)
            }
            Transaction::WriteByteData(cmd, value) => {
                info!("[dryrun] {} writing command {:02X} and byte data {:02X}", target, cmd, value);
                Reply::Done
            }
            Transaction::ReadWordData(cmd) => {
                info!("[dryrun] {} reading word data with command {:02X}", target, cmd);
                Reply::Word(0)
            }
            Transaction::WriteWordData(cmd, value) => {
                info!("[dryrun] {} writing command {:02X} and word data {:04X}", target, cmd, value);
                Reply::Done
            }
            Transaction::Read(buf) => {
                info!("[dryrun] {} reading {} bytes", target, buf.len());
                buf.fill(0);
                Reply::Count(buf.len())
            }
            Transaction::Write(buf) => {
                info!("[dryrun] {} writing {:02X?}", target, buf);
                Reply::Count(buf.len())
            }
            Transaction::WriteRead(wbuf, rbuf) => {
                info!("[dryrun] {} writing {:02X?} then reading {} bytes", target, wbuf, rbuf.len());
                rbuf.fill(0);
                Reply::Count(rbuf.len())
            }
        };

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::registry::BusRegistry;

    #[test]
    fn test_dryrun_reads_zeros() {
        let registry = BusRegistry::new(DryRunDriver);
        let mut handle = registry.open("/dev/i2c-1", 0x60).unwrap();

        assert_eq!(handle.read_byte_data(0x03).unwrap(), 0);
        assert_eq!(handle.read_word_data(0x03).unwrap(), 0);

        let mut buf = [0xAAu8; 4];
        assert_eq!(handle.write_read(&[0x03], &mut buf).unwrap(), 4);
        assert_eq!(buf, [0; 4]);

        handle.write_byte_data(0x01, 0xFF).unwrap();
        handle.close();
        assert!(!registry.is_open("/dev/i2c-1"));
    }
}
