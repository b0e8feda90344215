/*
 *  bus/drivers/mock.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock bus driver for testing without hardware
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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::bus::error::DriverError;
use crate::bus::registry::lock;
use crate::bus::traits::{BusDriver, Reply, Transaction};

/// Mock bus driver for testing
///
/// This driver simulates an I2C bus without requiring hardware. Every device
/// address behaves like a simple register file with an auto-incrementing
/// register pointer, which is enough to exercise every transaction type.
///
/// All driver calls are recorded in the shared [`MockDriverState`] so tests
/// can verify how many connections were opened and in which order addresses
/// were selected and transactions issued.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockDriverState>>,
}

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Bus opened and assigned `token`
    Open { token: u32, path: String },

    /// Connection closed
    Close { token: u32 },

    /// Target address selected
    SetAddress { token: u32, address: u8 },

    /// Transaction executed while `address` was selected
    Transact {
        token: u32,
        address: u8,
        op: &'static str,
    },
}

/// Internal state for the mock driver (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockDriverState {
    /// Number of times open() succeeded
    pub open_count: usize,

    /// Number of times close() was called
    pub close_count: usize,

    /// Number of transactions executed
    pub transaction_count: usize,

    /// Every driver call, in order
    pub events: Vec<MockEvent>,

    /// Simulate failures (for error testing)
    pub simulate_open_failure: bool,
    pub simulate_address_failure: bool,
    pub simulate_transaction_failure: bool,

    /// Register contents keyed by (device address, register)
    registers: HashMap<(u8, u8), u8>,

    /// Register pointer per device address
    pointers: HashMap<u8, u8>,

    next_token: u32,
}

impl MockDriverState {
    fn reg(&self, address: u8, register: u8) -> u8 {
        self.registers.get(&(address, register)).copied().unwrap_or(0)
    }

    /// Read one byte at the device's register pointer and advance it
    fn next_byte(&mut self, address: u8) -> u8 {
        let pointer = self.pointers.entry(address).or_insert(0);
        let register = *pointer;
        *pointer = pointer.wrapping_add(1);
        self.reg(address, register)
    }

    /// Treat `data` as a register pointer followed by values to store
    fn store(&mut self, address: u8, data: &[u8]) {
        let Some((&start, values)) = data.split_first() else {
            return;
        };
        let mut register = start;
        for &value in values {
            self.registers.insert((address, register), value);
            register = register.wrapping_add(1);
        }
        self.pointers.insert(address, start);
    }

    fn load(&mut self, address: u8, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.next_byte(address);
        }
    }
}

/// Connection token handed out by the mock driver
#[derive(Debug)]
pub struct MockConnection {
    token: u32,
    address: Option<u8>,
}

impl MockConnection {
    /// Token number assigned at open
    pub fn token(&self) -> u32 {
        self.token
    }
}

impl MockDriver {
    /// Create a new mock driver with empty register files
    pub fn new() -> Self {
        Self::default()
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockDriverState>> {
        Arc::clone(&self.state)
    }

    /// Preload a register on the device at `address`
    pub fn set_register(&self, address: u8, register: u8, value: u8) {
        lock(&self.state).registers.insert((address, register), value);
    }

    /// Current register content, `None` if never written
    pub fn register(&self, address: u8, register: u8) -> Option<u8> {
        lock(&self.state).registers.get(&(address, register)).copied()
    }
}

impl BusDriver for MockDriver {
    type Connection = MockConnection;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&self, path: &str) -> Result<MockConnection, DriverError> {
        let mut state = lock(&self.state);

        if state.simulate_open_failure {
            return Err(DriverError::Simulated(format!("cannot open {}", path)));
        }

        state.next_token += 1;
        let token = state.next_token;
        state.open_count += 1;
        state.events.push(MockEvent::Open {
            token,
            path: path.to_string(),
        });

        Ok(MockConnection {
            token,
            address: None,
        })
    }

    fn close(&self, connection: MockConnection) {
        let mut state = lock(&self.state);
        state.close_count += 1;
        state.events.push(MockEvent::Close {
            token: connection.token,
        });
    }

    fn set_address(&self, connection: &mut MockConnection, address: u8) -> Result<(), DriverError> {
        {
            let mut state = lock(&self.state);
            if state.simulate_address_failure {
                return Err(DriverError::Simulated(format!(
                    "no ack from 0x{:02X}",
                    address
                )));
            }
            state.events.push(MockEvent::SetAddress {
                token: connection.token,
                address,
            });
        }
        connection.address = Some(address);

        // widen the window between select and transfer so races would show
        std::thread::yield_now();
        Ok(())
    }

    fn transact(
        &self,
        connection: &mut MockConnection,
        transaction: Transaction<'_>,
    ) -> Result<Reply, DriverError> {
        let address = connection.address.ok_or(DriverError::NoAddress)?;
        let mut state = lock(&self.state);

        if state.simulate_transaction_failure {
            return Err(DriverError::Simulated(format!(
                "{} at 0x{:02X} timed out",
                transaction.name(),
                address
            )));
        }

        state.transaction_count += 1;
        state.events.push(MockEvent::Transact {
            token: connection.token,
            address,
            op: transaction.name(),
        });

        let reply = match transaction {
            Transaction::ReadByte => Reply::Byte(state.next_byte(address)),
            Transaction::WriteByte(value) => {
                state.pointers.insert(address, value);
                Reply::Done
            }
            Transaction::ReadByteData(cmd) => Reply::Byte(state.reg(address, cmd)),
            Transaction::WriteByteData(cmd, value) => {
                state.store(address, &[cmd, value]);
                Reply::Done
            }
            Transaction::ReadWordData(cmd) => {
                let lo = state.reg(address, cmd);
                let hi = state.reg(address, cmd.wrapping_add(1));
                Reply::Word(u16::from_le_bytes([lo, hi]))
            }
            Transaction::WriteWordData(cmd, value) => {
                let [lo, hi] = value.to_le_bytes();
                state.store(address, &[cmd, lo, hi]);
                Reply::Done
            }
            Transaction::Read(buf) => {
                state.load(address, buf);
                Reply::Count(buf.len())
            }
            Transaction::Write(buf) => {
                state.store(address, buf);
                Reply::Count(buf.len())
            }
            Transaction::WriteRead(wbuf, rbuf) => {
                state.store(address, wbuf);
                state.load(address, rbuf);
                Reply::Count(rbuf.len())
            }
        };

        Ok(reply)
    }
}
