/*
 *  bus/registry.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Bus connection registry - one open connection per bus path,
 *  shared by reference count across device handles
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
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::bus::error::BusError;
use crate::bus::handle::DeviceHandle;
use crate::bus::traits::BusDriver;

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Record and map state is consistent between statements, so a panic inside
/// a driver call never leaves it half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable part of a connection record, guarded by the record lock
pub(crate) struct RecordState<C> {
    /// Open connection token, `None` once closed
    pub(crate) connection: Option<C>,

    /// Number of live handles referencing the record
    pub(crate) refcount: usize,
}

/// One physical bus path and its shared connection
pub(crate) struct ConnectionRecord<C> {
    pub(crate) path: String,

    /// Record lock: serializes refcount changes and all bus traffic
    pub(crate) state: Mutex<RecordState<C>>,
}

impl<C> ConnectionRecord<C> {
    fn new(path: &str, connection: C) -> Self {
        Self {
            path: path.to_string(),
            state: Mutex::new(RecordState {
                connection: Some(connection),
                refcount: 0,
            }),
        }
    }
}

/// State shared between a registry and every handle it issued
pub(crate) struct Shared<D: BusDriver> {
    pub(crate) driver: D,

    /// Structural lock: path -> record map
    pub(crate) records: Mutex<HashMap<String, Arc<ConnectionRecord<D::Connection>>>>,
}

impl<D: BusDriver> Shared<D> {
    /// Drop `record` from the map if it is still the entry for its path and
    /// no handle references it any more.
    pub(crate) fn retire(&self, record: &Arc<ConnectionRecord<D::Connection>>) {
        let mut records = lock(&self.records);
        let idle = match records.get(&record.path) {
            Some(current) => Arc::ptr_eq(current, record) && lock(&record.state).refcount == 0,
            None => false,
        };
        if idle {
            records.remove(&record.path);
            debug!("Removed registry entry for {}", record.path);
        }
    }
}

/// Registry of open I2C buses
///
/// Maps a bus path (e.g. `/dev/i2c-1`) to a single open driver connection
/// and hands out [`DeviceHandle`]s bound to one device address each. Every
/// handle on the same path shares that connection; the connection is opened
/// by the first `open` and closed when the last handle on it is closed.
///
/// The registry is cheap to clone; clones share the same table.
pub struct BusRegistry<D: BusDriver> {
    shared: Arc<Shared<D>>,
}

impl<D: BusDriver> Clone for BusRegistry<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: BusDriver> BusRegistry<D> {
    /// Create an empty registry on top of `driver`
    pub fn new(driver: D) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver,
                records: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The bus driver this registry talks to
    pub fn driver(&self) -> &D {
        &self.shared.driver
    }

    /// Open a handle for the device at `address` on bus `path`
    ///
    /// The bus itself is only opened if no other handle currently uses it.
    ///
    /// # Errors
    ///
    /// * [`BusError::InvalidAddress`] if `address` is above 255
    /// * [`BusError::BusOpen`] if the bus had to be opened and the driver failed;
    ///   the registry is left untouched
    pub fn open(&self, path: &str, address: u16) -> Result<DeviceHandle<D>, BusError> {
        let address = u8::try_from(address).map_err(|_| BusError::InvalidAddress(address))?;
        let driver = &self.shared.driver;

        let mut records = lock(&self.shared.records);
        let record = match records.get(path).cloned() {
            Some(record) => record,
            None => {
                let connection = driver.open(path).map_err(|source| {
                    warn!("Failed to open I2C bus {}: {}", path, source);
                    BusError::BusOpen {
                        path: path.to_string(),
                        source,
                    }
                })?;
                info!("Opened I2C bus {} ({} driver)", path, driver.name());
                let record = Arc::new(ConnectionRecord::new(path, connection));
                records.insert(path.to_string(), Arc::clone(&record));
                record
            }
        };

        // Refcount goes up while the map is still locked so a closer on
        // another thread cannot retire the record underneath us.
        let mut state = lock(&record.state);
        if state.connection.is_none() {
            // Last handle closed the connection but has not removed the
            // record yet; reopen in place.
            match driver.open(path) {
                Ok(connection) => {
                    info!("Reopened I2C bus {} ({} driver)", path, driver.name());
                    state.connection = Some(connection);
                }
                Err(source) => {
                    warn!("Failed to reopen I2C bus {}: {}", path, source);
                    drop(state);
                    records.remove(path);
                    return Err(BusError::BusOpen {
                        path: path.to_string(),
                        source,
                    });
                }
            }
        }
        state.refcount += 1;
        debug!(
            "Opened I2C device {}:{:02X} ({} handle(s) on bus)",
            path, address, state.refcount
        );
        drop(state);
        drop(records);

        Ok(DeviceHandle::new(Arc::clone(&self.shared), record, address))
    }

    /// Close every open bus and invalidate every outstanding handle
    ///
    /// Handles issued before this call fail all further transactions with
    /// [`BusError::HandleClosed`]; closing them is a no-op. A later `open`
    /// starts from a fresh connection.
    pub fn close_all(&self) {
        let mut records = lock(&self.shared.records);
        for (path, record) in records.drain() {
            let mut state = lock(&record.state);
            if state.refcount > 0 {
                debug!("Invalidating {} handle(s) on {}", state.refcount, path);
            }
            state.refcount = 0;
            if let Some(connection) = state.connection.take() {
                self.shared.driver.close(connection);
                info!("Closed I2C bus {}", path);
            }
        }
    }

    /// True if `path` currently has an open connection
    pub fn is_open(&self, path: &str) -> bool {
        let records = lock(&self.shared.records);
        records
            .get(path)
            .is_some_and(|record| lock(&record.state).connection.is_some())
    }

    /// Number of live handles on `path`, or `None` if the registry has no entry
    pub fn ref_count(&self, path: &str) -> Option<usize> {
        let records = lock(&self.shared.records);
        records.get(path).map(|record| lock(&record.state).refcount)
    }

    /// Paths of every bus with a registry entry, sorted
    pub fn open_paths(&self) -> Vec<String> {
        let records = lock(&self.shared.records);
        let mut paths: Vec<String> = records.keys().cloned().collect();
        paths.sort();
        paths
    }
}
