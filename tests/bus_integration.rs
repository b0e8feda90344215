/*
 *  tests/bus_integration.rs
 *
 *  Integration tests for the shared I2C bus layer
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

use std::sync::{Arc, Barrier};
use std::thread;

use lymons_hwbus::bus::{BusError, BusRegistry, MockDriver, MockEvent};
use lymons_hwbus::word::{bytes_to_word, word_to_bytes};

#[test]
fn test_two_devices_one_bus_scenario() {
    let registry = BusRegistry::new(MockDriver::new());
    let state = registry.driver().state();
    registry.driver().set_register(0x60, 0x03, 0x42);

    let mut a = registry.open("bus0", 0x60).unwrap();
    assert_eq!(state.lock().unwrap().open_count, 1);
    assert_eq!(registry.ref_count("bus0"), Some(1));

    let mut b = registry.open("bus0", 0x44).unwrap();
    assert_eq!(state.lock().unwrap().open_count, 1);
    assert_eq!(registry.ref_count("bus0"), Some(2));

    assert_eq!(a.read_byte_data(0x03).unwrap(), 0x42);
    {
        let s = state.lock().unwrap();
        let n = s.events.len();
        let token = match &s.events[0] {
            MockEvent::Open { token, .. } => *token,
            other => panic!("expected open, got {:?}", other),
        };
        assert_eq!(s.events[n - 2], MockEvent::SetAddress { token, address: 0x60 });
        assert_eq!(
            s.events[n - 1],
            MockEvent::Transact { token, address: 0x60, op: "read_byte_data" }
        );
    }

    b.close();
    assert_eq!(registry.ref_count("bus0"), Some(1));
    assert!(registry.is_open("bus0"));
    assert_eq!(state.lock().unwrap().close_count, 0);

    a.close();
    assert_eq!(state.lock().unwrap().close_count, 1);
    assert_eq!(registry.ref_count("bus0"), None);
    assert!(registry.open_paths().is_empty());
}

#[test]
fn test_concurrent_opens_share_one_connection() {
    const THREADS: usize = 16;

    let registry = BusRegistry::new(MockDriver::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.open("/dev/i2c-1", 0x10 + i as u16).unwrap()
            })
        })
        .collect();
    let mut handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(registry.driver().state().lock().unwrap().open_count, 1);
    assert_eq!(registry.ref_count("/dev/i2c-1"), Some(THREADS));

    for handle in handles.iter_mut() {
        handle.close();
    }
    assert_eq!(registry.driver().state().lock().unwrap().close_count, 1);
    assert!(registry.open_paths().is_empty());
}

#[test]
fn test_transactions_never_hit_wrong_address() {
    const DEVICES: u8 = 8;
    const ROUNDS: usize = 200;

    let registry = BusRegistry::new(MockDriver::new());
    let barrier = Arc::new(Barrier::new(DEVICES as usize));

    let workers: Vec<_> = (0..DEVICES)
        .map(|i| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let address = 0x20 + i;
                let mut handle = registry.open("bus0", u16::from(address)).unwrap();
                barrier.wait();
                for round in 0..ROUNDS {
                    // each device writes its own address into register 0
                    handle.write_byte_data(0x00, address).unwrap();
                    assert_eq!(handle.read_byte_data(0x00).unwrap(), address);
                    if round % 50 == 0 {
                        thread::yield_now();
                    }
                }
                handle.close();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let state = registry.driver().state();
    let state = state.lock().unwrap();
    assert_eq!(state.transaction_count, DEVICES as usize * ROUNDS * 2);

    // every transfer directly follows a select of the same address
    let mut selected = None;
    for event in &state.events {
        match event {
            MockEvent::SetAddress { address, .. } => {
                assert!(selected.is_none(), "two selects without a transfer in between");
                selected = Some(*address);
            }
            MockEvent::Transact { address, .. } => {
                assert_eq!(selected.take(), Some(*address));
            }
            _ => {}
        }
    }
    assert_eq!(state.close_count, 1);
}

#[test]
fn test_open_close_churn_keeps_single_connection() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 100;

    let registry = BusRegistry::new(MockDriver::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let mut handle = registry.open("bus0", 0x30 + i as u16).unwrap();
                    handle.write_byte(0x01).unwrap();
                    handle.close();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let state = registry.driver().state();
    let state = state.lock().unwrap();
    assert_eq!(state.open_count, state.close_count);

    // never two connections open at the same time
    let mut open = 0i32;
    for event in &state.events {
        match event {
            MockEvent::Open { .. } => {
                open += 1;
                assert_eq!(open, 1);
            }
            MockEvent::Close { .. } => open -= 1,
            _ => {}
        }
    }
    assert_eq!(open, 0);
    drop(state);
    assert!(registry.open_paths().is_empty());
}

#[test]
fn test_close_all_invalidates_handles_then_reopens() {
    let registry = BusRegistry::new(MockDriver::new());
    let state = registry.driver().state();

    let a = registry.open("bus0", 0x60).unwrap();
    let b = registry.open("bus0", 0x44).unwrap();
    let c = registry.open("bus1", 0x10).unwrap();

    registry.close_all();
    assert_eq!(state.lock().unwrap().close_count, 2);

    for handle in [&a, &b, &c] {
        assert!(matches!(handle.read_byte(), Err(BusError::HandleClosed)));
        assert!(matches!(handle.write_word_data(0, 1), Err(BusError::HandleClosed)));
        assert_eq!(handle.describe(), "I2C device: closed");
    }
    assert_eq!(state.lock().unwrap().transaction_count, 0);

    let mut fresh = registry.open("bus0", 0x60).unwrap();
    assert_eq!(state.lock().unwrap().open_count, 3);
    assert!(fresh.read_byte().is_ok());

    // stale handles going away must not close the fresh connection
    drop(a);
    drop(b);
    drop(c);
    assert!(registry.is_open("bus0"));
    assert_eq!(registry.ref_count("bus0"), Some(1));

    fresh.close();
    assert!(!registry.is_open("bus0"));
}

#[test]
fn test_handles_usable_from_other_threads() {
    let registry = BusRegistry::new(MockDriver::new());
    registry.driver().set_register(0x76, 0xD0, 0x58);

    let handle = Arc::new(registry.open("bus0", 0x76).unwrap());
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || handle.read_byte_data(0xD0).unwrap())
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), 0x58);
    }

    drop(handle);
    assert!(registry.open_paths().is_empty());
}

#[test]
fn test_word_helpers_with_bulk_read() {
    let registry = BusRegistry::new(MockDriver::new());
    let mut handle = registry.open("bus0", 0x40).unwrap();

    let bytes = word_to_bytes(0x1234).unwrap();
    handle.write(&[0x02, bytes[0], bytes[1]]).unwrap();

    let mut buf = [0u8; 2];
    handle.write_read(&[0x02], &mut buf).unwrap();
    assert_eq!(bytes_to_word(&buf).unwrap(), 0x1234);

    assert!(bytes_to_word(&buf[..1]).is_err());
    assert!(word_to_bytes(70000).is_err());
    handle.close();
}
