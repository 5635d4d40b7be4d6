// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent writes to different bits of one register must not lose
//! updates.

#[allow(unused)]
mod mock;

use std::{sync::Arc, thread, time::Duration};

use phi_core::{Driver, DriverConfig, PortConfig, Value};

use mock::{Device, MockTransport};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn concurrent_bit_writes_are_atomic() {
    let _ = env_logger::builder().is_test(true).try_init();

    let driver = Arc::new(Driver::new(
        MockTransport::new(Device::default()),
        DriverConfig::default(),
    ));
    let workers: Vec<_> = (0..16)
        .map(|bit| {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                let port = format!("h10/{bit}");
                for _ in 0..20 {
                    driver
                        .set(&port, Value::Bool(true), &PortConfig::default(), TIMEOUT)
                        .unwrap();
                    // expire the cached word now and then
                    if bit % 4 == 0 {
                        driver.invalidate(&port).unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(driver.transport().device().holding.get(&10), Some(&0xFFFF));
    assert_eq!(
        driver.get("h10", &PortConfig::default(), TIMEOUT).unwrap(),
        Value::Unsigned(0xFFFF)
    );
}

#[test]
fn set_and_clear_bits_concurrently() {
    let mut device = Device::default();
    device.holding.insert(20, 0x00FF);
    let driver = Arc::new(Driver::new(
        MockTransport::new(device),
        DriverConfig::default(),
    ));
    let workers: Vec<_> = (0..16)
        .map(|bit| {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                // swap the low and the high byte
                let value = bit >= 8;
                driver
                    .set(
                        &format!("h20/{bit}"),
                        Value::Bool(value),
                        &PortConfig::default(),
                        TIMEOUT,
                    )
                    .unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(driver.transport().device().holding.get(&20), Some(&0xFF00));
    for bit in 0..16 {
        let expected = u64::from(bit >= 8);
        assert_eq!(
            driver
                .get(&format!("h20/{bit}"), &PortConfig::default(), TIMEOUT)
                .unwrap(),
            Value::Unsigned(expected)
        );
    }
}

#[test]
fn bits_of_wide_registers() {
    let driver = Driver::new(MockTransport::new(Device::default()), DriverConfig::default());
    let cfg = PortConfig::default();

    driver.set("h30:u32/31", Value::Bool(true), &cfg, TIMEOUT).unwrap();
    driver.set("h30:u32/0", Value::Bool(true), &cfg, TIMEOUT).unwrap();

    let device = driver.transport().device();
    assert_eq!(device.holding.get(&30), Some(&0x8000));
    assert_eq!(device.holding.get(&31), Some(&0x0001));
    drop(device);
    assert_eq!(
        driver.get("h30:u32", &cfg, TIMEOUT).unwrap(),
        Value::Unsigned(0x8000_0001)
    );
    assert!(driver.set("h30:u32/32", Value::Bool(true), &cfg, TIMEOUT).is_err());
}

#[test]
fn input_register_bits_are_read_only() {
    let mut device = Device::default();
    device.input.insert(3, 0b100);
    let driver = Driver::new(MockTransport::new(device), DriverConfig::default());
    let cfg = PortConfig::default();

    assert_eq!(driver.get("i3/2", &cfg, TIMEOUT).unwrap(), Value::Unsigned(1));
    assert!(matches!(
        driver.set("i3/2", Value::Bool(false), &cfg, TIMEOUT),
        Err(phi_core::Error::ReadOnly(_))
    ));
}
