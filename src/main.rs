/*
 *  main.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Bus probe: open every configured device on a shared bus, print it,
 *  read its probe register, close everything again
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

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};

use lymons_hwbus::bus::{BusDriver, BusRegistry, DeviceHandle, DryRunDriver};
use lymons_hwbus::config::{self, Config, DeviceConfig, DriverKind};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

fn main() -> Result<()> {
    let (cfg, cli) = config::load().context("loading configuration")?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {} (drivers: {})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUS_DRIVERS);

    match cfg.driver() {
        DriverKind::Dryrun => run(BusRegistry::new(DryRunDriver), &cfg),
        #[cfg(feature = "driver-linux")]
        DriverKind::Linux => run(BusRegistry::new(lymons_hwbus::bus::LinuxDriver), &cfg),
        #[cfg(not(feature = "driver-linux"))]
        DriverKind::Linux => anyhow::bail!(
            "Linux I2C driver not enabled. Enable with --features driver-linux"
        ),
    }
}

/// Probe every device, then tear the registry down whatever happened
fn run<D: BusDriver>(registry: BusRegistry<D>, cfg: &Config) -> Result<()> {
    let result = probe(&registry, cfg);
    if let Err(e) = &result {
        error!("Probe failed: {:#}", e);
    }
    registry.close_all();
    result
}

fn probe<D: BusDriver>(registry: &BusRegistry<D>, cfg: &Config) -> Result<()> {
    let path = cfg.bus_path();
    info!("Probing {} device(s) on {} ({} driver)", cfg.devices().len(), path, registry.driver().name());

    let mut handles: Vec<(&DeviceConfig, DeviceHandle<D>)> = Vec::new();
    for device in cfg.devices() {
        let handle = registry
            .open(path, device.address)
            .with_context(|| format!("opening device 0x{:02X} on {}", device.address, path))?;
        handles.push((device, handle));
    }

    for (device, handle) in &handles {
        let name = device.name.as_deref().unwrap_or("device");
        println!("{}: {}", name, handle);

        if let Some(register) = device.probe_register {
            let value = handle
                .read_byte_data(register)
                .with_context(|| format!("reading register 0x{:02X} of {}", register, handle))?;
            println!("{} register 0x{:02X} = 0x{:04X}", name, register, value);
        }
    }

    for (_, mut handle) in handles {
        handle.close();
    }
    info!("All devices closed, {} bus(es) still open", registry.open_paths().len());

    Ok(())
}
