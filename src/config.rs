/*
 *  config.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Layered configuration: defaults, YAML file, command line
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

use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    pub bus: Option<BusConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BusConfig {
    pub driver: Option<DriverKind>,
    pub path: Option<String>,      // e.g. "/dev/i2c-1"
    pub devices: Option<Vec<DeviceConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub name: Option<String>,
    pub address: u16,              // validated to 0..=255
    pub probe_register: Option<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Linux,
    Dryrun,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "lymons-hwbus", about = "LyMonS shared I2C bus probe")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// shortcut for --log-level debug
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long, value_enum)]
    pub driver: Option<DriverKind>,
    /// I2C bus device file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub bus: Option<String>,
    /// probe a single device at this address instead of the configured list
    #[arg(short, long, value_parser = parse_number::<u16>)]
    pub address: Option<u16>,
    /// register read from each device
    #[arg(short, long, value_parser = parse_number::<u8>)]
    pub register: Option<u8>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Accepts decimal or 0x-prefixed hex
fn parse_number<T>(s: &str) -> Result<T, String>
where
    T: TryFrom<u32>,
{
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    }
    .map_err(|e| format!("invalid number {}: {}", s, e))?;
    T::try_from(value).map_err(|_| format!("{} is out of range", s))
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<(Config, Cli), ConfigError> {
    let cli = Cli::parse();
    let cfg = load_with(&cli)?;
    Ok((cfg, cli))
}

/// Build the effective config for already-parsed command line arguments.
pub fn load_with(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/lymons/hwbus.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/lymons/hwbus.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lymons-hwbus.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["hwbus.yaml", "config/hwbus.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    match (&mut dst.bus, src.bus) {
        (None, Some(b)) => dst.bus = Some(b),
        (Some(d), Some(s)) => merge_bus(d, s),
        _ => {}
    }
}

fn merge_bus(dst: &mut BusConfig, src: BusConfig) {
    if src.driver.is_some()  { dst.driver = src.driver; }
    if src.path.is_some()    { dst.path = src.path; }
    if src.devices.is_some() { dst.devices = src.devices; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    if cli.debug { cfg.log_level = Some("debug".to_string()); }

    let any_bus = cli.driver.is_some()
        || cli.bus.is_some()
        || cli.address.is_some()
        || cli.register.is_some();
    if any_bus && cfg.bus.is_none() {
        cfg.bus = Some(BusConfig::default());
    }
    if let Some(bus) = cfg.bus.as_mut() {
        if cli.driver.is_some() { bus.driver = cli.driver; }
        if cli.bus.is_some()    { bus.path = cli.bus.clone(); }
        if let Some(address) = cli.address {
            bus.devices = Some(vec![DeviceConfig {
                name: None,
                address,
                probe_register: cli.register,
            }]);
        } else if let (Some(register), Some(devices)) = (cli.register, bus.devices.as_mut()) {
            for device in devices.iter_mut() {
                device.probe_register = Some(register);
            }
        }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let bus = cfg.bus.as_ref()
        .ok_or_else(|| ConfigError::Validation("no bus configured (use --bus or a config file)".into()))?;
    match bus.path.as_deref() {
        Some(p) if !p.trim().is_empty() => {}
        _ => return Err(ConfigError::Validation("bus path must not be empty".into())),
    }
    let devices = bus.devices.as_deref().unwrap_or_default();
    if devices.is_empty() {
        return Err(ConfigError::Validation("at least one device is required (use --address)".into()));
    }
    for device in devices {
        if device.address > 0xFF {
            return Err(ConfigError::Validation(format!(
                "device address {} must be 0..=255", device.address
            )));
        }
    }
    Ok(())
}

impl Config {
    pub fn driver(&self) -> DriverKind {
        self.bus.as_ref().and_then(|b| b.driver).unwrap_or_default()
    }

    pub fn bus_path(&self) -> &str {
        self.bus.as_ref().and_then(|b| b.path.as_deref()).unwrap_or_default()
    }

    pub fn devices(&self) -> &[DeviceConfig] {
        self.bus.as_ref().and_then(|b| b.devices.as_deref()).unwrap_or_default()
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: warn
bus:
  driver: dryrun
  path: /dev/i2c-1
  devices:
    - name: ms5837
      address: 0x76
      probe_register: 0x03
    - address: 60
"#;

    fn sample() -> Config {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_yaml() {
        let cfg = sample();
        assert_eq!(cfg.log_level(), "warn");
        assert_eq!(cfg.driver(), DriverKind::Dryrun);
        assert_eq!(cfg.bus_path(), "/dev/i2c-1");
        assert_eq!(cfg.devices().len(), 2);
        assert_eq!(cfg.devices()[0].address, 0x76);
        assert_eq!(cfg.devices()[0].probe_register, Some(0x03));
        assert_eq!(cfg.devices()[1].name, None);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut cfg = sample();
        let cli = Cli {
            driver: Some(DriverKind::Linux),
            bus: Some("/dev/i2c-0".to_string()),
            address: Some(0x3C),
            register: Some(0x00),
            debug: true,
            ..Default::default()
        };
        apply_cli_overrides(&mut cfg, &cli);

        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.driver(), DriverKind::Linux);
        assert_eq!(cfg.bus_path(), "/dev/i2c-0");
        assert_eq!(cfg.devices().len(), 1);
        assert_eq!(cfg.devices()[0].address, 0x3C);
        assert_eq!(cfg.devices()[0].probe_register, Some(0x00));
    }

    #[test]
    fn test_register_override_applies_to_all_devices() {
        let mut cfg = sample();
        let cli = Cli { register: Some(0x0F), ..Default::default() };
        apply_cli_overrides(&mut cfg, &cli);
        assert!(cfg.devices().iter().all(|d| d.probe_register == Some(0x0F)));
    }

    #[test]
    fn test_cli_only_config() {
        let mut cfg = Config::default();
        let cli = Cli {
            bus: Some("/dev/i2c-1".to_string()),
            address: Some(0x60),
            ..Default::default()
        };
        apply_cli_overrides(&mut cfg, &cli);
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.driver(), DriverKind::Linux);
        assert_eq!(cfg.log_level(), "info");
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut cfg = sample();
        let overlay: Config = serde_yaml::from_str("bus:\n  path: /dev/i2c-3\n").unwrap();
        merge(&mut cfg, overlay);
        assert_eq!(cfg.bus_path(), "/dev/i2c-3");
        assert_eq!(cfg.driver(), DriverKind::Dryrun);
        assert_eq!(cfg.devices().len(), 2);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(validate(&Config::default()), Err(ConfigError::Validation(_))));

        let mut cfg = sample();
        cfg.bus.as_mut().unwrap().devices.as_mut().unwrap()[1].address = 0x100;
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));

        let mut cfg = sample();
        cfg.bus.as_mut().unwrap().path = Some("  ".to_string());
        assert!(validate(&cfg).is_err());

        let mut cfg = sample();
        cfg.bus.as_mut().unwrap().devices = Some(Vec::new());
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<u16>("0x3C"), Ok(0x3C));
        assert_eq!(parse_number::<u16>("60"), Ok(60));
        assert_eq!(parse_number::<u8>("0x1FF"), Err("0x1FF is out of range".to_string()));
        assert!(parse_number::<u8>("zz").is_err());
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/lymons/hwbus.yaml")),
            ..Default::default()
        };
        assert!(matches!(load_with(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("lymons-hwbus-{}.yaml", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();
        let cli = Cli {
            config: Some(path.clone()),
            address: Some(0x44),
            ..Default::default()
        };
        let cfg = load_with(&cli).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(cfg.driver(), DriverKind::Dryrun);
        assert_eq!(cfg.devices().len(), 1);
        assert_eq!(cfg.devices()[0].address, 0x44);
    }
}
