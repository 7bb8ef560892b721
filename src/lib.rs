//! sensor-mqtt: publishes environmental and air-quality readings to MQTT
//!
//! A BME280/BMP280 on I2C and, optionally, an Airthings Wave over Bluetooth
//! LE are sampled on a fixed cadence. Each value goes to
//! `<base_topic>/<metric>` as a two-decimal string. Device liveness is
//! announced on `<base_topic>/status` with a retained `online` message and an
//! `offline` last-will.
//!
//! ## Modules
//!
//! * `config`: TOML configuration, discovery and validation.
//! * `core`: collectors, publishers, the hand-off between them, sensor
//!   drivers and shutdown.
//! * `logger`: `tracing` setup for console and journald output.
//! * `cli`: command-line flags.
//!
//! ## Features
//!
//! * `bme280`: I2C driver (default).
//! * `ble`: Bluetooth LE air-quality driver.

pub mod cli;
pub mod config;
pub mod core;
pub mod logger;
