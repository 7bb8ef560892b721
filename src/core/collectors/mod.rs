//! Per-sensor sampling.
//!
//! A [`collector::Collector`] drives one [`traits::DataProducer`] on a fixed
//! cadence. Producers wrap a sensor driver and turn its raw output into a
//! snapshot.

pub mod air_quality;
pub mod collector;
pub mod environment;
pub mod error;
pub mod traits;

pub use air_quality::AirQualityProducer;
pub use collector::Collector;
pub use environment::EnvironmentProducer;
pub use error::CollectorError;
pub use traits::{CollectorResult, DataProducer};
