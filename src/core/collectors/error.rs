use std::time::Duration;

use thiserror::Error;

use crate::core::{drivers::DriverError, handoff::HandoffError};

/// Errors raised while sampling or relaying a sensor.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The paired publisher stopped taking snapshots.
    #[error("Publisher hand-off failed: {0}")]
    Handoff(#[from] HandoffError),

    #[error("{sensor} sample exceeded {after:?}")]
    Timeout { sensor: String, after: Duration },

    /// A previous sample is still stuck inside the driver.
    #[error("{0} is still busy with a previous sample")]
    SensorBusy(String),

    #[error("{0} driver state is poisoned")]
    SensorPoisoned(String),

    #[error("Task failed: {0}")]
    Task(String),
}

impl CollectorError {
    /// Fatal errors end the collector and, with it, the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            CollectorError::Driver(e) => e.is_fatal(),
            CollectorError::Timeout { .. } | CollectorError::SensorBusy(_) => false,
            CollectorError::Handoff(_)
            | CollectorError::SensorPoisoned(_)
            | CollectorError::Task(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_classification_passes_through() {
        assert!(CollectorError::from(DriverError::Read("bus".into())).is_fatal());
        assert!(!CollectorError::from(DriverError::Timeout(Duration::from_secs(1))).is_fatal());
    }

    #[test]
    fn test_own_classification() {
        assert!(CollectorError::from(HandoffError::Closed).is_fatal());
        assert!(!CollectorError::Timeout {
            sensor: "BME280".into(),
            after: Duration::from_secs(10)
        }
        .is_fatal());
        assert!(!CollectorError::SensorBusy("BME280".into()).is_fatal());
    }
}
