use super::error::CollectorError;
use crate::core::snapshot::Snapshot;

pub type CollectorResult<T> = Result<T, CollectorError>;

/// Produces one snapshot per call.
///
/// Owned by exactly one collector task, so `produce` takes `&mut self` and
/// implementations keep per-sensor state without locking.
#[async_trait::async_trait]
pub trait DataProducer: Send + 'static {
    type Output: Snapshot;

    /// Sensor kind, used in logs.
    fn name(&self) -> &str;

    /// Samples the sensor once.
    ///
    /// Errors for which [`CollectorError::is_fatal`] is false skip this sample.
    async fn produce(&mut self) -> CollectorResult<Self::Output>;
}
