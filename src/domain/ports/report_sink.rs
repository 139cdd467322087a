use async_trait::async_trait;

use crate::domain::errors::PersistenceError;
use crate::domain::models::SyncReport;

/// Port for a destination that stores the final report.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Write the report. Failures are surfaced, never swallowed.
    async fn persist(&self, report: &SyncReport) -> Result<(), PersistenceError>;
}
