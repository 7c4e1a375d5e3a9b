//! Report sink port trait.

use crate::domain::error::WalkForwardError;
use crate::domain::validation::ValidationReport;
use std::path::Path;

/// Port for writing validation reports.
pub trait ReportPort {
    fn write(
        &self,
        report: &ValidationReport,
        strategy: &str,
        output_path: &Path,
    ) -> Result<(), WalkForwardError>;
}
