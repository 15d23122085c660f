use payroll_core::settings::PayrollSettings;
use tracing::debug;

use super::file;

/// Company settings from `--config`, or all defaults when none is given.
pub fn load_settings(path: Option<&str>) -> Result<PayrollSettings, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let settings: PayrollSettings = file::read_document(path)?;
            debug!(
                path,
                statutory = %settings.deductions.total(),
                calendars = settings.scenarios.calendar_overrides.len(),
                "payroll settings loaded"
            );
            Ok(settings)
        }
        None => Ok(PayrollSettings::default()),
    }
}
