use serde::{Deserialize, Serialize};

use crate::payroll::calculator::DeductionConfig;
use crate::payroll::scenarios::ScenarioSettings;

/// Company-level payroll configuration. Every field defaults, so an empty
/// document means "no statutory deductions, every scenario toggle on".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollSettings {
    pub deductions: DeductionConfig,
    pub scenarios: ScenarioSettings,
}
