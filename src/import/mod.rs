//! Bulk import of units, attendants and monthly metrics keyed by natural keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod files;
pub mod records;
pub mod resolver;
pub mod validate;

pub use resolver::BulkImporter;

/// Import categories, in the order they must be processed: later categories
/// reference entities written by earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Category {
    #[value(name = "unidades")]
    Units,
    #[value(name = "atendentes")]
    Attendants,
    #[value(name = "metricas_unidades")]
    UnitMetrics,
    #[value(name = "metricas_atendentes")]
    AttendantMetrics,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Units,
        Category::Attendants,
        Category::UnitMetrics,
        Category::AttendantMetrics,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Category::Units => "unidades",
            Category::Attendants => "atendentes",
            Category::UnitMetrics => "metricas_unidades",
            Category::AttendantMetrics => "metricas_atendentes",
        }
    }
}

/// Request body of a bulk import. Each category stays untyped until it is
/// processed, so a malformed category only fails itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBatch {
    #[serde(rename = "unidades", default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Value>,
    #[serde(rename = "atendentes", default, skip_serializing_if = "Option::is_none")]
    pub attendants: Option<Value>,
    #[serde(rename = "metricas_unidades", default, skip_serializing_if = "Option::is_none")]
    pub unit_metrics: Option<Value>,
    #[serde(rename = "metricas_atendentes", default, skip_serializing_if = "Option::is_none")]
    pub attendant_metrics: Option<Value>,
}

impl ImportBatch {
    fn slot(&self, category: Category) -> Option<&Value> {
        match category {
            Category::Units => self.units.as_ref(),
            Category::Attendants => self.attendants.as_ref(),
            Category::UnitMetrics => self.unit_metrics.as_ref(),
            Category::AttendantMetrics => self.attendant_metrics.as_ref(),
        }
    }

    /// Rows of one category. Absent and `null` categories are empty; any other
    /// non-array value is an error for that category alone.
    pub fn rows(&self, category: Category) -> std::result::Result<&[Value], String> {
        match self.slot(category) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(rows)) => Ok(rows),
            Some(_) => Err(format!("{}: expected an array", category.key())),
        }
    }

    pub fn set_rows(&mut self, category: Category, rows: Vec<Value>) {
        let slot = match category {
            Category::Units => &mut self.units,
            Category::Attendants => &mut self.attendants,
            Category::UnitMetrics => &mut self.unit_metrics,
            Category::AttendantMetrics => &mut self.attendant_metrics,
        };
        *slot = Some(Value::Array(rows));
    }

    pub fn total_rows(&self) -> usize {
        Category::ALL
            .iter()
            .filter_map(|c| self.rows(*c).ok())
            .map(<[Value]>::len)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub success: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    #[serde(rename = "unidades")]
    pub units: CategoryResult,
    #[serde(rename = "atendentes")]
    pub attendants: CategoryResult,
    #[serde(rename = "metricas_unidades")]
    pub unit_metrics: CategoryResult,
    #[serde(rename = "metricas_atendentes")]
    pub attendant_metrics: CategoryResult,
}

impl ImportReport {
    pub fn get(&self, category: Category) -> &CategoryResult {
        match category {
            Category::Units => &self.units,
            Category::Attendants => &self.attendants,
            Category::UnitMetrics => &self.unit_metrics,
            Category::AttendantMetrics => &self.attendant_metrics,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut CategoryResult {
        match category {
            Category::Units => &mut self.units,
            Category::Attendants => &mut self.attendants,
            Category::UnitMetrics => &mut self.unit_metrics,
            Category::AttendantMetrics => &mut self.attendant_metrics,
        }
    }

    pub fn has_errors(&self) -> bool {
        Category::ALL.iter().any(|c| !self.get(*c).errors.is_empty())
    }

    pub fn total_success(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).success).sum()
    }
}

/// Response body of the bulk import endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub results: ImportReport,
}

impl From<ImportReport> for ImportResponse {
    fn from(results: ImportReport) -> Self {
        let written = results.total_success();
        let success = !results.has_errors();
        let message = if success {
            format!("Import finished: {written} records written")
        } else {
            format!("Import finished with errors: {written} records written")
        };
        Self {
            success,
            message,
            results,
        }
    }
}

impl ImportResponse {
    /// Response for a body that could not be read at all; every category is reported empty.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            results: ImportReport::default(),
        }
    }
}
