use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::records::{AttendantMetricRow, AttendantRow, CategoryRecords, UnitMetricRow, UnitRow};
use super::{Category, ImportBatch, ImportReport};
use crate::error::Result;
use crate::metrics;
use crate::store::{
    ImportSink, NewAttendant, NewAttendantMetric, NewUnit, NewUnitMetric, ReferenceKind,
    ReferenceResolver,
};

/// Resolves natural keys against stored reference data and upserts each category.
///
/// Categories run one after another in [`Category::ALL`] order and fail
/// independently: validation problems are itemized, a store error becomes a
/// single message, and rows whose references do not resolve are skipped
/// without a message (they only lower the success count).
pub struct BulkImporter<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> BulkImporter<'a, S>
where
    S: ReferenceResolver + ImportSink + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn run(&self, batch: &ImportBatch) -> ImportReport {
        let mut report = ImportReport::default();

        for category in Category::ALL {
            let result = report.get_mut(category);
            let values = match batch.rows(category) {
                Ok(values) if values.is_empty() => continue,
                Ok(values) => values,
                Err(error) => {
                    warn!(category = category.key(), "category is not an array");
                    result.errors.push(error);
                    continue;
                }
            };

            let records = match CategoryRecords::parse(category, values) {
                Ok(records) => records,
                Err(errors) => {
                    warn!(category = category.key(), problems = errors.len(), "import rejected by validation");
                    result.errors = errors;
                    continue;
                }
            };

            match self.apply(records).await {
                Ok(written) => {
                    info!(category = category.key(), submitted = values.len(), written, "category imported");
                    result.success = written;
                }
                Err(err) => {
                    warn!(category = category.key(), error = %err, "category import failed");
                    result.errors.push(err.to_string());
                }
            }
        }

        report
    }

    async fn apply(&self, records: CategoryRecords) -> Result<usize> {
        match records {
            CategoryRecords::Units(rows) => self.import_units(rows).await,
            CategoryRecords::Attendants(rows) => self.import_attendants(rows).await,
            CategoryRecords::UnitMetrics(rows) => self.import_unit_metrics(rows).await,
            CategoryRecords::AttendantMetrics(rows) => self.import_attendant_metrics(rows).await,
        }
    }

    async fn import_units(&self, rows: Vec<UnitRow>) -> Result<usize> {
        let units: Vec<NewUnit> = rows
            .into_iter()
            .map(|row| NewUnit {
                name: row.name,
                code: row.code,
                active: row.active.unwrap_or(true),
            })
            .collect();
        self.store.upsert_units(&units).await
    }

    async fn import_attendants(&self, rows: Vec<AttendantRow>) -> Result<usize> {
        let unit_ids = self
            .resolve(ReferenceKind::Unit, rows.iter().map(|r| r.unit_code.as_str()))
            .await?;

        let attendants: Vec<NewAttendant> = rows
            .into_iter()
            .filter_map(|row| {
                let unit_id = *unit_ids.get(&row.unit_code)?;
                Some(NewAttendant {
                    name: row.name,
                    email: row.email,
                    unit_id,
                    active: row.active.unwrap_or(true),
                })
            })
            .collect();
        if attendants.is_empty() {
            return Ok(0);
        }
        self.store.upsert_attendants(&attendants).await
    }

    async fn import_unit_metrics(&self, rows: Vec<UnitMetricRow>) -> Result<usize> {
        let unit_ids = self
            .resolve(ReferenceKind::Unit, rows.iter().map(|r| r.unit_code.as_str()))
            .await?;

        let normalized: Vec<NewUnitMetric> = rows
            .into_iter()
            .filter_map(|row| {
                let unit_id = *unit_ids.get(&row.unit_code)?;
                Some(NewUnitMetric {
                    period: row.period,
                    unit_id,
                    total_revenue: row.total_revenue.unwrap_or_default(),
                    patients_served: row.patients_served.unwrap_or_default(),
                    exams_sold: row.exams_sold.unwrap_or_default(),
                    nps_score: row.nps_score.map(|score| score as i32),
                })
            })
            .collect();
        if normalized.is_empty() {
            return Ok(0);
        }
        self.store.upsert_unit_metrics(&normalized).await
    }

    async fn import_attendant_metrics(&self, rows: Vec<AttendantMetricRow>) -> Result<usize> {
        let unit_ids = self
            .resolve(ReferenceKind::Unit, rows.iter().map(|r| r.unit_code.as_str()))
            .await?;
        let attendant_ids = self
            .resolve(
                ReferenceKind::Attendant,
                rows.iter().map(|r| r.attendant_email.as_str()),
            )
            .await?;

        let normalized: Vec<NewAttendantMetric> = rows
            .into_iter()
            .filter_map(|row| {
                let unit_id = *unit_ids.get(&row.unit_code)?;
                let attendant_id = *attendant_ids.get(&row.attendant_email)?;
                let converted = row.budgets_converted.unwrap_or_default();
                let exams_sold = row.exams_sold.unwrap_or_default();
                let patients_served = row.patients_served.unwrap_or_default();
                Some(NewAttendantMetric {
                    period: row.period,
                    unit_id,
                    attendant_id,
                    total_revenue: row.total_revenue.unwrap_or_default(),
                    budgets_registered: row.budgets_registered.unwrap_or_default(),
                    budgets_converted: converted,
                    exams_sold,
                    patients_served,
                    average_ticket_per_exam: row
                        .average_ticket_per_exam
                        .unwrap_or_else(|| metrics::average_ticket(converted, exams_sold)),
                    average_ticket_per_patient: row
                        .average_ticket_per_patient
                        .unwrap_or_else(|| metrics::average_ticket(converted, patients_served)),
                    nps_score: row.nps_score.unwrap_or_default() as i32,
                })
            })
            .collect();
        if normalized.is_empty() {
            return Ok(0);
        }
        self.store.upsert_attendant_metrics(&normalized).await
    }

    /// One batched lookup for the distinct keys referenced by a category.
    async fn resolve<'k>(
        &self,
        kind: ReferenceKind,
        keys: impl Iterator<Item = &'k str>,
    ) -> Result<HashMap<String, Uuid>> {
        let distinct: Vec<String> = keys
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let ids = self.store.lookup_by_natural_key(kind, &distinct).await?;
        debug!(?kind, requested = distinct.len(), resolved = ids.len(), "natural keys resolved");
        Ok(ids)
    }
}
