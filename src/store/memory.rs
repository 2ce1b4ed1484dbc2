use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    ImportSink, MetricsSource, NewAttendant, NewAttendantMetric, NewUnit, NewUnitMetric,
    ReferenceKind, ReferenceResolver,
};
use crate::error::{Error, Result};
use crate::models::{Attendant, MetricRecord, Unit};

/// In-process store with the same upsert semantics as the Postgres tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_lookups: bool,
    lookup_calls: Mutex<Vec<(ReferenceKind, usize)>>,
}

#[derive(Default)]
struct Tables {
    units: Vec<Unit>,
    attendants: Vec<(Attendant, Uuid)>,
    unit_metrics: Vec<(NewUnitMetric, Uuid)>,
    attendant_metrics: Vec<(NewAttendantMetric, Uuid)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reference lookup fails as if the database were unreachable.
    pub fn failing_lookups() -> Self {
        Self {
            fail_lookups: true,
            ..Self::default()
        }
    }

    pub fn units(&self) -> Vec<Unit> {
        self.tables.lock().unwrap().units.clone()
    }

    pub fn attendants(&self) -> Vec<Attendant> {
        self.tables
            .lock()
            .unwrap()
            .attendants
            .iter()
            .map(|(attendant, _)| attendant.clone())
            .collect()
    }

    pub fn unit_metric_count(&self) -> usize {
        self.tables.lock().unwrap().unit_metrics.len()
    }

    pub fn attendant_metric_count(&self) -> usize {
        self.tables.lock().unwrap().attendant_metrics.len()
    }

    /// (kind, number of keys) for each lookup, in call order.
    pub fn lookup_calls(&self) -> Vec<(ReferenceKind, usize)> {
        self.lookup_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReferenceResolver for MemoryStore {
    async fn lookup_by_natural_key(
        &self,
        kind: ReferenceKind,
        keys: &[String],
    ) -> Result<HashMap<String, Uuid>> {
        self.lookup_calls.lock().unwrap().push((kind, keys.len()));
        if self.fail_lookups {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }

        let tables = self.tables.lock().unwrap();
        let found = match kind {
            ReferenceKind::Unit => tables
                .units
                .iter()
                .filter(|unit| keys.contains(&unit.code))
                .map(|unit| (unit.code.clone(), unit.id))
                .collect(),
            ReferenceKind::Attendant => tables
                .attendants
                .iter()
                .filter(|(attendant, _)| keys.contains(&attendant.email))
                .map(|(attendant, _)| (attendant.email.clone(), attendant.id))
                .collect(),
        };
        Ok(found)
    }
}

#[async_trait]
impl ImportSink for MemoryStore {
    async fn upsert_units(&self, rows: &[NewUnit]) -> Result<usize> {
        let mut tables = self.tables.lock().unwrap();
        for row in rows {
            match tables.units.iter_mut().find(|unit| unit.code == row.code) {
                Some(unit) => {
                    unit.name = row.name.clone();
                    unit.active = row.active;
                }
                None => tables.units.push(Unit {
                    id: Uuid::new_v4(),
                    name: row.name.clone(),
                    code: row.code.clone(),
                    active: row.active,
                }),
            }
        }
        Ok(rows.len())
    }

    async fn upsert_attendants(&self, rows: &[NewAttendant]) -> Result<usize> {
        let mut tables = self.tables.lock().unwrap();
        for row in rows {
            let unit_code = tables
                .units
                .iter()
                .find(|unit| unit.id == row.unit_id)
                .map(|unit| unit.code.clone())
                .unwrap_or_default();
            match tables
                .attendants
                .iter_mut()
                .find(|(attendant, _)| attendant.email == row.email)
            {
                Some((attendant, unit_id)) => {
                    attendant.name = row.name.clone();
                    attendant.unit_code = unit_code;
                    attendant.active = row.active;
                    *unit_id = row.unit_id;
                }
                None => tables.attendants.push((
                    Attendant {
                        id: Uuid::new_v4(),
                        name: row.name.clone(),
                        email: row.email.clone(),
                        unit_code,
                        active: row.active,
                    },
                    row.unit_id,
                )),
            }
        }
        Ok(rows.len())
    }

    async fn upsert_unit_metrics(&self, rows: &[NewUnitMetric]) -> Result<usize> {
        let mut tables = self.tables.lock().unwrap();
        for row in rows {
            match tables
                .unit_metrics
                .iter_mut()
                .find(|(m, _)| m.period == row.period && m.unit_id == row.unit_id)
            {
                Some((existing, _)) => *existing = row.clone(),
                None => tables.unit_metrics.push((row.clone(), Uuid::new_v4())),
            }
        }
        Ok(rows.len())
    }

    async fn upsert_attendant_metrics(&self, rows: &[NewAttendantMetric]) -> Result<usize> {
        let mut tables = self.tables.lock().unwrap();
        for row in rows {
            match tables.attendant_metrics.iter_mut().find(|(m, _)| {
                m.period == row.period && m.unit_id == row.unit_id && m.attendant_id == row.attendant_id
            }) {
                Some((existing, _)) => *existing = row.clone(),
                None => tables.attendant_metrics.push((row.clone(), Uuid::new_v4())),
            }
        }
        Ok(rows.len())
    }
}

#[async_trait]
impl MetricsSource for MemoryStore {
    async fn fetch_metric_records(&self) -> Result<Vec<MetricRecord>> {
        let tables = self.tables.lock().unwrap();
        let unit_name = |id: Uuid| {
            tables
                .units
                .iter()
                .find(|unit| unit.id == id)
                .map(|unit| unit.name.clone())
                .unwrap_or_default()
        };
        let attendant_name = |id: Uuid| {
            tables
                .attendants
                .iter()
                .find(|(attendant, _)| attendant.id == id)
                .map(|(attendant, _)| attendant.name.clone())
                .unwrap_or_default()
        };

        let mut records: Vec<MetricRecord> = tables
            .attendant_metrics
            .iter()
            .map(|(m, _)| MetricRecord {
                period: m.period.clone(),
                unit: unit_name(m.unit_id),
                attendant: attendant_name(m.attendant_id),
                total_revenue: m.total_revenue,
                budgets_registered: m.budgets_registered,
                budgets_converted: m.budgets_converted,
                exams_sold: m.exams_sold,
                patients_served: m.patients_served,
                average_ticket_per_exam: m.average_ticket_per_exam,
                average_ticket_per_patient: m.average_ticket_per_patient,
                nps_score: m.nps_score,
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.period, &a.unit, &a.attendant).cmp(&(&b.period, &b.unit, &b.attendant))
        });
        Ok(records)
    }

    async fn list_units(&self) -> Result<Vec<Unit>> {
        Ok(self.units())
    }

    async fn list_attendants(&self) -> Result<Vec<Attendant>> {
        Ok(self.attendants())
    }
}
