//! Storage seams used by the importer and the HTTP service.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::models::{Attendant, MetricRecord, Unit};

#[cfg(test)]
pub mod memory;

/// Reference entities addressed by natural key in import payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Keyed by unit code.
    Unit,
    /// Keyed by attendant email.
    Attendant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUnit {
    pub name: String,
    pub code: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendant {
    pub name: String,
    pub email: String,
    pub unit_id: Uuid,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUnitMetric {
    pub period: String,
    pub unit_id: Uuid,
    pub total_revenue: f64,
    pub patients_served: i64,
    pub exams_sold: i64,
    pub nps_score: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendantMetric {
    pub period: String,
    pub unit_id: Uuid,
    pub attendant_id: Uuid,
    pub total_revenue: f64,
    pub budgets_registered: f64,
    pub budgets_converted: f64,
    pub exams_sold: i64,
    pub patients_served: i64,
    pub average_ticket_per_exam: f64,
    pub average_ticket_per_patient: f64,
    pub nps_score: i32,
}

#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    /// Resolves every key it can in one round trip; missing keys are absent from the map.
    async fn lookup_by_natural_key(
        &self,
        kind: ReferenceKind,
        keys: &[String],
    ) -> Result<HashMap<String, Uuid>>;
}

/// Upserts return the number of rows written. Conflict keys: unit code,
/// attendant email, (period, unit) and (period, unit, attendant).
#[async_trait]
pub trait ImportSink: Send + Sync {
    async fn upsert_units(&self, rows: &[NewUnit]) -> Result<usize>;
    async fn upsert_attendants(&self, rows: &[NewAttendant]) -> Result<usize>;
    async fn upsert_unit_metrics(&self, rows: &[NewUnitMetric]) -> Result<usize>;
    async fn upsert_attendant_metrics(&self, rows: &[NewAttendantMetric]) -> Result<usize>;
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_metric_records(&self) -> Result<Vec<MetricRecord>>;
    async fn list_units(&self) -> Result<Vec<Unit>>;
    async fn list_attendants(&self) -> Result<Vec<Attendant>>;
}

pub trait Store: ReferenceResolver + ImportSink + MetricsSource {}

impl<T> Store for T where T: ReferenceResolver + ImportSink + MetricsSource {}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceResolver for PgStore {
    async fn lookup_by_natural_key(
        &self,
        kind: ReferenceKind,
        keys: &[String],
    ) -> Result<HashMap<String, Uuid>> {
        match kind {
            ReferenceKind::Unit => db::lookup_unit_ids(&self.pool, keys).await,
            ReferenceKind::Attendant => db::lookup_attendant_ids(&self.pool, keys).await,
        }
    }
}

#[async_trait]
impl ImportSink for PgStore {
    async fn upsert_units(&self, rows: &[NewUnit]) -> Result<usize> {
        db::upsert_units(&self.pool, rows).await
    }

    async fn upsert_attendants(&self, rows: &[NewAttendant]) -> Result<usize> {
        db::upsert_attendants(&self.pool, rows).await
    }

    async fn upsert_unit_metrics(&self, rows: &[NewUnitMetric]) -> Result<usize> {
        db::upsert_unit_metrics(&self.pool, rows).await
    }

    async fn upsert_attendant_metrics(&self, rows: &[NewAttendantMetric]) -> Result<usize> {
        db::upsert_attendant_metrics(&self.pool, rows).await
    }
}

#[async_trait]
impl MetricsSource for PgStore {
    async fn fetch_metric_records(&self) -> Result<Vec<MetricRecord>> {
        db::fetch_metric_records(&self.pool).await
    }

    async fn list_units(&self) -> Result<Vec<Unit>> {
        db::list_units(&self.pool).await
    }

    async fn list_attendants(&self) -> Result<Vec<Attendant>> {
        db::list_attendants(&self.pool).await
    }
}
