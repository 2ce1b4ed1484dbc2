use std::collections::HashMap;

use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{Attendant, MetricRecord, Unit};
use crate::period::Period;
use crate::store::{NewAttendant, NewAttendantMetric, NewUnit, NewUnitMetric};

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Two demo units with three attendants and metrics for the last two months.
pub async fn seed(pool: &PgPool) -> Result<()> {
    let units = vec![
        NewUnit {
            name: "Unidade Centro".to_string(),
            code: "CTR".to_string(),
            active: true,
        },
        NewUnit {
            name: "Unidade Norte".to_string(),
            code: "NRT".to_string(),
            active: true,
        },
    ];
    upsert_units(pool, &units).await?;
    let unit_ids = lookup_unit_ids(pool, &["CTR".to_string(), "NRT".to_string()]).await?;

    let staff = [
        ("Avery Lima", "avery.lima@clinic.example", "CTR"),
        ("Jules Moreno", "jules.moreno@clinic.example", "CTR"),
        ("Kiara Patel", "kiara.patel@clinic.example", "NRT"),
    ];
    let attendants: Vec<NewAttendant> = staff
        .iter()
        .filter_map(|(name, email, code)| {
            unit_ids.get(*code).map(|&unit_id| NewAttendant {
                name: name.to_string(),
                email: email.to_string(),
                unit_id,
                active: true,
            })
        })
        .collect();
    upsert_attendants(pool, &attendants).await?;
    let emails: Vec<String> = staff.iter().map(|(_, email, _)| email.to_string()).collect();
    let attendant_ids = lookup_attendant_ids(pool, &emails).await?;

    let current = Period::current();
    let previous = current
        .previous()
        .ok_or_else(|| Error::Config(format!("no month before {current}")))?;
    let periods = [previous.to_string(), current.to_string()];
    let mut unit_metrics = Vec::new();
    let mut attendant_metrics = Vec::new();

    for (month, period) in periods.iter().enumerate() {
        let growth = 1.0 + month as f64 * 0.1;
        for (index, (_, email, code)) in staff.iter().enumerate() {
            let (Some(&unit_id), Some(&attendant_id)) = (unit_ids.get(*code), attendant_ids.get(*email))
            else {
                continue;
            };
            let registered = (40_000.0 + index as f64 * 7_500.0) * growth;
            let converted = registered * (0.45 + index as f64 * 0.05);
            let exams = 90 + (index as i64 * 15) + month as i64 * 10;
            let patients = 60 + (index as i64 * 10) + month as i64 * 5;
            attendant_metrics.push(NewAttendantMetric {
                period: period.clone(),
                unit_id,
                attendant_id,
                total_revenue: converted,
                budgets_registered: registered,
                budgets_converted: converted,
                exams_sold: exams,
                patients_served: patients,
                average_ticket_per_exam: metrics::average_ticket(converted, exams),
                average_ticket_per_patient: metrics::average_ticket(converted, patients),
                nps_score: 62 + index as i32 * 6 + month as i32 * 3,
            });
        }
        for (code, unit_id) in &unit_ids {
            let revenue: f64 = attendant_metrics
                .iter()
                .filter(|m| &m.period == period && &m.unit_id == unit_id)
                .map(|m| m.total_revenue)
                .sum();
            debug!(unit = %code, %period, revenue, "seeding unit totals");
            unit_metrics.push(NewUnitMetric {
                period: period.clone(),
                unit_id: *unit_id,
                total_revenue: revenue,
                patients_served: 0,
                exams_sold: 0,
                nps_score: None,
            });
        }
    }

    upsert_unit_metrics(pool, &unit_metrics).await?;
    upsert_attendant_metrics(pool, &attendant_metrics).await?;
    info!(
        units = units.len(),
        attendants = attendants.len(),
        metrics = attendant_metrics.len(),
        "seed data written"
    );
    Ok(())
}

pub async fn fetch_metric_records(pool: &PgPool) -> Result<Vec<MetricRecord>> {
    let rows = sqlx::query(
        "SELECT period, unit, attendant, total_revenue, budgets_registered, \
         budgets_converted, exams_sold, patients_served, average_ticket_per_exam, \
         average_ticket_per_patient, nps_score \
         FROM clinic_metrics.metric_report \
         ORDER BY period, unit, attendant",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(MetricRecord {
            period: row.try_get("period")?,
            unit: row.try_get("unit")?,
            attendant: row.try_get("attendant")?,
            total_revenue: row.try_get("total_revenue")?,
            budgets_registered: row.try_get("budgets_registered")?,
            budgets_converted: row.try_get("budgets_converted")?,
            exams_sold: row.try_get("exams_sold")?,
            patients_served: row.try_get("patients_served")?,
            average_ticket_per_exam: row.try_get("average_ticket_per_exam")?,
            average_ticket_per_patient: row.try_get("average_ticket_per_patient")?,
            nps_score: row.try_get("nps_score")?,
        });
    }

    Ok(records)
}

pub async fn list_units(pool: &PgPool) -> Result<Vec<Unit>> {
    let rows = sqlx::query("SELECT id, name, code, active FROM clinic_metrics.units ORDER BY name")
        .fetch_all(pool)
        .await?;

    let mut units = Vec::with_capacity(rows.len());
    for row in rows {
        units.push(Unit {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
            active: row.try_get("active")?,
        });
    }
    Ok(units)
}

pub async fn list_attendants(pool: &PgPool) -> Result<Vec<Attendant>> {
    let rows = sqlx::query(
        "SELECT a.id, a.name, a.email, u.code AS unit_code, a.active \
         FROM clinic_metrics.attendants a \
         JOIN clinic_metrics.units u ON u.id = a.unit_id \
         ORDER BY a.name",
    )
    .fetch_all(pool)
    .await?;

    let mut attendants = Vec::with_capacity(rows.len());
    for row in rows {
        attendants.push(Attendant {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            unit_code: row.try_get("unit_code")?,
            active: row.try_get("active")?,
        });
    }
    Ok(attendants)
}

pub async fn lookup_unit_ids(pool: &PgPool, codes: &[String]) -> Result<HashMap<String, Uuid>> {
    lookup_ids(
        pool,
        "SELECT code AS key, id FROM clinic_metrics.units WHERE code = ANY($1)",
        codes,
    )
    .await
}

pub async fn lookup_attendant_ids(pool: &PgPool, emails: &[String]) -> Result<HashMap<String, Uuid>> {
    lookup_ids(
        pool,
        "SELECT email AS key, id FROM clinic_metrics.attendants WHERE email = ANY($1)",
        emails,
    )
    .await
}

async fn lookup_ids(pool: &PgPool, sql: &str, keys: &[String]) -> Result<HashMap<String, Uuid>> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query(sql).bind(keys).fetch_all(pool).await?;
    let mut ids = HashMap::with_capacity(rows.len());
    for row in rows {
        ids.insert(row.try_get("key")?, row.try_get("id")?);
    }
    debug!(requested = keys.len(), found = ids.len(), "resolved natural keys");
    Ok(ids)
}

pub async fn upsert_units(pool: &PgPool, rows: &[NewUnit]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO clinic_metrics.units (id, name, code, active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, active = EXCLUDED.active, updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.name)
        .bind(&row.code)
        .bind(row.active)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(written)
}

pub async fn upsert_attendants(pool: &PgPool, rows: &[NewAttendant]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO clinic_metrics.attendants (id, name, email, unit_id, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, unit_id = EXCLUDED.unit_id,
                active = EXCLUDED.active, updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.name)
        .bind(&row.email)
        .bind(row.unit_id)
        .bind(row.active)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(written)
}

pub async fn upsert_unit_metrics(pool: &PgPool, rows: &[NewUnitMetric]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO clinic_metrics.unit_metrics
            (id, period, unit_id, total_revenue, patients_served, exams_sold, nps_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (period, unit_id) DO UPDATE
            SET total_revenue = EXCLUDED.total_revenue,
                patients_served = EXCLUDED.patients_served,
                exams_sold = EXCLUDED.exams_sold,
                nps_score = EXCLUDED.nps_score,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.period)
        .bind(row.unit_id)
        .bind(row.total_revenue)
        .bind(row.patients_served)
        .bind(row.exams_sold)
        .bind(row.nps_score)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(written)
}

pub async fn upsert_attendant_metrics(pool: &PgPool, rows: &[NewAttendantMetric]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO clinic_metrics.attendant_metrics
            (id, period, unit_id, attendant_id, total_revenue, budgets_registered,
             budgets_converted, exams_sold, patients_served, average_ticket_per_exam,
             average_ticket_per_patient, nps_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (period, unit_id, attendant_id) DO UPDATE
            SET total_revenue = EXCLUDED.total_revenue,
                budgets_registered = EXCLUDED.budgets_registered,
                budgets_converted = EXCLUDED.budgets_converted,
                exams_sold = EXCLUDED.exams_sold,
                patients_served = EXCLUDED.patients_served,
                average_ticket_per_exam = EXCLUDED.average_ticket_per_exam,
                average_ticket_per_patient = EXCLUDED.average_ticket_per_patient,
                nps_score = EXCLUDED.nps_score,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.period)
        .bind(row.unit_id)
        .bind(row.attendant_id)
        .bind(row.total_revenue)
        .bind(row.budgets_registered)
        .bind(row.budgets_converted)
        .bind(row.exams_sold)
        .bind(row.patients_served)
        .bind(row.average_ticket_per_exam)
        .bind(row.average_ticket_per_patient)
        .bind(row.nps_score)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(written)
}
