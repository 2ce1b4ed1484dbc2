use std::collections::HashSet;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// One attendant's performance in one unit during one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub period: String,
    pub unit: String,
    pub attendant: String,
    pub total_revenue: f64,
    pub budgets_registered: f64,
    pub budgets_converted: f64,
    pub exams_sold: i64,
    pub patients_served: i64,
    pub average_ticket_per_exam: f64,
    pub average_ticket_per_patient: f64,
    pub nps_score: i32,
}

/// Exact-match selections per dimension. An empty set places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(serialize_with = "sorted")]
    pub periods: HashSet<String>,
    #[serde(serialize_with = "sorted")]
    pub units: HashSet<String>,
    #[serde(serialize_with = "sorted")]
    pub attendants: HashSet<String>,
}

fn sorted<S: Serializer>(values: &HashSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut ordered: Vec<&String> = values.iter().collect();
    ordered.sort();
    serializer.collect_seq(ordered)
}

impl FilterSet {
    pub fn new<P, U, A>(periods: P, units: U, attendants: A) -> Self
    where
        P: IntoIterator<Item = String>,
        U: IntoIterator<Item = String>,
        A: IntoIterator<Item = String>,
    {
        Self {
            periods: periods.into_iter().collect(),
            units: units.into_iter().collect(),
            attendants: attendants.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendant {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub unit_code: String,
    pub active: bool,
}
