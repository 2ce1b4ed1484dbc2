//! Dashboard view model: KPI cards with period-over-period change and chart series.
use std::collections::BTreeSet;

use serde::Serialize;

use crate::metrics::{self, RankedGroup, Totals};
use crate::models::{FilterSet, MetricRecord};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub filters: FilterSet,
    pub comparison_filters: FilterSet,
    pub current: Totals,
    pub previous: Totals,
    pub kpis: Vec<KpiCard>,
    pub revenue_by_month: Vec<RankedGroup>,
    pub revenue_by_attendant: Vec<RankedGroup>,
    pub conversion_by_attendant: Vec<RankedGroup>,
    pub nps_by_attendant: Vec<RankedGroup>,
    pub ticket_by_attendant: Vec<RankedGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiCard {
    pub key: &'static str,
    pub label: &'static str,
    pub current: f64,
    pub previous: f64,
    pub change_pct: f64,
}

impl KpiCard {
    fn new(key: &'static str, label: &'static str, current: f64, previous: f64) -> Self {
        Self {
            key,
            label,
            current,
            previous,
            change_pct: metrics::percentage_change(current, previous),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableFilters {
    pub periods: Vec<String>,
    pub units: Vec<String>,
    pub attendants: Vec<String>,
}

pub fn build_dashboard(records: &[MetricRecord], filters: &FilterSet, top_n: usize) -> DashboardView {
    let comparison_filters = metrics::comparison_filters(filters);
    let current_records = metrics::filter_records(records, filters);
    let previous_records = metrics::filter_records(records, &comparison_filters);

    let current = metrics::aggregate_totals(&current_records);
    let previous = metrics::aggregate_totals(&previous_records);

    DashboardView {
        kpis: kpi_cards(&current, &previous),
        revenue_by_month: metrics::revenue_by_month(&current_records),
        revenue_by_attendant: metrics::revenue_by_attendant(&current_records, top_n),
        conversion_by_attendant: metrics::conversion_by_attendant(&current_records, top_n),
        nps_by_attendant: metrics::nps_by_attendant(&current_records, top_n),
        ticket_by_attendant: metrics::ticket_by_attendant(&current_records, top_n),
        filters: filters.clone(),
        comparison_filters,
        current,
        previous,
    }
}

fn kpi_cards(current: &Totals, previous: &Totals) -> Vec<KpiCard> {
    vec![
        KpiCard::new("totalRevenue", "Total revenue", current.total_revenue, previous.total_revenue),
        KpiCard::new(
            "budgetsRegistered",
            "Budgets registered",
            current.budgets_registered,
            previous.budgets_registered,
        ),
        KpiCard::new(
            "budgetsConverted",
            "Budgets converted",
            current.budgets_converted,
            previous.budgets_converted,
        ),
        KpiCard::new(
            "conversionRate",
            "Conversion rate (%)",
            current.conversion_rate(),
            previous.conversion_rate(),
        ),
        KpiCard::new(
            "examsSold",
            "Exams sold",
            current.exams_sold as f64,
            previous.exams_sold as f64,
        ),
        KpiCard::new("averageNps", "Average NPS", current.average_nps(), previous.average_nps()),
        KpiCard::new(
            "averageTicketPerExam",
            "Average ticket per exam",
            current.average_ticket_per_exam(),
            previous.average_ticket_per_exam(),
        ),
        KpiCard::new(
            "averageTicketPerPatient",
            "Average ticket per patient",
            current.average_ticket_per_patient(),
            previous.average_ticket_per_patient(),
        ),
    ]
}

/// Distinct filter options: newest period first, names alphabetical.
pub fn available_filters(records: &[MetricRecord]) -> AvailableFilters {
    let mut periods = BTreeSet::new();
    let mut units = BTreeSet::new();
    let mut attendants = BTreeSet::new();

    for record in records {
        periods.insert(record.period.clone());
        units.insert(record.unit.clone());
        attendants.insert(record.attendant.clone());
    }

    AvailableFilters {
        periods: periods.into_iter().rev().collect(),
        units: units.into_iter().collect(),
        attendants: attendants.into_iter().collect(),
    }
}
