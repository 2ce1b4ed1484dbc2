//! Filtering, totals and rankings over metric records.
//!
//! Every function here is pure and total: empty inputs and zero divisors resolve
//! to zero values instead of errors, because the dashboard renders zeros.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{FilterSet, MetricRecord};
use crate::period::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub record_count: usize,
    pub total_revenue: f64,
    pub budgets_registered: f64,
    pub budgets_converted: f64,
    pub exams_sold: i64,
    pub patients_served: i64,
    pub average_ticket_per_patient_sum: f64,
    pub nps_sum: i64,
}

impl Totals {
    pub fn conversion_rate(&self) -> f64 {
        conversion_rate(self.budgets_converted, self.budgets_registered)
    }

    pub fn average_nps(&self) -> f64 {
        mean(self.nps_sum as f64, self.record_count as f64)
    }

    /// Mean of the stored per-record patient tickets.
    pub fn average_ticket_per_patient(&self) -> f64 {
        mean(self.average_ticket_per_patient_sum, self.record_count as f64)
    }

    pub fn average_ticket_per_exam(&self) -> f64 {
        average_ticket(self.budgets_converted, self.exams_sold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedGroup {
    pub label: String,
    pub value: f64,
    pub count: usize,
}

/// Keeps a record when, for each dimension, the selection is empty or contains
/// the record's value.
pub fn filter_records(records: &[MetricRecord], filters: &FilterSet) -> Vec<MetricRecord> {
    records
        .iter()
        .filter(|record| {
            matches(&filters.periods, &record.period)
                && matches(&filters.units, &record.unit)
                && matches(&filters.attendants, &record.attendant)
        })
        .cloned()
        .collect()
}

fn matches(selection: &std::collections::HashSet<String>, value: &str) -> bool {
    selection.is_empty() || selection.contains(value)
}

/// Maps each selected period to the month before it.
///
/// An empty selection yields an empty result, which as a filter means the
/// comparison pool is unrestricted rather than "last month". Strings that are
/// not `YYYY-MM` are skipped; duplicates are dropped keeping first occurrence.
pub fn previous_periods<S: AsRef<str>>(selected: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    selected
        .iter()
        .filter_map(|raw| raw.as_ref().parse::<Period>().ok())
        .filter_map(|period| period.previous())
        .map(|previous| previous.to_string())
        .filter(|previous| seen.insert(previous.clone()))
        .collect()
}

/// Filters for the comparison pool: same units and attendants, previous months.
pub fn comparison_filters(filters: &FilterSet) -> FilterSet {
    let mut selected: Vec<&String> = filters.periods.iter().collect();
    selected.sort();
    FilterSet {
        periods: previous_periods(&selected).into_iter().collect(),
        units: filters.units.clone(),
        attendants: filters.attendants.clone(),
    }
}

pub fn aggregate_totals(records: &[MetricRecord]) -> Totals {
    records.iter().fold(Totals::default(), |mut totals, record| {
        totals.record_count += 1;
        totals.total_revenue += record.total_revenue;
        totals.budgets_registered += record.budgets_registered;
        totals.budgets_converted += record.budgets_converted;
        totals.exams_sold += record.exams_sold;
        totals.patients_served += record.patients_served;
        totals.average_ticket_per_patient_sum += record.average_ticket_per_patient;
        totals.nps_sum += i64::from(record.nps_score);
        totals
    })
}

/// `(current - previous) / previous * 100`, or exactly 0 when `previous` is 0.
///
/// The zero case is a display policy: a metric with no baseline shows no change.
pub fn percentage_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

/// Percentage of registered budget value that was converted; 0 with nothing registered.
pub fn conversion_rate(converted: f64, registered: f64) -> f64 {
    if registered > 0.0 {
        converted / registered * 100.0
    } else {
        0.0
    }
}

/// Value per exam or per patient; 0 when the count is not positive.
pub fn average_ticket(value: f64, count: i64) -> f64 {
    if count > 0 {
        value / count as f64
    } else {
        0.0
    }
}

fn mean(sum: f64, count: f64) -> f64 {
    if count > 0.0 {
        sum / count
    } else {
        0.0
    }
}

/// Groups records by key in first-seen order, keeping the record indices.
fn group_indices<K>(records: &[MetricRecord], key_fn: K) -> Vec<(String, Vec<usize>)>
where
    K: Fn(&MetricRecord) -> String,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let key = key_fn(record);
        match positions.get(&key) {
            Some(&slot) => groups[slot].1.push(index),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, vec![index]));
            }
        }
    }

    groups
}

/// Stable sort then truncate; equal values keep their incoming order.
fn rank(mut groups: Vec<RankedGroup>, top_n: Option<usize>, order: SortOrder) -> Vec<RankedGroup> {
    groups.sort_by(|a, b| {
        let ordering = a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
    if let Some(limit) = top_n {
        groups.truncate(limit);
    }
    groups
}

pub fn group_and_rank<K, V>(
    records: &[MetricRecord],
    key_fn: K,
    value_fn: V,
    aggregation: Aggregation,
    top_n: Option<usize>,
    order: SortOrder,
) -> Vec<RankedGroup>
where
    K: Fn(&MetricRecord) -> String,
    V: Fn(&MetricRecord) -> f64,
{
    let groups = group_indices(records, key_fn)
        .into_iter()
        .map(|(label, indices)| {
            let sum: f64 = indices.iter().map(|&i| value_fn(&records[i])).sum();
            let count = indices.len();
            let value = match aggregation {
                Aggregation::Sum => sum,
                Aggregation::Average => mean(sum, count as f64),
            };
            RankedGroup { label, value, count }
        })
        .collect();

    rank(groups, top_n, order)
}

/// Summed revenue per period, oldest month first.
pub fn revenue_by_month(records: &[MetricRecord]) -> Vec<RankedGroup> {
    let mut months = group_and_rank(
        records,
        |r| r.period.clone(),
        |r| r.total_revenue,
        Aggregation::Sum,
        None,
        SortOrder::Ascending,
    );
    months.sort_by(|a, b| a.label.cmp(&b.label));
    months
}

pub fn revenue_by_attendant(records: &[MetricRecord], top_n: usize) -> Vec<RankedGroup> {
    group_and_rank(
        records,
        |r| r.attendant.clone(),
        |r| r.total_revenue,
        Aggregation::Sum,
        Some(top_n),
        SortOrder::Descending,
    )
}

/// Conversion rate of summed budgets per attendant, not the mean of monthly rates.
pub fn conversion_by_attendant(records: &[MetricRecord], top_n: usize) -> Vec<RankedGroup> {
    let groups = group_indices(records, |r| r.attendant.clone())
        .into_iter()
        .map(|(label, indices)| {
            let (converted, registered) = indices.iter().fold((0.0, 0.0), |(c, r), &i| {
                (c + records[i].budgets_converted, r + records[i].budgets_registered)
            });
            RankedGroup {
                label,
                value: conversion_rate(converted, registered),
                count: indices.len(),
            }
        })
        .collect();

    rank(groups, Some(top_n), SortOrder::Descending)
}

pub fn nps_by_attendant(records: &[MetricRecord], top_n: usize) -> Vec<RankedGroup> {
    group_and_rank(
        records,
        |r| r.attendant.clone(),
        |r| f64::from(r.nps_score),
        Aggregation::Average,
        Some(top_n),
        SortOrder::Descending,
    )
}

pub fn ticket_by_attendant(records: &[MetricRecord], top_n: usize) -> Vec<RankedGroup> {
    group_and_rank(
        records,
        |r| r.attendant.clone(),
        |r| r.average_ticket_per_patient,
        Aggregation::Average,
        Some(top_n),
        SortOrder::Descending,
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(period: &str, unit: &str, attendant: &str, revenue: f64) -> MetricRecord {
        MetricRecord {
            period: period.to_string(),
            unit: unit.to_string(),
            attendant: attendant.to_string(),
            total_revenue: revenue,
            budgets_registered: 0.0,
            budgets_converted: 0.0,
            exams_sold: 0,
            patients_served: 0,
            average_ticket_per_exam: 0.0,
            average_ticket_per_patient: 0.0,
            nps_score: 0,
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample() -> Vec<MetricRecord> {
        vec![
            record("2025-01", "Centro", "Ana", 100.0),
            record("2025-01", "Norte", "Bruno", 200.0),
            record("2025-02", "Centro", "Ana", 150.0),
            record("2025-02", "Norte", "Carla", 50.0),
        ]
    }

    #[test]
    fn empty_filters_keep_every_record() {
        let records = sample();
        assert_eq!(filter_records(&records, &FilterSet::default()), records);
    }

    #[test]
    fn filters_combine_across_dimensions() {
        let records = sample();
        let filters = FilterSet::new(strings(&["2025-01", "2025-02"]), strings(&["Centro"]), vec![]);
        let filtered = filter_records(&records, &filters);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.unit == "Centro"));

        let narrower = FilterSet::new(strings(&["2025-02"]), strings(&["Centro"]), vec![]);
        assert!(filter_records(&records, &narrower).len() <= filtered.len());
    }

    #[test]
    fn filters_match_exact_values_only() {
        let records = sample();
        let filters = FilterSet::new(vec![], vec![], strings(&["an"]));
        assert!(filter_records(&records, &filters).is_empty());
        assert!(filter_records(&[], &FilterSet::default()).is_empty());
    }

    #[test]
    fn previous_periods_handles_rollover_and_empty() {
        assert_eq!(previous_periods(&["2025-01"]), vec!["2024-12".to_string()]);
        assert_eq!(previous_periods(&["2025-06"]), vec!["2025-05".to_string()]);
        assert!(previous_periods::<&str>(&[]).is_empty());
        assert_eq!(previous_periods(&["bad", "2025-03", "2025-03"]), vec!["2025-02".to_string()]);
        assert!(previous_periods(&["0001-01", "0000-05"]).is_empty());
    }

    #[test]
    fn comparison_without_period_filter_is_unrestricted() {
        let records = sample();
        let filters = FilterSet::new(vec![], strings(&["Norte"]), vec![]);
        let comparison = comparison_filters(&filters);
        assert!(comparison.periods.is_empty());
        assert_eq!(filter_records(&records, &comparison).len(), 2);
    }

    #[test]
    fn percentage_change_policy() {
        assert_eq!(percentage_change(150.0, 100.0), 50.0);
        assert_eq!(percentage_change(42.0, 0.0), 0.0);
        assert_eq!(percentage_change(-5.0, 0.0), 0.0);
        assert_eq!(percentage_change(7.5, 7.5), 0.0);
        assert_eq!(percentage_change(50.0, 100.0), -50.0);
    }

    #[test]
    fn conversion_rate_is_zero_safe() {
        assert_eq!(conversion_rate(0.0, 0.0), 0.0);
        assert_eq!(conversion_rate(50.0, 100.0), 50.0);
        assert_eq!(conversion_rate(120.0, 100.0), 120.0);
        assert_eq!(average_ticket(100.0, 0), 0.0);
        assert_eq!(average_ticket(100.0, 4), 25.0);
    }

    #[test]
    fn totals_sum_linearly() {
        let mut records = sample();
        records[0].budgets_registered = 1000.0;
        records[0].budgets_converted = 400.0;
        records[0].exams_sold = 8;
        records[0].patients_served = 4;
        records[0].nps_score = 80;
        records[1].nps_score = 40;

        let totals = aggregate_totals(&records);
        assert_eq!(totals.record_count, 4);
        assert_eq!(totals.total_revenue, 500.0);
        assert_eq!(totals.conversion_rate(), 40.0);
        assert_eq!(totals.average_nps(), 30.0);
        assert_eq!(totals.average_ticket_per_exam(), 50.0);

        let empty = aggregate_totals(&[]);
        assert_eq!(empty, Totals::default());
        assert_eq!(empty.average_nps(), 0.0);
        assert_eq!(empty.conversion_rate(), 0.0);
    }

    #[test]
    fn top_n_returns_highest_in_descending_order() {
        let records: Vec<MetricRecord> = (0..10)
            .map(|i| record("2025-01", "Centro", &format!("att-{i}"), 1000.0 - i as f64 * 10.0))
            .collect();
        let top = revenue_by_attendant(&records, 3);
        let labels: Vec<&str> = top.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["att-0", "att-1", "att-2"]);
        assert!(top[0].value > top[1].value && top[1].value > top[2].value);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let records = vec![
            record("2025-01", "Centro", "Zed", 10.0),
            record("2025-01", "Centro", "Amy", 10.0),
            record("2025-01", "Centro", "Max", 20.0),
        ];
        let ranked = group_and_rank(
            &records,
            |r| r.attendant.clone(),
            |r| r.total_revenue,
            Aggregation::Sum,
            None,
            SortOrder::Descending,
        );
        let labels: Vec<&str> = ranked.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Max", "Zed", "Amy"]);
    }

    #[test]
    fn average_aggregation_divides_by_group_size() {
        let mut records = sample();
        records[0].nps_score = 90;
        records[2].nps_score = 70;
        let nps = nps_by_attendant(&records, 10);
        let ana = nps.iter().find(|g| g.label == "Ana").unwrap();
        assert_eq!(ana.value, 80.0);
        assert_eq!(ana.count, 2);
    }

    #[test]
    fn conversion_uses_summed_budgets() {
        let mut records = sample();
        records[0].budgets_registered = 100.0;
        records[0].budgets_converted = 100.0;
        records[2].budgets_registered = 300.0;
        records[2].budgets_converted = 0.0;
        let rates = conversion_by_attendant(&records, 10);
        let ana = rates.iter().find(|g| g.label == "Ana").unwrap();
        assert_eq!(ana.value, 25.0);
    }

    #[test]
    fn revenue_by_month_is_chronological() {
        let mut records = sample();
        records.push(record("2024-12", "Centro", "Ana", 999.0));
        let months = revenue_by_month(&records);
        let labels: Vec<&str> = months.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-12", "2025-01", "2025-02"]);
        assert_eq!(months[1].value, 300.0);
    }
}
