use std::fmt::Write;

use crate::dashboard::{DashboardView, KpiCard};
use crate::metrics::RankedGroup;
use crate::models::FilterSet;

fn describe(values: &std::collections::HashSet<String>, all: &str) -> String {
    if values.is_empty() {
        return all.to_string();
    }
    let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(", ")
}

fn scope_line(filters: &FilterSet) -> String {
    format!(
        "Periods: {} | Units: {} | Attendants: {}",
        describe(&filters.periods, "all"),
        describe(&filters.units, "all"),
        describe(&filters.attendants, "all")
    )
}

pub fn format_kpi(card: &KpiCard) -> String {
    let arrow = if card.change_pct > 0.0 {
        "▲"
    } else if card.change_pct < 0.0 {
        "▼"
    } else {
        "="
    };
    format!(
        "{}: {:.2} (previous {:.2}, {} {:+.1}%)",
        card.label, card.current, card.previous, arrow, card.change_pct
    )
}

fn write_ranking(output: &mut String, title: &str, groups: &[RankedGroup], unit: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");

    if groups.is_empty() {
        let _ = writeln!(output, "No records for this selection.");
        return;
    }
    for (position, group) in groups.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {}: {:.2}{} ({} records)",
            position + 1,
            group.label,
            group.value,
            unit,
            group.count
        );
    }
}

pub fn build_report(view: &DashboardView) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Clinic Performance Report");
    let _ = writeln!(output, "{}", scope_line(&view.filters));
    if view.filters.periods.is_empty() {
        let _ = writeln!(output, "Compared against: the full dataset (no period selected)");
    } else {
        let _ = writeln!(
            output,
            "Compared against: {}",
            describe(&view.comparison_filters.periods, "all")
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Indicators");

    if view.current.record_count == 0 {
        let _ = writeln!(output, "No records for this selection.");
    } else {
        for card in &view.kpis {
            let _ = writeln!(output, "- {}", format_kpi(card));
        }
    }

    write_ranking(&mut output, "Revenue by Month", &view.revenue_by_month, "");
    write_ranking(&mut output, "Top Attendants by Revenue", &view.revenue_by_attendant, "");
    write_ranking(&mut output, "Conversion Rate by Attendant", &view.conversion_by_attendant, "%");
    write_ranking(&mut output, "NPS by Attendant", &view.nps_by_attendant, "");
    write_ranking(&mut output, "Average Ticket by Attendant", &view.ticket_by_attendant, "");

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::build_dashboard;
    use crate::metrics::tests::record;

    #[test]
    fn report_lists_kpis_and_rankings() {
        let records = vec![
            record("2025-01", "Centro", "Ana", 120.0),
            record("2024-12", "Centro", "Ana", 100.0),
        ];
        let filters = FilterSet::new(vec!["2025-01".to_string()], vec![], vec![]);
        let report = build_report(&build_dashboard(&records, &filters, 5));

        assert!(report.contains("Periods: 2025-01 | Units: all | Attendants: all"));
        assert!(report.contains("Compared against: 2024-12"));
        assert!(report.contains("Total revenue: 120.00 (previous 100.00, ▲ +20.0%)"));
        assert!(report.contains("1. Ana: 120.00 (1 records)"));
    }

    #[test]
    fn empty_selection_says_so() {
        let report = build_report(&build_dashboard(&[], &FilterSet::default(), 5));
        assert!(report.contains("Compared against: the full dataset"));
        assert!(report.contains("No records for this selection."));
    }
}
