//! Output formatting module for costplan
//!
//! This module provides formatters for displaying cost reports in different formats:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and integration with other tools
//!
//! Amounts are rounded to cents for display only; JSON output carries the
//! exact decimal values.

use crate::aggregation::{ComponentLine, CostReport, ResourceCost, ResourceDelta, RunStatus};
use crate::evaluation::DiffReport;
use costplan_core::types::{Quantity, ResourceStatus};
use costplan_pricing::ComponentCost;
use prettytable::{Cell, Row, Table, format, row};
use rust_decimal::Decimal;
use serde::Serialize;

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format the cost breakdown of one plan
    fn format_breakdown(&self, report: &CostReport) -> String;

    /// Format a before/after comparison
    fn format_diff(&self, report: &DiffReport) -> String;
}

/// Table formatter for human-readable output
pub struct TableFormatter;

impl TableFormatter {
    /// Format currency with dollar sign, rounded to cents
    fn format_currency(amount: Decimal) -> String {
        format!("${:.2}", amount.round_dp(2))
    }

    /// Format a signed change
    fn format_delta(amount: Decimal) -> String {
        let rounded = amount.round_dp(2);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            format!("-${:.2}", rounded.abs())
        } else {
            format!("+${rounded:.2}")
        }
    }

    fn format_quantity(quantity: Quantity) -> String {
        match quantity {
            Quantity::Known(value) => value.round_dp(4).normalize().to_string(),
            Quantity::Unknown => "-".to_string(),
        }
    }

    fn format_cost(cost: &ComponentCost) -> String {
        match cost {
            ComponentCost::Cost(amount) => Self::format_currency(*amount),
            ComponentCost::Unresolved(reason) => reason.to_string(),
        }
    }

    fn add_component_rows(table: &mut Table, line: &ComponentLine, indent: &str) {
        table.add_row(row![
            format!("{indent}├─ {}", line.name),
            r -> Self::format_quantity(line.monthly_quantity),
            line.unit,
            r -> Self::format_cost(&line.cost)
        ]);
    }

    fn add_resource_rows(table: &mut Table, resource: &ResourceCost, indent: &str) {
        let label = match resource.status {
            ResourceStatus::Unsupported => format!("{indent}{} (unsupported)", resource.name),
            ResourceStatus::Free => format!("{indent}{} (free)", resource.name),
            ResourceStatus::Supported => format!("{indent}{}", resource.name),
        };
        table.add_row(row![b -> label, "", "", r -> Self::format_currency(resource.subtotal)]);

        let inner = format!("{indent}   ");
        for line in &resource.components {
            Self::add_component_rows(table, line, &inner);
        }
        for child in &resource.children {
            Self::add_resource_rows(table, child, &inner);
        }
    }

    /// Subtotal cell of a diff row, flagging components without a cost
    fn format_side(subtotal: Option<Decimal>, unresolved: usize) -> String {
        match subtotal {
            None => "-".to_string(),
            Some(amount) if unresolved > 0 => {
                format!("{} ({unresolved} unresolved)", Self::format_currency(amount))
            }
            Some(amount) => Self::format_currency(amount),
        }
    }

    fn add_delta_rows(table: &mut Table, delta: &ResourceDelta, indent: &str) {
        table.add_row(row![
            b -> format!("{indent}{}", delta.name),
            r -> Self::format_side(delta.past_subtotal, delta.past_unresolved),
            r -> Self::format_side(delta.current_subtotal, delta.current_unresolved),
            r -> Self::format_delta(delta.delta)
        ]);

        let optional = |cost: &Option<ComponentCost>| cost.as_ref().map_or_else(|| "-".to_string(), Self::format_cost);
        let inner = format!("{indent}   ");
        for component in &delta.components {
            let change = if component.is_partial() {
                format!("{}*", Self::format_delta(component.delta))
            } else {
                Self::format_delta(component.delta)
            };
            table.add_row(row![
                format!("{inner}├─ {}", component.name),
                r -> optional(&component.past),
                r -> optional(&component.current),
                r -> change
            ]);
        }
        for child in &delta.children {
            Self::add_delta_rows(table, child, &inner);
        }
    }

    fn format_notes(report: &CostReport) -> String {
        let mut notes = String::new();
        if !report.unresolved.is_empty() {
            notes.push_str(&format!(
                "\n{} cost components could not be priced:\n",
                report.unresolved.len()
            ));
            for item in &report.unresolved {
                notes.push_str(&format!(
                    "  {} / {}: {}\n",
                    item.address, item.component, item.reason
                ));
            }
        }
        if !report.unsupported.is_empty() {
            notes.push_str(&format!(
                "\n{} resources are not supported yet:\n",
                report.unsupported.len()
            ));
            for address in &report.unsupported {
                notes.push_str(&format!("  {address}\n"));
            }
        }
        if report.status == RunStatus::Incomplete {
            notes.push_str("\nEvaluation was cancelled; the estimate is incomplete.\n");
        }
        notes
    }
}

impl OutputFormatter for TableFormatter {
    fn format_breakdown(&self, report: &CostReport) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![
            b -> "Name",
            b -> "Monthly Qty",
            b -> "Unit",
            b -> "Monthly Cost"
        ]);

        for resource in report.resources() {
            Self::add_resource_rows(&mut table, resource, "");
        }

        // Add separator
        table.add_row(Row::new(vec![Cell::new(""); 4]));

        table.add_row(row![
            b -> format!("OVERALL TOTAL ({})", report.currency),
            "",
            "",
            b -> Self::format_currency(report.total)
        ]);

        format!("{table}{}", Self::format_notes(report))
    }

    fn format_diff(&self, report: &DiffReport) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![
            b -> "Name",
            b -> "Past",
            b -> "Current",
            b -> "Change"
        ]);

        for delta in &report.diff.resources {
            Self::add_delta_rows(&mut table, delta, "");
        }

        table.add_row(Row::new(vec![Cell::new(""); 4]));

        table.add_row(row![
            b -> format!("OVERALL TOTAL ({})", report.current.currency),
            b -> Self::format_currency(report.diff.past_total),
            b -> Self::format_currency(report.diff.current_total),
            b -> Self::format_delta(report.diff.total_delta)
        ]);

        let mut notes = String::new();
        let partial = report.diff.resources.iter().any(ResourceDelta::is_partial);
        if partial {
            notes.push_str("\n* change covers known costs only; unresolved components count as zero\n");
        }
        let past_notes = Self::format_notes(&report.past);
        if !past_notes.is_empty() {
            notes.push_str(&format!("\nPast plan:{past_notes}"));
        }
        let current_notes = Self::format_notes(&report.current);
        if !current_notes.is_empty() {
            notes.push_str(&format!("\nCurrent plan:{current_notes}"));
        }

        format!("{table}{notes}")
    }
}

/// JSON formatter for machine-readable output
///
/// Amounts are emitted as exact decimal strings.
pub struct JsonFormatter;

impl JsonFormatter {
    fn to_json(value: &impl Serialize) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_breakdown(&self, report: &CostReport) -> String {
        Self::to_json(report)
    }

    fn format_diff(&self, report: &DiffReport) -> String {
        Self::to_json(report)
    }
}

/// Get appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
