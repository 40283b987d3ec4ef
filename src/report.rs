use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use comfy_table::{Attribute, Cell, Color, Table};
use serde::Serialize;

use crate::calc::{self, format_currency};
use crate::error::Result;
use crate::model::{MilestoneLine, ProjectType, ResourceLine, SowStatus};
use crate::store::StoredRecord;

const GREEN: Color = Color::Rgb { r: 4, g: 120, b: 87 };
const RED: Color = Color::Rgb { r: 185, g: 28, b: 28 };
const AMBER: Color = Color::Rgb { r: 133, g: 100, b: 4 };

fn opt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "-".into())
}

fn opt_num(value: Option<f64>) -> String {
    value.map(|v| format!("{v}")).unwrap_or_else(|| "-".into())
}

fn status_cell(status: SowStatus) -> Cell {
    let cell = Cell::new(status.label());
    match status {
        SowStatus::Approved => cell.fg(GREEN),
        SowStatus::Rejected => cell.fg(RED),
        SowStatus::PendingReview => cell.fg(AMBER),
        SowStatus::Draft => cell,
    }
}

pub fn resource_table(lines: &[ResourceLine]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Role",
        "Location",
        "Start Date",
        "End Date",
        "Days",
        "Allocation %",
        "Hrs/Day",
        "Rate/hr ($)",
        "Estimated $",
    ]);

    for line in lines {
        table.add_row(vec![
            Cell::new(&line.role),
            Cell::new(&line.location),
            Cell::new(opt_date(line.start)),
            Cell::new(opt_date(line.end)),
            Cell::new(line.business_days()),
            Cell::new(opt_num(line.allocation_percent)),
            Cell::new(opt_num(line.hours_per_day)),
            Cell::new(opt_num(line.rate_per_hour)),
            Cell::new(format_currency(line.estimated_cost())),
        ]);
    }

    table.add_row(vec![
        Cell::new("Total Contract Value").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_currency(calc::total_contract_value(lines))).add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn milestone_table(total_fee: f64, lines: &[MilestoneLine]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Milestone #",
        "Services / Deliverables",
        "Due Date",
        "Allocation %",
        "Net Payment ($)",
    ]);

    for line in lines {
        table.add_row(vec![
            Cell::new(&line.sequence),
            Cell::new(&line.description),
            Cell::new(opt_date(line.due_date)),
            Cell::new(opt_num(line.allocation_percent)),
            Cell::new(format_currency(line.net_payment(total_fee))),
        ]);
    }

    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format!("{}", allocated_percent(lines))).add_attribute(Attribute::Bold),
        Cell::new(format_currency(calc::total_milestone_payment(total_fee, lines)))
            .add_attribute(Attribute::Bold),
    ]);
    table
}

fn allocated_percent(lines: &[MilestoneLine]) -> f64 {
    calc::round_currency(lines.iter().filter_map(|m| m.allocation_percent).sum())
}

/// Informational only; milestone allocations are never forced to 100%.
pub fn allocation_note(lines: &[MilestoneLine]) -> Option<String> {
    let allocated = allocated_percent(lines);
    if lines.is_empty() || (allocated - 100.0).abs() < 0.005 {
        return None;
    }
    let verb = if allocated > 100.0 { "over" } else { "under" };
    Some(format!("Milestones are {verb}-allocated: {allocated}% of the fee is scheduled."))
}

pub fn records_table(records: &[StoredRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "SOW #",
        "SOW Name",
        "Client",
        "Type",
        "Status",
        "Total Value",
        "Created",
        "Reviewed By",
    ]);

    for stored in records {
        let r = &stored.record;
        let created = created_date(stored);
        table.add_row(vec![
            Cell::new(&stored.id),
            Cell::new(&r.sow_number),
            Cell::new(&r.sow_name),
            Cell::new(&r.client),
            Cell::new(r.project_type.label()),
            status_cell(r.status),
            Cell::new(format_currency(r.total_value)),
            Cell::new(created),
            Cell::new(r.approved_by.as_deref().unwrap_or("N/A")),
        ]);
    }
    table
}

fn created_date(stored: &StoredRecord) -> String {
    stored
        .created_at
        .map(|c| c.date())
        .unwrap_or(stored.record.generated_date)
        .format("%Y-%m-%d")
        .to_string()
}

const CSV_HEADERS: [&str; 8] = [
    "SOW Number",
    "SOW Name",
    "Client",
    "Project Type",
    "Status",
    "Created Date",
    "Approved Date",
    "Approved By",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    sow_number: &'a str,
    sow_name: &'a str,
    client: &'a str,
    project_type: &'static str,
    status: &'static str,
    created_date: String,
    approved_date: String,
    approved_by: &'a str,
}

impl<'a> CsvRow<'a> {
    fn from_stored(stored: &'a StoredRecord) -> Self {
        let r = &stored.record;
        Self {
            sow_number: &r.sow_number,
            sow_name: &r.sow_name,
            client: &r.client,
            project_type: r.project_type.label(),
            status: r.status.label(),
            created_date: created_date(stored),
            approved_date: r
                .approval_date
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(|d| d.chars().take(10).collect())
                .unwrap_or_else(|| "N/A".into()),
            approved_by: r.approved_by.as_deref().unwrap_or("N/A"),
        }
    }
}

/// Writes the records view as CSV. The header row is written even when `records` is empty.
pub fn write_records_csv<W: Write>(writer: W, records: &[StoredRecord]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;
    for stored in records {
        wtr.serialize(CsvRow::from_stored(stored))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_records_csv(path: &Path, records: &[StoredRecord]) -> Result<()> {
    write_records_csv(File::create(path)?, records)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatusSummary {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub value_by_type: BTreeMap<&'static str, f64>,
}

impl StatusSummary {
    pub fn from_records(records: &[StoredRecord]) -> Self {
        let mut summary = Self::default();
        for stored in records {
            let r = &stored.record;
            match r.status {
                SowStatus::PendingReview => summary.pending += 1,
                SowStatus::Approved => summary.approved += 1,
                SowStatus::Rejected => summary.rejected += 1,
                SowStatus::Draft => {}
            }
            if r.status != SowStatus::Rejected {
                *summary.value_by_type.entry(r.project_type.label()).or_insert(0.0) += r.total_value;
            }
        }
        summary
    }
}

pub fn summary_tables(summary: &StatusSummary) -> (Table, Table) {
    let mut status_table = Table::new();
    status_table.set_header(vec!["Pending Review", "Approved", "Rejected", "Total"]);
    status_table.add_row(vec![
        Cell::new(summary.pending).fg(AMBER),
        Cell::new(summary.approved).fg(GREEN),
        Cell::new(summary.rejected).fg(RED),
        Cell::new(summary.pending + summary.approved + summary.rejected).add_attribute(Attribute::Bold),
    ]);

    // Rejected SOWs are left out of the value rollup
    let mut value_table = Table::new();
    value_table.set_header(vec!["Project Type", "Value"]);
    let mut total = 0.0;
    for project_type in ProjectType::ALL {
        let value = summary.value_by_type.get(project_type.label()).copied().unwrap_or(0.0);
        total += value;
        value_table.add_row(vec![Cell::new(project_type.label()), Cell::new(format_currency(value))]);
    }
    value_table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(format_currency(total)).add_attribute(Attribute::Bold),
    ]);

    (status_table, value_table)
}
