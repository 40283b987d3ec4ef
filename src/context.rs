//! Builds the key/value map a document template is rendered against.
//!
//! Key names are shared with existing client templates, hence the mix of
//! snake_case and spreadsheet-style column headers.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tera::Context;

use crate::calc::{self, format_currency};
use crate::error::Result;
use crate::model::{FeeBasis, MilestoneLine, ResourceLine, SowDraft};

const LONG_DATE: &str = "%B %d, %Y";
const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Debug, Serialize)]
struct ResourceRow {
    #[serde(rename = "Role")]
    role: String,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Start Date")]
    start_date: String,
    #[serde(rename = "End Date")]
    end_date: String,
    #[serde(rename = "Allocation %")]
    allocation: f64,
    #[serde(rename = "Hrs/Day")]
    hours_per_day: f64,
    #[serde(rename = "Rate/hr ($)")]
    rate_per_hour: f64,
    #[serde(rename = "Business Days")]
    business_days: u32,
    #[serde(rename = "Estimated $")]
    estimated: f64,
    estimated_str: String,
}

impl From<&ResourceLine> for ResourceRow {
    fn from(line: &ResourceLine) -> Self {
        let estimated = line.estimated_cost();
        Self {
            role: line.role.clone(),
            location: line.location.clone(),
            start_date: iso_or_blank(line.start),
            end_date: iso_or_blank(line.end),
            allocation: line.allocation_percent.unwrap_or(0.0),
            hours_per_day: line.hours_per_day.unwrap_or(0.0),
            rate_per_hour: line.rate_per_hour.unwrap_or(0.0),
            business_days: line.business_days(),
            estimated,
            estimated_str: format_currency(estimated),
        }
    }
}

#[derive(Debug, Serialize)]
struct MilestoneRow {
    milestone_no: String,
    services: String,
    due_date: String,
    allocation: f64,
    net_pay: f64,
    net_pay_str: String,
}

impl MilestoneRow {
    fn new(line: &MilestoneLine, total_fee: f64) -> Self {
        let net_pay = line.net_payment(total_fee);
        Self {
            milestone_no: line.sequence.clone(),
            services: line.description.clone(),
            due_date: iso_or_blank(line.due_date),
            allocation: line.allocation_percent.unwrap_or(0.0),
            net_pay,
            net_pay_str: format_currency(net_pay),
        }
    }
}

fn iso_or_blank(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(ISO_DATE).to_string()).unwrap_or_default()
}

/// Full template context as JSON. Common keys first, then the keys only the
/// draft's project type defines.
pub fn build_context_value(draft: &SowDraft, generated: NaiveDate) -> Result<Value> {
    let mut map = Map::new();
    map.insert("sow_num".into(), json!(draft.sow_num));
    map.insert("sow_name".into(), json!(draft.sow_name));
    map.insert("client".into(), json!(draft.client));
    map.insert("project_type".into(), json!(draft.project_type().label()));
    map.insert("pm_client".into(), json!(draft.pm_client));
    map.insert("pm_sp".into(), json!(draft.pm_sp));
    map.insert("mg_client".into(), json!(draft.mg_client));
    map.insert("mg_sp".into(), json!(draft.mg_sp));
    map.insert("scope_text".into(), json!(draft.scope_text));
    map.insert("ser_del".into(), json!(draft.ser_del));
    map.insert("additional_personnel".into(), json!(draft.additional_personnel));
    map.insert(
        "start_date".into(),
        json!(draft.range.start.format(LONG_DATE).to_string()),
    );
    map.insert(
        "end_date".into(),
        json!(draft.range.end.format(LONG_DATE).to_string()),
    );
    map.insert(
        "generated_date".into(),
        json!(generated.format(LONG_DATE).to_string()),
    );
    map.insert("work_days".into(), json!(draft.work_days()));

    match &draft.fee {
        FeeBasis::TimeAndMaterials { resources } => {
            let rows: Vec<ResourceRow> = resources.iter().map(ResourceRow::from).collect();
            let currency_value = calc::total_contract_value(resources);
            map.insert("resources".into(), serde_json::to_value(rows)?);
            map.insert("currency_value".into(), json!(currency_value));
            map.insert(
                "currency_value_str".into(),
                json!(format_currency(currency_value)),
            );
        }
        FeeBasis::FixedFee {
            total_fee,
            milestones,
        } => {
            let rows: Vec<MilestoneRow> = milestones
                .iter()
                .map(|m| MilestoneRow::new(m, *total_fee))
                .collect();
            let milestone_total = calc::total_milestone_payment(*total_fee, milestones);
            map.insert("milestones".into(), serde_json::to_value(rows)?);
            map.insert("milestone_total".into(), json!(milestone_total));
            map.insert(
                "milestone_total_str".into(),
                json!(format_currency(milestone_total)),
            );
            map.insert("Fees".into(), json!(format_currency(*total_fee)));
        }
        FeeBasis::ChangeOrder {
            change_ref,
            original_range,
            change_order_fee,
            original_sow_fee,
        } => {
            let difference = calc::compute_difference(*change_order_fee, *original_sow_fee);
            map.insert("Change".into(), json!(change_ref));
            map.insert(
                "sow_str".into(),
                json!(original_range.start.format(LONG_DATE).to_string()),
            );
            map.insert(
                "sow_end".into(),
                json!(original_range.end.format(LONG_DATE).to_string()),
            );
            map.insert("Fees_co".into(), json!(format_currency(*change_order_fee)));
            map.insert("Fees_sow".into(), json!(format_currency(*original_sow_fee)));
            map.insert("difference".into(), json!(difference));
            map.insert("difference_str".into(), json!(format_currency(difference)));
        }
    }

    Ok(Value::Object(map))
}

pub fn build_context(draft: &SowDraft, generated: NaiveDate) -> Result<Context> {
    Ok(Context::from_value(build_context_value(draft, generated)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateRange, ProjectType};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn tm_context_carries_row_estimates_and_total() {
        let week = DateRange::new(day(2024, 1, 1), day(2024, 1, 5));
        let draft = SowDraft::new(ProjectType::TimeAndMaterials, day(2024, 1, 1))
            .with_range(week)
            .with_resource(ResourceLine::starter(week))
            .with_resource(ResourceLine {
                role: "QA".into(),
                end: None,
                ..ResourceLine::starter(week)
            });

        let ctx = build_context_value(&draft, day(2024, 1, 1)).unwrap();
        assert_eq!(ctx["resources"][0]["Estimated $"], json!(6000.0));
        assert_eq!(ctx["resources"][1]["Estimated $"], json!(0.0));
        assert_eq!(ctx["resources"][1]["End Date"], json!(""));
        assert_eq!(ctx["currency_value"], json!(6000.0));
        assert_eq!(ctx["currency_value_str"], json!("$6,000.00"));
        assert_eq!(ctx["start_date"], json!("January 01, 2024"));
        assert_eq!(ctx["work_days"], json!(5));
        assert!(ctx.get("milestones").is_none());
        assert!(ctx.get("difference").is_none());
    }

    #[test]
    fn change_order_context_has_signed_difference() {
        let draft = SowDraft::new(ProjectType::ChangeOrder, day(2024, 5, 1)).with_fee(
            FeeBasis::ChangeOrder {
                change_ref: "2".into(),
                original_range: DateRange::new(day(2024, 1, 1), day(2024, 4, 30)),
                change_order_fee: 5_000.0,
                original_sow_fee: 10_000.0,
            },
        );

        let ctx = build_context_value(&draft, day(2024, 5, 1)).unwrap();
        assert_eq!(ctx["difference"], json!(-5000.0));
        assert_eq!(ctx["difference_str"], json!("-$5,000.00"));
        assert_eq!(ctx["sow_end"], json!("April 30, 2024"));
        assert!(ctx.get("resources").is_none());
    }

    #[test]
    fn context_converts_to_tera() {
        let draft = SowDraft::new(ProjectType::FixedFee, day(2024, 1, 1)).with_sow_number("1001");
        let ctx = build_context(&draft, day(2024, 1, 1)).unwrap();
        assert_eq!(ctx.get("sow_num"), Some(&json!("1001")));
    }
}
