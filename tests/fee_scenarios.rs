use chrono::{Datelike, NaiveDate, Weekday};
use pretty_assertions::assert_eq;
use serde_json::json;

use sow_maker::calc::{compute_difference, count_business_days, total_contract_value};
use sow_maker::context::build_context_value;
use sow_maker::model::{DateRange, FeeBasis, MilestoneLine, ProjectType, ResourceLine, SowDraft};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn fixed_fee_split_across_two_milestones() {
    let draft = SowDraft::new(ProjectType::FixedFee, day(2024, 1, 1))
        .with_client("BSC")
        .with_sow_number("1000")
        .with_fee(FeeBasis::FixedFee {
            total_fee: 50_000.0,
            milestones: Vec::new(),
        })
        .with_milestone(MilestoneLine {
            sequence: "1".into(),
            description: "Initial Delivery".into(),
            due_date: Some(day(2024, 2, 1)),
            allocation_percent: Some(30.0),
        })
        .with_milestone(MilestoneLine {
            sequence: "2".into(),
            description: "Final Delivery".into(),
            due_date: Some(day(2024, 3, 1)),
            allocation_percent: Some(70.0),
        });

    let ctx = build_context_value(&draft, day(2024, 1, 1)).unwrap();
    assert_eq!(ctx["milestones"][0]["net_pay"], json!(15_000.0));
    assert_eq!(ctx["milestones"][1]["net_pay"], json!(35_000.0));
    assert_eq!(ctx["milestones"][0]["net_pay_str"], json!("$15,000.00"));
    assert_eq!(ctx["milestone_total"], json!(50_000.0));
    assert_eq!(ctx["Fees"], json!("$50,000.00"));
}

#[test]
fn single_tm_resource_for_one_week() {
    let week = DateRange::new(day(2024, 1, 1), day(2024, 1, 5));
    let line = ResourceLine {
        role: "Developer".into(),
        location: "Remote".into(),
        start: Some(week.start),
        end: Some(week.end),
        allocation_percent: Some(100.0),
        hours_per_day: Some(8.0),
        rate_per_hour: Some(150.0),
    };
    assert_eq!(line.business_days(), 5);
    assert_eq!(line.estimated_cost(), 6000.0);

    let draft = SowDraft::new(ProjectType::TimeAndMaterials, day(2024, 1, 1))
        .with_range(week)
        .with_resource(line);
    let ctx = build_context_value(&draft, day(2024, 1, 1)).unwrap();
    assert_eq!(ctx["resources"][0]["Estimated $"], json!(6000.0));
    assert_eq!(ctx["currency_value"], json!(6000.0));
    assert_eq!(ctx["currency_value_str"], json!("$6,000.00"));
}

#[test]
fn half_filled_table_still_totals() {
    let week = DateRange::new(day(2024, 1, 1), day(2024, 1, 5));
    let rows = vec![
        ResourceLine::starter(week),
        ResourceLine {
            role: "Architect".into(),
            ..ResourceLine::default()
        },
        ResourceLine {
            rate_per_hour: None,
            ..ResourceLine::starter(week)
        },
    ];
    assert_eq!(total_contract_value(&rows), 6000.0);
}

#[test]
fn change_order_delta_both_directions() {
    assert_eq!(compute_difference(10_000.0, 5_000.0), 5_000.0);
    assert_eq!(compute_difference(5_000.0, 10_000.0), -5_000.0);
}

#[test]
fn single_day_counts_only_weekdays_across_a_year() {
    let mut d = day(2024, 1, 1);
    while d <= day(2024, 12, 31) {
        let expected = u32::from(!matches!(d.weekday(), Weekday::Sat | Weekday::Sun));
        assert_eq!(count_business_days(d, d), expected, "{d}");
        assert_eq!(count_business_days(d, d.pred_opt().unwrap()), 0, "{d}");
        d = d.succ_opt().unwrap();
    }
    // 2024 is a leap year starting on Monday: 262 weekdays
    assert_eq!(count_business_days(day(2024, 1, 1), day(2024, 12, 31)), 262);
}
