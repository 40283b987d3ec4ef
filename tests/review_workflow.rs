use std::fs;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use sow_maker::counter::SowCounter;
use sow_maker::error::SowError;
use sow_maker::model::{DateRange, ProjectType, ResourceLine, SowDraft, SowRecord, SowStatus};
use sow_maker::render::DocumentRenderer;
use sow_maker::report::StatusSummary;
use sow_maker::store::{LocalStore, RecordFilter, RecordStore};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn tm_draft(num: &str) -> SowDraft {
    let range = DateRange::new(day(2024, 1, 1), day(2024, 1, 31));
    SowDraft::new(ProjectType::TimeAndMaterials, day(2024, 1, 1))
        .with_client("Cognex")
        .with_sow_number(num)
        .with_sow_name("Vision Platform")
        .with_range(range)
        .with_scope("Build the inspection pipeline", "Weekly releases")
        .with_resource(ResourceLine::starter(range))
}

#[test]
fn generate_submit_and_approve() {
    let root = tempfile::tempdir().unwrap();
    let counter = SowCounter::new(root.path());
    let number = counter.peek().to_string();
    let draft = tm_draft(&number);

    let renderer = DocumentRenderer::init(root.path()).unwrap();
    let source = renderer.write_source(&draft, day(2024, 1, 1)).unwrap();
    let rendered = fs::read_to_string(&source).unwrap();
    // 23 weekdays * 8h * $150
    assert!(rendered.contains("$27,600.00"));

    let file_name = source.file_name().unwrap().to_string_lossy().to_string();
    let record = SowRecord::from_draft(&draft, "pm@example.com", day(2024, 1, 1), &file_name, "");
    assert_eq!(record.total_value, 27_600.0);
    assert_eq!(record.work_days, 23);

    let store = LocalStore::new(root.path());
    let receipt = store.submit(&record, &source).unwrap();
    assert!(receipt.success);
    assert_eq!(counter.next().unwrap(), 1000);

    let pending = store.list(&RecordFilter::pending()).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].record.sow_number, "1000");

    store
        .update_status(&receipt.id, SowStatus::Approved, "legal@example.com", "")
        .unwrap();
    assert!(store.list(&RecordFilter::pending()).unwrap().is_empty());

    let approved = RecordFilter {
        status: Some(SowStatus::Approved),
        ..RecordFilter::default()
    };
    let done = store.list(&approved).unwrap();
    assert_eq!(done[0].record.approved_by.as_deref(), Some("legal@example.com"));

    let summary = StatusSummary::from_records(&store.list(&RecordFilter::default()).unwrap());
    assert_eq!(summary.approved, 1);
    assert_eq!(summary.value_by_type.get("T&M"), Some(&27_600.0));
}

#[test]
fn decided_sows_cannot_be_reviewed_again() {
    let root = tempfile::tempdir().unwrap();
    let doc = root.path().join("sow.typ");
    fs::write(&doc, "= SOW").unwrap();

    let store = LocalStore::new(root.path());
    let record = SowRecord::from_draft(&tm_draft("2000"), "pm", day(2024, 1, 1), "sow.typ", "");
    let receipt = store.submit(&record, &doc).unwrap();

    store
        .update_status(&receipt.id, SowStatus::Rejected, "legal", "scope unclear")
        .unwrap();
    let err = store
        .update_status(&receipt.id, SowStatus::Approved, "legal", "")
        .unwrap_err();
    assert!(matches!(
        err,
        SowError::InvalidTransition {
            from: SowStatus::Rejected,
            to: SowStatus::Approved
        }
    ));
}
