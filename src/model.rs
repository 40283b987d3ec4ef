use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calc;
use crate::error::{Result, SowError};

// ==========================================
// Project type & workflow status
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "Fixed Fee")]
    FixedFee,
    #[serde(rename = "T&M")]
    TimeAndMaterials,
    #[serde(rename = "Change Order")]
    ChangeOrder,
}

impl ProjectType {
    pub const ALL: [ProjectType; 3] = [
        ProjectType::FixedFee,
        ProjectType::TimeAndMaterials,
        ProjectType::ChangeOrder,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProjectType::FixedFee => "Fixed Fee",
            ProjectType::TimeAndMaterials => "T&M",
            ProjectType::ChangeOrder => "Change Order",
        }
    }

    /// File name of the embedded document template for this type.
    pub fn template_name(self) -> &'static str {
        match self {
            ProjectType::FixedFee => "fixed_fee.tera",
            ProjectType::TimeAndMaterials => "time_and_materials.tera",
            ProjectType::ChangeOrder => "change_order.tera",
        }
    }

    /// Change orders amend an existing SOW and reuse its number.
    pub fn uses_auto_number(self) -> bool {
        !matches!(self, ProjectType::ChangeOrder)
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed fee" | "fixed-fee" | "fixed" | "ff" => Ok(ProjectType::FixedFee),
            "t&m" | "tm" | "time-and-materials" => Ok(ProjectType::TimeAndMaterials),
            "change order" | "change-order" | "co" => Ok(ProjectType::ChangeOrder),
            other => Err(format!("unknown project type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SowStatus {
    Draft,
    #[serde(rename = "Pending Review")]
    PendingReview,
    Approved,
    Rejected,
}

impl SowStatus {
    pub fn label(self) -> &'static str {
        match self {
            SowStatus::Draft => "Draft",
            SowStatus::PendingReview => "Pending Review",
            SowStatus::Approved => "Approved",
            SowStatus::Rejected => "Rejected",
        }
    }

    pub fn can_transition(self, to: SowStatus) -> bool {
        matches!(
            (self, to),
            (SowStatus::Draft, SowStatus::PendingReview)
                | (SowStatus::PendingReview, SowStatus::Approved)
                | (SowStatus::PendingReview, SowStatus::Rejected)
        )
    }

    /// Draft -> Pending Review -> {Approved, Rejected}. Anything else is refused.
    pub fn transition(self, to: SowStatus) -> Result<SowStatus> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(SowError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for SowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SowStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(SowStatus::Draft),
            "pending" | "pending review" | "pending-review" => Ok(SowStatus::PendingReview),
            "approved" => Ok(SowStatus::Approved),
            "rejected" => Ok(SowStatus::Rejected),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

// ==========================================
// Table rows
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn business_days(&self) -> u32 {
        calc::count_business_days(self.start, self.end)
    }
}

/// One T&M staffing row. Fields stay optional while the row is being typed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLine {
    pub role: String,
    pub location: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub allocation_percent: Option<f64>,
    pub hours_per_day: Option<f64>,
    pub rate_per_hour: Option<f64>,
}

impl ResourceLine {
    /// The row the form pre-fills: a full-time remote developer over the SOW dates.
    pub fn starter(range: DateRange) -> Self {
        Self {
            role: "Developer".into(),
            location: "Remote".into(),
            start: Some(range.start),
            end: Some(range.end),
            allocation_percent: Some(100.0),
            hours_per_day: Some(8.0),
            rate_per_hour: Some(150.0),
        }
    }

    pub fn business_days(&self) -> u32 {
        match (self.start, self.end) {
            (Some(start), Some(end)) => calc::count_business_days(start, end),
            _ => 0,
        }
    }

    pub fn estimated_cost(&self) -> f64 {
        calc::estimate_resource_cost(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestoneLine {
    pub sequence: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub allocation_percent: Option<f64>,
}

impl MilestoneLine {
    pub fn net_payment(&self, total_fee: f64) -> f64 {
        calc::compute_milestone_payment(total_fee, self.allocation_percent)
    }
}

// ==========================================
// SOW draft
// ==========================================

/// Type-specific inputs; the variant decides which tables and template keys exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeeBasis {
    FixedFee {
        total_fee: f64,
        milestones: Vec<MilestoneLine>,
    },
    TimeAndMaterials {
        resources: Vec<ResourceLine>,
    },
    ChangeOrder {
        change_ref: String,
        original_range: DateRange,
        change_order_fee: f64,
        original_sow_fee: f64,
    },
}

impl FeeBasis {
    pub fn empty(project_type: ProjectType, today: NaiveDate) -> Self {
        match project_type {
            ProjectType::FixedFee => FeeBasis::FixedFee {
                total_fee: 0.0,
                milestones: Vec::new(),
            },
            ProjectType::TimeAndMaterials => FeeBasis::TimeAndMaterials { resources: Vec::new() },
            ProjectType::ChangeOrder => FeeBasis::ChangeOrder {
                change_ref: String::new(),
                original_range: DateRange::single(today),
                change_order_fee: 0.0,
                original_sow_fee: 0.0,
            },
        }
    }

    pub fn project_type(&self) -> ProjectType {
        match self {
            FeeBasis::FixedFee { .. } => ProjectType::FixedFee,
            FeeBasis::TimeAndMaterials { .. } => ProjectType::TimeAndMaterials,
            FeeBasis::ChangeOrder { .. } => ProjectType::ChangeOrder,
        }
    }
}

/// Everything one form session collects. Edits return a new value; starting
/// over means calling [`SowDraft::new`] again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SowDraft {
    pub client: String,
    pub sow_num: String,
    pub sow_name: String,
    pub range: DateRange,
    pub pm_client: String,
    pub pm_sp: String,
    pub mg_client: String,
    pub mg_sp: String,
    pub scope_text: String,
    pub ser_del: String,
    pub additional_personnel: String,
    pub fee: FeeBasis,
}

impl SowDraft {
    pub fn new(project_type: ProjectType, today: NaiveDate) -> Self {
        Self {
            client: String::new(),
            sow_num: String::new(),
            sow_name: String::new(),
            range: DateRange::single(today),
            pm_client: String::new(),
            pm_sp: String::new(),
            mg_client: String::new(),
            mg_sp: String::new(),
            scope_text: String::new(),
            ser_del: String::new(),
            additional_personnel: String::new(),
            fee: FeeBasis::empty(project_type, today),
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_sow_number(mut self, sow_num: impl Into<String>) -> Self {
        self.sow_num = sow_num.into();
        self
    }

    pub fn with_sow_name(mut self, sow_name: impl Into<String>) -> Self {
        self.sow_name = sow_name.into();
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_contacts(
        mut self,
        pm_client: impl Into<String>,
        pm_sp: impl Into<String>,
        mg_client: impl Into<String>,
        mg_sp: impl Into<String>,
    ) -> Self {
        self.pm_client = pm_client.into();
        self.pm_sp = pm_sp.into();
        self.mg_client = mg_client.into();
        self.mg_sp = mg_sp.into();
        self
    }

    pub fn with_scope(mut self, scope_text: impl Into<String>, services: impl Into<String>) -> Self {
        self.scope_text = scope_text.into();
        self.ser_del = services.into();
        self
    }

    pub fn with_additional_personnel(mut self, personnel: impl Into<String>) -> Self {
        self.additional_personnel = personnel.into();
        self
    }

    pub fn with_fee(mut self, fee: FeeBasis) -> Self {
        self.fee = fee;
        self
    }

    /// Appends a resource row. Ignored unless the draft is T&M.
    pub fn with_resource(mut self, line: ResourceLine) -> Self {
        if let FeeBasis::TimeAndMaterials { resources } = &mut self.fee {
            resources.push(line);
        }
        self
    }

    /// Appends a milestone row. Ignored unless the draft is Fixed Fee.
    pub fn with_milestone(mut self, line: MilestoneLine) -> Self {
        if let FeeBasis::FixedFee { milestones, .. } = &mut self.fee {
            milestones.push(line);
        }
        self
    }

    pub fn project_type(&self) -> ProjectType {
        self.fee.project_type()
    }

    pub fn work_days(&self) -> u32 {
        self.range.business_days()
    }

    pub fn resources(&self) -> &[ResourceLine] {
        match &self.fee {
            FeeBasis::TimeAndMaterials { resources } => resources,
            _ => &[],
        }
    }

    pub fn milestones(&self) -> &[MilestoneLine] {
        match &self.fee {
            FeeBasis::FixedFee { milestones, .. } => milestones,
            _ => &[],
        }
    }

    /// Headline value stored with the record: contract value for T&M, the
    /// fixed fee itself, or the change-order delta.
    pub fn total_value(&self) -> f64 {
        match &self.fee {
            FeeBasis::TimeAndMaterials { resources } => calc::total_contract_value(resources),
            FeeBasis::FixedFee { total_fee, .. } => calc::round_currency(*total_fee),
            FeeBasis::ChangeOrder {
                change_order_fee,
                original_sow_fee,
                ..
            } => calc::compute_difference(*change_order_fee, *original_sow_fee),
        }
    }

    pub fn file_stem(&self) -> String {
        format!("{} - {}", self.sow_num, self.sow_name)
    }
}

// ==========================================
// Persisted record
// ==========================================

const SUMMARY_LIMIT: usize = 1000;

/// Flat row handed to the record store. Field names follow the list schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SowRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "SOWNumber")]
    pub sow_number: String,
    #[serde(rename = "SOWName")]
    pub sow_name: String,
    #[serde(rename = "Client")]
    pub client: String,
    #[serde(rename = "ProjectType")]
    pub project_type: ProjectType,
    #[serde(rename = "Status")]
    pub status: SowStatus,
    #[serde(rename = "StartDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "EndDate")]
    pub end_date: NaiveDate,
    #[serde(rename = "GeneratedDate")]
    pub generated_date: NaiveDate,
    #[serde(rename = "TotalValue")]
    pub total_value: f64,
    #[serde(rename = "CreatedBy")]
    pub created_by: String,
    #[serde(rename = "ScopeSummary")]
    pub scope_summary: String,
    #[serde(rename = "ServicesDeliverables")]
    pub services_deliverables: String,
    #[serde(rename = "AdditionalPersonnel")]
    pub additional_personnel: String,
    #[serde(rename = "WorkDays")]
    pub work_days: u32,
    #[serde(rename = "DocumentURL")]
    pub document_url: String,
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "PMClient")]
    pub pm_client: String,
    #[serde(rename = "PMServiceProvider")]
    pub pm_service_provider: String,
    #[serde(rename = "ManagementClient")]
    pub management_client: String,
    #[serde(rename = "ManagementServiceProvider")]
    pub management_service_provider: String,
    #[serde(rename = "ApprovedBy", default)]
    pub approved_by: Option<String>,
    #[serde(rename = "ApprovalDate", default)]
    pub approval_date: Option<String>,
    #[serde(rename = "ApproverComments", default)]
    pub approver_comments: Option<String>,
}

impl SowRecord {
    /// Flattens a finished draft into a record awaiting review.
    pub fn from_draft(
        draft: &SowDraft,
        created_by: &str,
        generated_date: NaiveDate,
        file_name: &str,
        document_url: &str,
    ) -> Self {
        Self {
            title: draft.sow_name.clone(),
            sow_number: draft.sow_num.clone(),
            sow_name: draft.sow_name.clone(),
            client: draft.client.clone(),
            project_type: draft.project_type(),
            status: SowStatus::PendingReview,
            start_date: draft.range.start,
            end_date: draft.range.end,
            generated_date,
            total_value: draft.total_value(),
            created_by: created_by.to_string(),
            scope_summary: truncate(&draft.scope_text, SUMMARY_LIMIT),
            services_deliverables: truncate(&draft.ser_del, SUMMARY_LIMIT),
            additional_personnel: draft.additional_personnel.clone(),
            work_days: draft.work_days(),
            document_url: document_url.to_string(),
            file_name: file_name.to_string(),
            pm_client: draft.pm_client.clone(),
            pm_service_provider: draft.pm_sp.clone(),
            management_client: draft.mg_client.clone(),
            management_service_provider: draft.mg_sp.clone(),
            approved_by: None,
            approval_date: None,
            approver_comments: None,
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_row_is_empty_and_starter_is_prefilled() {
        let empty = ResourceLine::default();
        assert_eq!(empty.allocation_percent, None);
        assert_eq!(empty.estimated_cost(), 0.0);

        let week = DateRange::new(day(2024, 1, 1), day(2024, 1, 5));
        let starter = ResourceLine::starter(week);
        assert_eq!(starter.role, "Developer");
        assert_eq!(starter.location, "Remote");
        assert_eq!(starter.start, Some(day(2024, 1, 1)));
        assert_eq!(
            (starter.allocation_percent, starter.hours_per_day, starter.rate_per_hour),
            (Some(100.0), Some(8.0), Some(150.0))
        );
    }

    #[test]
    fn project_type_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&ProjectType::TimeAndMaterials).unwrap();
        assert_eq!(json, "\"T&M\"");
        let parsed: ProjectType = serde_json::from_str("\"Change Order\"").unwrap();
        assert_eq!(parsed, ProjectType::ChangeOrder);
    }

    #[test]
    fn project_type_from_cli_spelling() {
        assert_eq!("tm".parse::<ProjectType>(), Ok(ProjectType::TimeAndMaterials));
        assert_eq!("Fixed Fee".parse::<ProjectType>(), Ok(ProjectType::FixedFee));
        assert!("retainer".parse::<ProjectType>().is_err());
    }

    #[test]
    fn only_change_orders_skip_the_counter() {
        assert!(ProjectType::FixedFee.uses_auto_number());
        assert!(ProjectType::TimeAndMaterials.uses_auto_number());
        assert!(!ProjectType::ChangeOrder.uses_auto_number());
    }

    #[test]
    fn status_transitions() {
        assert_eq!(
            SowStatus::Draft.transition(SowStatus::PendingReview).unwrap(),
            SowStatus::PendingReview
        );
        assert!(SowStatus::PendingReview.can_transition(SowStatus::Approved));
        assert!(SowStatus::PendingReview.can_transition(SowStatus::Rejected));
        assert!(!SowStatus::Approved.can_transition(SowStatus::Rejected));
        assert!(!SowStatus::Draft.can_transition(SowStatus::Approved));
        assert!(matches!(
            SowStatus::Rejected.transition(SowStatus::Approved),
            Err(SowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn status_serializes_with_spaces() {
        assert_eq!(
            serde_json::to_string(&SowStatus::PendingReview).unwrap(),
            "\"Pending Review\""
        );
        assert_eq!("pending".parse::<SowStatus>(), Ok(SowStatus::PendingReview));
    }

    #[test]
    fn rows_only_attach_to_matching_fee_basis() {
        let today = day(2024, 1, 1);
        let tm = SowDraft::new(ProjectType::TimeAndMaterials, today)
            .with_resource(ResourceLine::starter(DateRange::single(today)))
            .with_milestone(MilestoneLine::default());
        assert_eq!(tm.resources().len(), 1);
        assert!(tm.milestones().is_empty());

        let ff = SowDraft::new(ProjectType::FixedFee, today)
            .with_resource(ResourceLine::default())
            .with_milestone(MilestoneLine::default());
        assert!(ff.resources().is_empty());
        assert_eq!(ff.milestones().len(), 1);
    }

    #[test]
    fn new_draft_is_a_clean_reset() {
        let today = day(2024, 3, 4);
        let edited = SowDraft::new(ProjectType::FixedFee, today)
            .with_client("Cognex")
            .with_sow_name("Vision Upgrade");
        let reset = SowDraft::new(ProjectType::FixedFee, today);
        assert_ne!(edited, reset);
        assert!(reset.client.is_empty());
        assert_eq!(reset.range, DateRange::single(today));
    }

    #[test]
    fn total_value_follows_project_type() {
        let today = day(2024, 1, 1);
        let week = DateRange::new(day(2024, 1, 1), day(2024, 1, 5));

        let tm = SowDraft::new(ProjectType::TimeAndMaterials, today)
            .with_resource(ResourceLine::starter(week));
        assert_eq!(tm.total_value(), 6000.0);

        let ff = SowDraft::new(ProjectType::FixedFee, today).with_fee(FeeBasis::FixedFee {
            total_fee: 50_000.0,
            milestones: vec![],
        });
        assert_eq!(ff.total_value(), 50_000.0);

        let co = SowDraft::new(ProjectType::ChangeOrder, today).with_fee(FeeBasis::ChangeOrder {
            change_ref: "CO-1".into(),
            original_range: week,
            change_order_fee: 5_000.0,
            original_sow_fee: 10_000.0,
        });
        assert_eq!(co.total_value(), -5_000.0);
    }

    #[test]
    fn record_truncates_long_text_and_starts_pending() {
        let draft = SowDraft::new(ProjectType::FixedFee, day(2024, 1, 1))
            .with_sow_number("1000")
            .with_sow_name("Platform")
            .with_scope("x".repeat(1500), "deliverables");
        let record = SowRecord::from_draft(&draft, "pm@example.com", day(2024, 1, 2), "a.pdf", "");

        assert_eq!(record.status, SowStatus::PendingReview);
        assert_eq!(record.scope_summary.len(), 1000);
        assert_eq!(record.services_deliverables, "deliverables");
        assert_eq!(record.work_days, 1);
        assert_eq!(draft.file_stem(), "1000 - Platform");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["SOWNumber"], "1000");
        assert_eq!(json["ProjectType"], "Fixed Fee");
        assert_eq!(json["Status"], "Pending Review");
    }
}
