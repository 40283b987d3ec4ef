//! Where submitted SOWs live while they wait for review.
//!
//! The local store keeps a JSON metadata file per SOW next to a copy of the
//! generated document. The flow store forwards the same operations to the
//! workflow-automation webhooks configured in settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{Result, SowError};
use crate::model::{ProjectType, SowRecord, SowStatus};
use crate::settings::{AppSettings, FlowSettings, StoreKind};

const METADATA_SUFFIX: &str = "_metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Created", default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(rename = "DocumentPath", default)]
    pub document_path: Option<PathBuf>,
    #[serde(flatten)]
    pub record: SowRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub status: Option<SowStatus>,
    pub project_type: Option<ProjectType>,
    pub client: Option<String>,
}

impl RecordFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(SowStatus::PendingReview),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &SowRecord) -> bool {
        self.status.is_none_or(|s| s == record.status)
            && self.project_type.is_none_or(|t| t == record.project_type)
            && self
                .client
                .as_deref()
                .is_none_or(|c| c.eq_ignore_ascii_case(&record.client))
    }
}

pub trait RecordStore {
    /// Persists a new record (status Pending Review) together with its document.
    fn submit(&self, record: &SowRecord, document: &Path) -> Result<SubmitReceipt>;

    /// Records matching `filter`, newest first.
    fn list(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>>;

    /// Moves a record through the review workflow.
    fn update_status(
        &self,
        id: &str,
        status: SowStatus,
        reviewer: &str,
        comments: &str,
    ) -> Result<StoredRecord>;
}

pub fn open_store(settings: &AppSettings, root: &Path) -> Result<Box<dyn RecordStore>> {
    match settings.store {
        StoreKind::Local => Ok(Box::new(LocalStore::new(root))),
        StoreKind::Flow => Ok(Box::new(FlowStore::new(settings.flow.clone())?)),
    }
}

/// Applies a review decision. Approval stamps the date; rejection clears it.
pub fn apply_review(
    stored: &mut StoredRecord,
    status: SowStatus,
    reviewer: &str,
    comments: &str,
    now: NaiveDateTime,
) -> Result<()> {
    stored.record.status = stored.record.status.transition(status)?;
    stored.record.approved_by = Some(reviewer.to_string());
    stored.record.approval_date = match status {
        SowStatus::Approved => Some(now.format("%Y-%m-%dT%H:%M:%S").to_string()),
        _ => None,
    };
    stored.record.approver_comments = if comments.trim().is_empty() {
        None
    } else {
        Some(comments.trim().to_string())
    };
    Ok(())
}

fn sort_newest_first(records: &mut [StoredRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

// ==========================================
// Local folder store
// ==========================================

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("sow_approvals"),
        }
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{METADATA_SUFFIX}"))
    }

    /// The SOW number, suffixed `-2`, `-3`... when a change order reuses it.
    fn unique_id(&self, sow_number: &str) -> String {
        let mut id = sow_number.to_string();
        let mut n = 1;
        while self.metadata_path(&id).exists() {
            n += 1;
            id = format!("{sow_number}-{n}");
        }
        id
    }

    fn load(&self, id: &str) -> Result<StoredRecord> {
        let path = self.metadata_path(id);
        if !path.exists() {
            return Err(SowError::NotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, stored: &StoredRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(stored)?;
        fs::write(self.metadata_path(&stored.id), json)?;
        Ok(())
    }
}

/// The SOW number becomes part of a file name, so it must not address another directory.
pub fn check_sow_number(sow_number: &str) -> Result<&str> {
    let trimmed = sow_number.trim();
    if trimmed.is_empty() {
        return Err(SowError::Config("SOW number is required to submit".into()));
    }
    if trimmed.contains(['/', '\\']) || trimmed.contains("..") {
        return Err(SowError::Config(format!(
            "SOW number '{trimmed}' may not contain '/', '\\' or '..'"
        )));
    }
    Ok(trimmed)
}

impl RecordStore for LocalStore {
    fn submit(&self, record: &SowRecord, document: &Path) -> Result<SubmitReceipt> {
        let sow_number = check_sow_number(&record.sow_number)?;
        fs::create_dir_all(&self.dir)?;

        let id = self.unique_id(sow_number);
        let file_name = document
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| record.file_name.clone());
        let copy_path = self.dir.join(format!("{id}_{file_name}"));
        fs::copy(document, &copy_path)?;

        let stored = StoredRecord {
            id: id.clone(),
            created_at: Some(Local::now().naive_local()),
            document_path: Some(copy_path),
            record: SowRecord {
                status: SowStatus::PendingReview,
                ..record.clone()
            },
        };
        self.save(&stored)?;
        info!(id = %id, "SOW submitted for review");

        Ok(SubmitReceipt { success: true, id })
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            let is_metadata = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(METADATA_SUFFIX));
            if !is_metadata {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(SowError::from)
                .and_then(|c| serde_json::from_str::<StoredRecord>(&c).map_err(SowError::from));
            match parsed {
                Ok(stored) if filter.matches(&stored.record) => records.push(stored),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable SOW metadata"),
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }

    fn update_status(
        &self,
        id: &str,
        status: SowStatus,
        reviewer: &str,
        comments: &str,
    ) -> Result<StoredRecord> {
        let mut stored = self.load(id)?;
        apply_review(&mut stored, status, reviewer, comments, Local::now().naive_local())?;
        self.save(&stored)?;
        info!(id, status = %status, reviewer, "SOW review recorded");
        Ok(stored)
    }
}

// ==========================================
// Workflow webhook store
// ==========================================

pub struct FlowStore {
    settings: FlowSettings,
    client: reqwest::blocking::Client,
}

impl FlowStore {
    pub fn new(settings: FlowSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { settings, client })
    }

    fn call(&self, flow: &str, url: Option<&String>, payload: &Value) -> Result<Value> {
        let url = url.ok_or_else(|| SowError::Config(format!("no URL configured for flow '{flow}'")))?;
        debug!(flow, "calling workflow");

        let response = self.client.post(url).json(payload).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(SowError::Remote {
                flow: flow.to_string(),
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "success": true, "raw": body })))
    }
}

pub fn create_payload(record: &SowRecord) -> Result<Value> {
    Ok(json!({
        "operation": "create_sow_record",
        "sow_data": serde_json::to_value(record)?,
    }))
}

pub fn list_payload(list_name: &str, filter: &RecordFilter) -> Value {
    let mut filters = serde_json::Map::new();
    if let Some(status) = filter.status {
        filters.insert("status".into(), json!(status.label()));
    }
    if let Some(project_type) = filter.project_type {
        filters.insert("project_type".into(), json!(project_type.label()));
    }
    if let Some(client) = &filter.client {
        filters.insert("client".into(), json!(client));
    }
    json!({
        "operation": "get_items",
        "list_name": list_name,
        "filters": filters,
    })
}

pub fn update_payload(list_name: &str, stored: &StoredRecord) -> Value {
    let record = &stored.record;
    json!({
        "operation": "update_item",
        "list_name": list_name,
        "item_id": stored.id,
        "updates": {
            "status": record.status.label(),
            "approver_comments": record.approver_comments.clone().unwrap_or_default(),
            "approved_by": record.approved_by.clone().unwrap_or_default(),
            "approval_date": record.approval_date.clone().unwrap_or_default(),
        },
    })
}

/// Pulls an item id out of a create response, whichever shape the flow returns.
fn response_id(response: &Value) -> Option<String> {
    ["id", "ID", "item_id"].iter().find_map(|key| match response.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl RecordStore for FlowStore {
    fn submit(&self, record: &SowRecord, document: &Path) -> Result<SubmitReceipt> {
        let mut record = record.clone();
        if let Some(base) = &self.settings.document_base_url {
            record.document_url = format!("{}/{}", base.trim_end_matches('/'), record.file_name);
        }
        debug!(document = %document.display(), "document stays local; the flow receives its URL");

        let response = self.call(
            "save_record",
            self.settings.save_record.as_ref(),
            &create_payload(&record)?,
        )?;
        let success = response.get("success").and_then(Value::as_bool).unwrap_or(true);
        let id = response_id(&response).unwrap_or_else(|| record.sow_number.clone());
        info!(id = %id, success, "SOW sent to workflow");
        Ok(SubmitReceipt { success, id })
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        let response = self.call(
            "get_records",
            self.settings.get_records.as_ref(),
            &list_payload(&self.settings.list_name, filter),
        )?;
        let Some(items) = response.get("items").and_then(Value::as_array) else {
            warn!("workflow returned no items");
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<StoredRecord>(item.clone()) {
                Ok(stored) if filter.matches(&stored.record) => records.push(stored),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping malformed workflow item"),
            }
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    fn update_status(
        &self,
        id: &str,
        status: SowStatus,
        reviewer: &str,
        comments: &str,
    ) -> Result<StoredRecord> {
        let mut stored = self
            .list(&RecordFilter::default())?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| SowError::NotFound(id.to_string()))?;
        apply_review(&mut stored, status, reviewer, comments, Local::now().naive_local())?;

        self.call(
            "update_status",
            self.settings.update_status.as_ref(),
            &update_payload(&self.settings.list_name, &stored),
        )?;
        info!(id, status = %status, reviewer, "SOW review sent to workflow");
        Ok(stored)
    }
}
