use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDate;
use slug::slugify;
use tera::Tera;
use tracing::{debug, info, warn};

use crate::context::build_context;
use crate::error::{Result, SowError};
use crate::model::{ProjectType, SowDraft};

// Embedded at compile time so a fresh data root always has something to render
const FIXED_FEE_TEMPLATE: &str = include_str!("../templates/fixed_fee.tera");
const TM_TEMPLATE: &str = include_str!("../templates/time_and_materials.tera");
const CHANGE_ORDER_TEMPLATE: &str = include_str!("../templates/change_order.tera");

fn default_template(project_type: ProjectType) -> &'static str {
    match project_type {
        ProjectType::FixedFee => FIXED_FEE_TEMPLATE,
        ProjectType::TimeAndMaterials => TM_TEMPLATE,
        ProjectType::ChangeOrder => CHANGE_ORDER_TEMPLATE,
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub source_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
}

impl RenderedDocument {
    /// The PDF when typst produced one, otherwise the Typst source.
    pub fn primary_path(&self) -> &Path {
        self.pdf_path.as_deref().unwrap_or(&self.source_path)
    }
}

pub struct DocumentRenderer {
    root: PathBuf,
    tera: Tera,
}

impl DocumentRenderer {
    /// Loads `<root>/templates/*.tera`, seeding any missing default first so
    /// users can edit the copies on disk.
    pub fn init(root: &Path) -> Result<Self> {
        let template_dir = root.join("templates");
        fs::create_dir_all(&template_dir)?;

        for project_type in ProjectType::ALL {
            let path = template_dir.join(project_type.template_name());
            if !path.exists() {
                info!(template = %path.display(), "initializing default template");
                fs::write(&path, default_template(project_type))?;
            }
        }

        let pattern = template_dir.join("*.tera");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| SowError::Config(format!("non UTF-8 template path {pattern:?}")))?;
        let tera = Tera::new(pattern)?;

        Ok(Self {
            root: root.to_path_buf(),
            tera,
        })
    }

    pub fn render(&self, draft: &SowDraft, generated: NaiveDate) -> Result<String> {
        let context = build_context(draft, generated)?;
        let template = draft.project_type().template_name();
        debug!(template, sow = %draft.sow_num, "rendering SOW");
        Ok(self.tera.render(template, &context)?)
    }

    /// `<root>/output/<year>/<client>/`
    pub fn output_dir(&self, draft: &SowDraft, generated: NaiveDate) -> PathBuf {
        let client = if draft.client.trim().is_empty() {
            "unassigned".to_string()
        } else {
            slugify(&draft.client)
        };
        self.root
            .join("output")
            .join(generated.format("%Y").to_string())
            .join(client)
    }

    /// Writes the `.typ` source without compiling it.
    pub fn write_source(&self, draft: &SowDraft, generated: NaiveDate) -> Result<PathBuf> {
        let rendered = self.render(draft, generated)?;
        let output_dir = self.output_dir(draft, generated);
        fs::create_dir_all(&output_dir)?;

        let path = output_dir.join(format!("{}.typ", file_base(draft)));
        fs::write(&path, rendered)?;
        info!(path = %path.display(), "wrote SOW source");
        Ok(path)
    }

    /// Writes the source and compiles it with `typst` when it is installed.
    pub fn write_document(&self, draft: &SowDraft, generated: NaiveDate) -> Result<RenderedDocument> {
        let source_path = self.write_source(draft, generated)?;
        let pdf_path = compile_pdf(&source_path);
        Ok(RenderedDocument {
            source_path,
            pdf_path,
        })
    }
}

/// `1001_platform-rollout`. Both halves are slugified, so a typed number
/// such as `SOW/2024/7` cannot introduce path separators.
pub fn file_base(draft: &SowDraft) -> String {
    let num = slugify(&draft.sow_num);
    let name = slugify(&draft.sow_name);
    match (num.is_empty(), name.is_empty()) {
        (false, false) => format!("{num}_{name}"),
        (false, true) => num,
        (true, false) => name,
        (true, true) => "sow".to_string(),
    }
}

fn compile_pdf(source: &Path) -> Option<PathBuf> {
    if Command::new("typst").arg("--version").output().is_err() {
        warn!("typst is not installed; keeping the .typ source only");
        return None;
    }

    let pdf_path = source.with_extension("pdf");
    match Command::new("typst")
        .arg("compile")
        .arg(source)
        .arg(&pdf_path)
        .status()
    {
        Ok(status) if status.success() => Some(pdf_path),
        Ok(status) => {
            warn!(%status, source = %source.display(), "typst compilation failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "could not launch typst");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateRange, FeeBasis, MilestoneLine, ResourceLine};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn init_seeds_all_templates() {
        let dir = tempfile::tempdir().unwrap();
        DocumentRenderer::init(dir.path()).unwrap();
        for project_type in ProjectType::ALL {
            assert!(dir.path().join("templates").join(project_type.template_name()).exists());
        }
    }

    #[test]
    fn edited_template_on_disk_wins() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("fixed_fee.tera"), "custom {{ sow_num }}").unwrap();

        let renderer = DocumentRenderer::init(dir.path()).unwrap();
        let draft = SowDraft::new(ProjectType::FixedFee, day(2024, 1, 1)).with_sow_number("1042");
        assert_eq!(renderer.render(&draft, day(2024, 1, 1)).unwrap(), "custom 1042");
    }

    #[test]
    fn renders_each_project_type() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = DocumentRenderer::init(dir.path()).unwrap();
        let week = DateRange::new(day(2024, 1, 1), day(2024, 1, 5));

        let tm = SowDraft::new(ProjectType::TimeAndMaterials, day(2024, 1, 1))
            .with_sow_number("1000")
            .with_sow_name("Data \"Lake\" #2")
            .with_range(week)
            .with_resource(ResourceLine::starter(week));
        let out = renderer.render(&tm, day(2024, 1, 1)).unwrap();
        assert!(out.contains("$6,000.00"));
        assert!(out.contains(r#""Data \"Lake\" #2""#));

        let ff = SowDraft::new(ProjectType::FixedFee, day(2024, 1, 1)).with_fee(FeeBasis::FixedFee {
            total_fee: 50_000.0,
            milestones: vec![MilestoneLine {
                sequence: "1".into(),
                description: "Kickoff".into(),
                due_date: Some(day(2024, 1, 15)),
                allocation_percent: Some(30.0),
            }],
        });
        let out = renderer.render(&ff, day(2024, 1, 1)).unwrap();
        assert!(out.contains("$15,000.00"));

        let co = SowDraft::new(ProjectType::ChangeOrder, day(2024, 1, 1)).with_fee(FeeBasis::ChangeOrder {
            change_ref: "3".into(),
            original_range: week,
            change_order_fee: 12_000.0,
            original_sow_fee: 10_000.0,
        });
        let out = renderer.render(&co, day(2024, 1, 1)).unwrap();
        assert!(out.contains("$2,000.00"));
    }

    #[test]
    fn source_lands_under_year_and_client() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = DocumentRenderer::init(dir.path()).unwrap();
        let draft = SowDraft::new(ProjectType::FixedFee, day(2024, 6, 1))
            .with_client("Abiomed")
            .with_sow_number("1005")
            .with_sow_name("Platform Rollout");

        let path = renderer.write_source(&draft, day(2024, 6, 1)).unwrap();
        assert_eq!(
            path,
            dir.path().join("output/2024/abiomed/1005_platform-rollout.typ")
        );
        assert!(path.exists());
    }

    #[test]
    fn slashes_in_sow_number_stay_in_the_client_folder() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = DocumentRenderer::init(dir.path()).unwrap();
        let draft = SowDraft::new(ProjectType::ChangeOrder, day(2024, 6, 1))
            .with_client("BSC")
            .with_sow_number("SOW/2024/7")
            .with_sow_name("Scope Change");

        let path = renderer.write_source(&draft, day(2024, 6, 1)).unwrap();
        assert_eq!(path, dir.path().join("output/2024/bsc/sow-2024-7_scope-change.typ"));
        assert!(path.exists());
        assert_eq!(file_base(&SowDraft::new(ProjectType::FixedFee, day(2024, 6, 1))), "sow");
    }
}
