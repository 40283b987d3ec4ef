use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use inquire::{Confirm, DateSelect, InquireError, Select, Text};

use sow_maker::calc::{self, format_currency, parse_numeric, parse_numeric_or_default};
use sow_maker::counter::SowCounter;
use sow_maker::error::Result;
use sow_maker::model::{
    DateRange, FeeBasis, MilestoneLine, ProjectType, ResourceLine, SowDraft, SowRecord, SowStatus,
};
use sow_maker::render::DocumentRenderer;
use sow_maker::report::{self, StatusSummary};
use sow_maker::settings::{
    AppSettings, StoreKind, get_config_path, load_settings_from, save_settings_to,
};
use sow_maker::store::{RecordFilter, RecordStore, StoredRecord, check_sow_number, open_store};

// ==========================================
// Constants
// ==========================================
const OTHER_CLIENT_OPT: &str = "➕ Other Client";

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "sow-maker", about = "Statement of Work generator with review workflow")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new SOW and submit it for review
    New,
    /// List submitted SOWs
    List {
        /// Pending, Approved, Rejected
        #[arg(long)]
        status: Option<SowStatus>,
        /// fixed-fee, tm, change-order
        #[arg(long = "type")]
        project_type: Option<ProjectType>,
        #[arg(long)]
        client: Option<String>,
        /// Also write the listed records to a CSV file
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
    /// Approve a pending SOW
    Approve,
    /// Reject a pending SOW
    Reject,
    /// Show status counts and value by project type
    Summary,
    /// Count working days (Mon-Fri) between two dates, inclusive
    Days {
        /// YYYY-MM-DD or MM/DD/YYYY
        start: String,
        end: String,
    },
    /// Configure data directory and record store
    Config,
    /// Open output folder
    Open,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    sow_maker::init_tracing();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        return;
    };

    // Needs no settings or data directory
    if let Commands::Days { start, end } = &command {
        show_business_days(start, end);
        return;
    }

    let config_path = get_config_path();
    let settings = match load_settings_from(&config_path) {
        Ok(Some(s)) => s,
        Ok(None) => setup_config_wizard(&config_path, None),
        Err(e) => {
            eprintln!("❌ Error: Failed to read {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    let root = settings.root();
    if let Err(e) = fs::create_dir_all(&root) {
        eprintln!("❌ Error: Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    let result = match command {
        Commands::New => create_sow(&settings, &root),
        Commands::List {
            status,
            project_type,
            client,
            csv,
        } => list_records(
            &settings,
            &root,
            RecordFilter {
                status,
                project_type,
                client,
            },
            csv.as_deref(),
        ),
        Commands::Approve => review_sow(&settings, &root, SowStatus::Approved),
        Commands::Reject => review_sow(&settings, &root, SowStatus::Rejected),
        Commands::Summary => show_summary(&settings, &root),
        Commands::Config => {
            setup_config_wizard(&config_path, Some(settings));
            Ok(())
        }
        Commands::Open => {
            let output = root.join("output");
            fs::create_dir_all(&output).ok();
            println!("🚀 Opening: {:?}", output);
            open_path(&output);
            Ok(())
        }
        Commands::Days { .. } => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Unwraps a prompt answer; Esc / Ctrl-C leaves the program quietly.
fn ask<T>(answer: std::result::Result<T, InquireError>) -> T {
    match answer {
        Ok(value) => value,
        Err(_) => {
            println!("Cancelled");
            std::process::exit(0);
        }
    }
}

fn ask_text(prompt: &str, default: &str) -> String {
    let mut text = Text::new(prompt);
    if !default.is_empty() {
        text = text.with_default(default);
    }
    ask(text.prompt()).trim().to_string()
}

fn ask_date(prompt: &str, default: NaiveDate) -> NaiveDate {
    ask(DateSelect::new(prompt).with_default(default).prompt())
}

// ==========================================
// 1. New SOW Wizard
// ==========================================

fn create_sow(settings: &AppSettings, root: &Path) -> Result<()> {
    let today = Local::now().date_naive();
    let counter = SowCounter::new(root);

    let project_type = ask(Select::new("Select Project Type:", ProjectType::ALL.to_vec()).prompt());
    let mut draft = SowDraft::new(project_type, today).with_client(select_client(settings));

    // --- Identity ---
    let auto_number = counter.peek().to_string();
    let sow_num = loop {
        let n = if project_type.uses_auto_number() {
            ask_text("SOW Number:", &auto_number)
        } else {
            ask_text("SOW Number (of the SOW being amended):", "")
        };
        match check_sow_number(&n) {
            Ok(_) => break n,
            Err(_) if n.is_empty() => println!("⚠️  Change Orders need the original SOW number."),
            Err(e) => println!("⚠️  {}", e),
        }
    };
    draft = draft
        .with_sow_number(sow_num)
        .with_sow_name(ask_text("SOW Name:", ""));

    let change_order_header = if project_type == ProjectType::ChangeOrder {
        let change_ref = ask_text("Change Order #:", "1");
        let sow_start = ask_date("Original SOW Start Date:", today);
        let sow_end = ask_date("Original SOW End Date:", sow_start);
        Some((change_ref, DateRange::new(sow_start, sow_end)))
    } else {
        None
    };

    // --- Schedule ---
    let start = ask_date("Start Date:", today);
    let end = ask_date("End Date:", start);
    if end < start {
        println!("⚠️  End Date is before Start Date; working days will count as 0.");
    }
    draft = draft.with_range(DateRange::new(start, end));
    println!(
        "📅 Total working days (Mon–Fri) between selected dates: {}",
        draft.work_days()
    );

    // --- Contacts & scope ---
    draft = draft.with_contacts(
        ask_text("Client (Project Management):", ""),
        ask_text("Service Provider (Project Management):", ""),
        ask_text("Client (Management):", ""),
        ask_text("Service Provider (Management):", ""),
    );
    println!("💡 Tip: Use '\\n' for new lines.");
    draft = draft.with_scope(
        ask_text("Scope / Responsibilities:", "").replace("\\n", "\n"),
        ask_text("Services / Deliverables:", "").replace("\\n", "\n"),
    );
    draft = draft.with_additional_personnel(ask_text("Additional Personnel:", ""));

    // --- Fees ---
    draft = match project_type {
        ProjectType::FixedFee => enter_milestones(draft, today),
        ProjectType::TimeAndMaterials => enter_resources(draft),
        ProjectType::ChangeOrder => {
            let (change_ref, original_range) = change_order_header
                .unwrap_or_else(|| (String::new(), DateRange::single(today)));
            enter_change_order_fees(draft, change_ref, original_range)
        }
    };

    let value_label = match project_type {
        ProjectType::TimeAndMaterials => "Total Contract Value",
        ProjectType::FixedFee => "Total Fixed Fee",
        ProjectType::ChangeOrder => "Difference",
    };
    println!("💰 {}: {}", value_label, format_currency(draft.total_value()));

    if !ask(Confirm::new("Generate SOW document and submit for review?").with_default(true).prompt()) {
        println!("❌ Aborted. Nothing was saved.");
        return Ok(());
    }

    generate_and_submit(settings, root, &counter, &draft, today)
}

fn select_client(settings: &AppSettings) -> String {
    let mut options = settings.clients.clone();
    options.push(OTHER_CLIENT_OPT.to_string());

    let choice = ask(Select::new("Select Client (Type to Filter):", options).prompt());
    if choice == OTHER_CLIENT_OPT {
        ask_text("Client Name:", "")
    } else {
        choice
    }
}

fn enter_milestones(draft: SowDraft, today: NaiveDate) -> SowDraft {
    let total_fee = parse_numeric_or_default(&ask_text("Fees ($):", ""), 0.0);
    let mut draft = draft.with_fee(FeeBasis::FixedFee {
        total_fee,
        milestones: Vec::new(),
    });

    println!("\n--- Milestone Schedule / Payment Breakdown ---");
    println!("(Leave Services / Deliverables empty to finish)");
    loop {
        let sequence = (draft.milestones().len() + 1).to_string();
        let default_desc = if draft.milestones().is_empty() {
            "Project Kickoff and Requirements Gathering"
        } else {
            ""
        };
        let description = ask_text(&format!("Milestone {} Services / Deliverables:", sequence), default_desc);
        if description.is_empty() {
            break;
        }

        let due_date = ask_date("Milestone Due Date:", draft.range.end.max(today));
        let allocation = parse_numeric(&ask_text("Payment Allocation (%):", ""));

        draft = draft.with_milestone(MilestoneLine {
            sequence,
            description,
            due_date: Some(due_date),
            allocation_percent: allocation,
        });

        println!("{}", report::milestone_table(total_fee, draft.milestones()));
        if let Some(note) = report::allocation_note(draft.milestones()) {
            println!("ℹ️  {}", note);
        }
    }

    println!(
        "✅ Total Net Milestone Payment: {}",
        format_currency(calc::total_milestone_payment(total_fee, draft.milestones()))
    );
    draft
}

fn enter_resources(draft: SowDraft) -> SowDraft {
    let mut draft = draft.with_fee(FeeBasis::TimeAndMaterials { resources: Vec::new() });
    let starter = ResourceLine::starter(draft.range);

    println!("\n--- Resource Details ---");
    println!("(Leave Role empty to finish)");
    loop {
        let default_role = if draft.resources().is_empty() { starter.role.as_str() } else { "" };
        let role = ask_text("Role:", default_role);
        if role.is_empty() {
            break;
        }

        let location = ask_text("Location:", &starter.location);
        let start = ask_date("Start Date:", draft.range.start);
        let end = ask_date("End Date:", draft.range.end);
        let allocation = parse_numeric(&ask_text("Allocation %:", "100"));
        let hours = parse_numeric(&ask_text("Hrs/Day:", "8"));
        let rate = parse_numeric(&ask_text("Rate/hr ($):", "150"));

        draft = draft.with_resource(ResourceLine {
            role,
            location,
            start: Some(start),
            end: Some(end),
            allocation_percent: allocation,
            hours_per_day: hours,
            rate_per_hour: rate,
        });

        println!("{}", report::resource_table(draft.resources()));
    }
    draft
}

fn enter_change_order_fees(draft: SowDraft, change_ref: String, original_range: DateRange) -> SowDraft {
    let change_order_fee = parse_numeric_or_default(&ask_text("Change Order Fees ($):", ""), 0.0);
    let original_sow_fee = parse_numeric_or_default(&ask_text("SOW Fees ($):", ""), 0.0);

    draft.with_fee(FeeBasis::ChangeOrder {
        change_ref,
        original_range,
        change_order_fee,
        original_sow_fee,
    })
}

fn generate_and_submit(
    settings: &AppSettings,
    root: &Path,
    counter: &SowCounter,
    draft: &SowDraft,
    today: NaiveDate,
) -> Result<()> {
    let renderer = DocumentRenderer::init(root)?;

    println!("\n🔨 Generating SOW document...");
    let document = renderer.write_document(draft, today)?;
    let path = document.primary_path().to_path_buf();
    if document.pdf_path.is_none() {
        println!("⚠️  PDF not compiled (is 'typst' installed?). Typst source kept.");
    }
    println!("✅ Document Generated: {:?}", path);

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| draft.file_stem());
    let record = SowRecord::from_draft(
        draft,
        &settings.created_by,
        today,
        &file_name,
        &path.to_string_lossy(),
    );

    let store = open_store(settings, root)?;
    let receipt = store.submit(&record, &path)?;
    if !receipt.success {
        println!("⚠️  The workflow did not confirm the submission (id {}).", receipt.id);
        return Ok(());
    }

    // Only consume the number if the auto-suggested one was kept
    if draft.project_type().uses_auto_number() && draft.sow_num == counter.peek().to_string() {
        counter.next()?;
    }

    println!("✅ SOW {} submitted for approval (id {}).", draft.sow_num, receipt.id);
    println!("📋 A reviewer can now run `sow-maker approve` or `sow-maker reject`.");
    open_path(&path);
    Ok(())
}

// ==========================================
// 2. Review Logic
// ==========================================

fn review_sow(settings: &AppSettings, root: &Path, decision: SowStatus) -> Result<()> {
    let store = open_store(settings, root)?;
    let pending = store.list(&RecordFilter::pending())?;
    if pending.is_empty() {
        println!("❌ No SOWs are pending review.");
        return Ok(());
    }

    println!("{}", report::records_table(&pending));
    let options: Vec<String> = pending.iter().map(describe).collect();
    let action = if decision == SowStatus::Approved { "APPROVE" } else { "REJECT" };
    let choice = ask(
        Select::new(&format!("Select SOW to {}:", action), options.clone())
            .with_page_size(10)
            .prompt(),
    );
    let Some(index) = options.iter().position(|o| *o == choice) else {
        return Ok(());
    };
    let selected = &pending[index];

    let reviewer = ask_text("Reviewer:", &settings.created_by);
    let comments = ask_text("Comments (Optional):", "");

    let updated = store.update_status(&selected.id, decision, &reviewer, &comments)?;
    match updated.record.status {
        SowStatus::Approved => println!("✅ SOW {} approved.", updated.record.sow_number),
        SowStatus::Rejected => println!("❌ SOW {} rejected.", updated.record.sow_number),
        other => println!("SOW {} is now {}.", updated.record.sow_number, other),
    }
    Ok(())
}

fn describe(stored: &StoredRecord) -> String {
    let r = &stored.record;
    format!(
        "{} | {} | {} | {} | {}",
        stored.id,
        r.sow_name,
        r.client,
        r.project_type,
        format_currency(r.total_value)
    )
}

// ==========================================
// 3. List & Summary
// ==========================================

fn list_records(
    settings: &AppSettings,
    root: &Path,
    filter: RecordFilter,
    csv: Option<&Path>,
) -> Result<()> {
    let store = open_store(settings, root)?;
    let records = store.list(&filter)?;
    println!("--- SOW Records ({} found) ---", records.len());
    if records.is_empty() {
        println!("(None found)");
    } else {
        println!("{}", report::records_table(&records));
    }
    if let Some(path) = csv {
        report::export_records_csv(path, &records)?;
        println!("📊 Exported {} record(s) to {:?}", records.len(), path);
    }
    Ok(())
}

fn show_summary(settings: &AppSettings, root: &Path) -> Result<()> {
    let store = open_store(settings, root)?;
    let records = store.list(&RecordFilter::default())?;
    if records.is_empty() {
        println!("No SOWs found.");
        return Ok(());
    }

    let summary = StatusSummary::from_records(&records);
    let (status_table, value_table) = report::summary_tables(&summary);
    println!("\n--- Review Status ---");
    println!("{status_table}");
    println!("\n--- Value by Project Type (excluding rejected) ---");
    println!("{value_table}");
    Ok(())
}

fn show_business_days(start: &str, end: &str) {
    match (calc::parse_date_or_none(start), calc::parse_date_or_none(end)) {
        (Some(s), Some(e)) => {
            println!("📅 Working days (Mon–Fri) from {} to {}: {}", s, e, calc::count_business_days(s, e));
        }
        _ => eprintln!("❌ Dates must look like 2024-01-31 or 01/31/2024."),
    }
}

// ==========================================
// 4. Config & Utilities
// ==========================================

fn setup_config_wizard(config_path: &Path, current: Option<AppSettings>) -> AppSettings {
    println!("\n⚙️  --- Configuration Setup ---");
    let mut settings = current.unwrap_or_else(|| AppSettings::new("~/Documents/SOW"));

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Root Data Directory")
        .pick_folder();

    settings.data_root = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            ask_text("Enter Root Data Directory:", &settings.data_root)
        }
    };
    settings.created_by = ask_text("Your name or email (recorded on submissions):", &settings.created_by);

    let kinds = vec!["local", "flow"];
    let starting = if settings.store == StoreKind::Flow { 1 } else { 0 };
    let kind = ask(
        Select::new("Record store:", kinds)
            .with_starting_cursor(starting)
            .prompt(),
    );
    settings.store = if kind == "flow" { StoreKind::Flow } else { StoreKind::Local };

    if settings.store == StoreKind::Flow {
        let flow = &mut settings.flow;
        flow.save_record = non_empty(ask_text("Save Record flow URL:", flow.save_record.as_deref().unwrap_or("")));
        flow.get_records = non_empty(ask_text("Get Records flow URL:", flow.get_records.as_deref().unwrap_or("")));
        flow.update_status = non_empty(ask_text("Update Status flow URL:", flow.update_status.as_deref().unwrap_or("")));
        flow.list_name = ask_text("List name:", &flow.list_name);
    }

    match save_settings_to(config_path, &settings) {
        Ok(()) => println!("✅ Settings saved."),
        Err(e) => eprintln!("❌ Failed to save settings: {}", e),
    }
    settings
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

// Helper: Open file or folder in Finder/Explorer
fn open_path(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}
