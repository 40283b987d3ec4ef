//! Statement of Work generator: schedule and fee arithmetic, document
//! rendering and a pending/approved review workflow.

pub mod calc;
pub mod context;
pub mod counter;
pub mod error;
pub mod model;
pub mod render;
pub mod report;
pub mod settings;
pub mod store;

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT_TRACING: Once = Once::new();

/// Installs the global subscriber once. Filter comes from `SOW_LOG`, default `warn`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env("SOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt().with_env_filter(filter).with_target(false).init();
    });
}
