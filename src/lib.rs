use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub mod agents;
pub mod api;
pub mod assemble;
pub mod config;
pub mod entry_point;
pub mod error;
pub mod init;
pub mod orchestrator;
pub mod outline;
pub mod pipeline;
pub mod render;

pub use error::PipelineError;
pub use pipeline::{RunReport, VideoPipeline};

/// Receives every tagged progress line (`[INFO] ...`, `[WARN] ...`).
pub type ProgressLogHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static LOG_HOOK: Lazy<Mutex<Option<ProgressLogHook>>> = Lazy::new(|| Mutex::new(None));

pub fn set_log_hook(hook: Option<ProgressLogHook>) {
    if let Ok(mut guard) = LOG_HOOK.lock() {
        *guard = hook;
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{}", message),
        "ERROR" => tracing::error!("{}", message),
        _ => tracing::info!("{}", message),
    }

    if let Ok(guard) = LOG_HOOK.lock() {
        if let Some(hook) = guard.as_ref() {
            if let Ok(callback) = hook.lock() {
                let line = format!("[{}] {}", tag, message);
                callback(&line);
            }
        }
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}

pub(crate) fn loge(message: impl AsRef<str>) {
    logv("ERROR", message.as_ref());
}
