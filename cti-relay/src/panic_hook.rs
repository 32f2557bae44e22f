use chrono::Local;
use std::{
    backtrace::Backtrace,
    fs::OpenOptions,
    io::Write,
    panic::{PanicHookInfo, take_hook},
    path::{Path, PathBuf},
    thread,
};

use crate::logging::LOG_FILE_NAME;

/// Log panics through `tracing`, then defer to the previous hook.
///
/// With a log directory and `panic = "abort"`, the record is also appended to
/// the current daily log file, since the non-blocking writer may not flush
/// before the process aborts.
pub fn install(log_dir: Option<&Path>) {
    let log_dir = log_dir.map(Path::to_path_buf);
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let record = format_panic_record(panic_info);
            tracing::error!(target: "cti_relay::panic", "{record}");

            if let Some(dir) = log_dir.as_deref()
                && cfg!(panic = "abort")
            {
                let _ = append_panic_record(dir, &record);
            }
        }));

        previous_hook(panic_info);
    }));
}

fn daily_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!(
        "{LOG_FILE_NAME}.{}",
        Local::now().format("%Y-%m-%d")
    ))
}

fn append_panic_record(log_dir: &Path, record: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(daily_log_path(log_dir))?;
    writeln!(file, "{record}")?;
    file.flush()
}

fn format_panic_record(panic_info: &PanicHookInfo<'_>) -> String {
    let location = panic_info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "<unknown>".to_string());
    let thread_name = thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string();
    let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");

    format!(
        "{ts} PANIC thread={thread_name} location={location} payload={}\nBacktrace:\n{}",
        panic_payload(panic_info),
        Backtrace::force_capture()
    )
}

fn panic_payload(panic_info: &PanicHookInfo<'_>) -> String {
    let payload = panic_info.payload();
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        panic_info.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_log_path_matches_appender_naming() {
        let path = daily_log_path(Path::new("/var/log/cti-relay"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("cti-relay.log."));
        assert_eq!(name.len(), "cti-relay.log.".len() + "YYYY-MM-DD".len());
    }

    #[test]
    fn test_append_panic_record() {
        let dir = tempfile::tempdir().unwrap();
        append_panic_record(dir.path(), "PANIC first").unwrap();
        append_panic_record(dir.path(), "PANIC second").unwrap();

        let written = std::fs::read_to_string(daily_log_path(dir.path())).unwrap();
        assert_eq!(written, "PANIC first\nPANIC second\n");
    }
}
