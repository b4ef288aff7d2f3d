pub mod check;
pub mod completions;
pub mod list;
pub mod pull;
pub mod push;

use indicatif::{ProgressBar, ProgressStyle};
use skiff_core::Syncer;
use skiff_remote::Remote;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// `repo:tag` with the repo in bold and the tag in cyan.
pub fn styled_ref(repo: &str, tag: &str) -> String {
    use console::Style;
    format!(
        "{}:{}",
        Style::new().bold().apply_to(repo),
        Style::new().cyan().apply_to(tag)
    )
}

pub fn open_remote(syncer: &Syncer, def: &str) -> Result<Box<dyn Remote>, String> {
    syncer.open_remote(def).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_core::Settings;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"repo": "busybox"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"repo\""));
        assert!(result.contains("\"busybox\""));
    }

    #[test]
    fn styled_ref_keeps_text() {
        let s = console::strip_ansi_codes(&styled_ref("busybox", "latest")).into_owned();
        assert_eq!(s, "busybox:latest");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
    }

    #[test]
    fn open_remote_reports_bad_scheme() {
        let syncer = Syncer::new(Settings::default());
        let err = open_remote(&syncer, "ftp://example.com").err().unwrap();
        assert!(err.contains("unsupported remote scheme"));
    }

    #[test]
    fn spinner_lifecycle() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
