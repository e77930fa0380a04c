//! Classify command handler.

use conductor_core::{Severity, StreamOrigin, classify};
use console::style;

/// Print the severity the supervisor would assign to `line`.
pub fn execute(line: &str, stderr: bool) {
    let origin = if stderr {
        StreamOrigin::Stderr
    } else {
        StreamOrigin::Stdout
    };
    let severity = classify(line, origin);
    let label = match severity {
        Severity::Error => style(severity.as_str()).red().bold(),
        Severity::Warning => style(severity.as_str()).yellow(),
        Severity::Success => style(severity.as_str()).green(),
        Severity::Info => style(severity.as_str()).cyan(),
    };
    println!("{label} ({})", origin.as_str());
}
