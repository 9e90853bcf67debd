use serde::Serialize;

use lendr_core::usecases::{ErrorKind, LendingError, LendingResult, OperationResult};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

// ============================================================================
// Operation results
// ============================================================================

/// A lending operation failed; already reported to the user
#[derive(Debug, thiserror::Error)]
#[error("{kind}: operation failed")]
pub struct CommandFailed {
    pub kind: ErrorKind,
}

impl CommandFailed {
    /// Process exit code for the failure kind
    pub fn exit_code(&self) -> u8 {
        exit_code(self.kind)
    }
}

/// Exit code per error kind; 0 is success and 1 an unclassified failure
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::InvalidInput => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Unauthorized => 4,
        ErrorKind::InvalidState => 5,
        ErrorKind::Conflict => 6,
        ErrorKind::Transient => 7,
    }
}

/// Prints an operation's outcome and turns a failure into [`CommandFailed`]
///
/// JSON output is the `{ success, message, data?, error? }` result object;
/// human output is `message` followed by whatever `render` prints.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    result: LendingResult<T>,
    message: &str,
    render: impl FnOnce(&dyn OutputFormatter, &T),
) -> anyhow::Result<()> {
    let formatter = get_formatter(format.is_json());
    let failure = result.as_ref().err().map(LendingError::kind);
    let outcome = OperationResult::from_result(result, message);

    if format.is_json() {
        formatter.print_json(&serde_json::to_value(&outcome)?);
    } else if let Some(ref data) = outcome.data {
        formatter.success(&outcome.message);
        render(formatter.as_ref(), data);
    } else {
        formatter.error(&outcome.message);
    }

    match failure {
        None => Ok(()),
        Some(kind) => Err(CommandFailed { kind }.into()),
    }
}
