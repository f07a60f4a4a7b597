//! Error reporting shared by the subcommands.

use crate::OutputFormat;
use trigscript_core::ParseError;

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Text errors print as `line:column: message`, followed by the innermost
/// cause when it differs. JSON errors are always printed, even with
/// `--quiet`.
pub(crate) fn report_parse_error(e: &ParseError, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            eprintln!("{}", format_error(e));
        }
    }
}

pub(crate) fn format_error(e: &ParseError) -> String {
    let mut text = match e.position {
        Some(pos) => format!("{}: {}", pos, e.message),
        None => e.message.clone(),
    };
    let innermost = e.innermost();
    if !std::ptr::eq(innermost, e) && innermost.message != e.message {
        text.push_str(&format!("\n  caused by: {}", innermost.message));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use trigscript_core::Position;

    #[test]
    fn text_error_has_position_prefix() {
        let e = ParseError::syntax(3, 7, "Unexpected ')'");
        assert_eq!(format_error(&e), "3:7: Unexpected ')'");
    }

    #[test]
    fn text_error_shows_innermost_cause() {
        let inner = ParseError::binding("Unknown variable: x")
            .at(Position { line: 2, column: 1 });
        let e = ParseError::wrap("f call failed", inner);
        assert_eq!(
            format_error(&e),
            "2:1: f call failed\n  caused by: Unknown variable: x"
        );
    }
}
