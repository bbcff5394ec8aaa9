use std::path::Path;

use forgetube_core::api::{format_timestamp, parse_script, CliError, ScriptParseError};

use super::cli::ValidateArgs;

/// Exit code for a script that parses but fails the checks.
pub const EXIT_INVALID_SCRIPT: i32 = 1;

pub fn handle_validate(args: &ValidateArgs) -> Result<i32, CliError> {
    let raw = std::fs::read_to_string(Path::new(&args.path))?;
    match check(&raw) {
        Ok(summary) => {
            println!("{}: {}", args.path, summary);
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}: {}", args.path, e);
            Ok(EXIT_INVALID_SCRIPT)
        }
    }
}

/// One line describing a valid script, or the first problem found.
pub fn check(raw: &str) -> Result<String, ScriptParseError> {
    let timeline = parse_script(raw)?;
    Ok(format!(
        "ok, {} segments, {} planned ({})",
        timeline.len(),
        format_timestamp(timeline.total_planned_duration()),
        timeline.topic
    ))
}
