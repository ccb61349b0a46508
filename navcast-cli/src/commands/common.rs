//! Common types and utilities shared across CLI commands.

use std::path::Path;

use chrono::Local;
use console::style;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use navcast::engine::StatusUpdate;
use navcast::guidance::{GuidanceConsumer, GuidanceMessage};
use navcast::routing::LocalRouteFile;

use crate::error::CliError;

/// Prints guidance messages to the terminal.
pub struct ConsoleConsumer {
    label: &'static str,
}

impl ConsoleConsumer {
    /// `label` prefixes every line, e.g. "guidance" or "peer".
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl GuidanceConsumer for ConsoleConsumer {
    fn name(&self) -> &str {
        "console"
    }

    fn on_guidance(&self, message: &GuidanceMessage) {
        println!("{}", format_guidance_line(self.label, message));
    }
}

/// One terminal line for a guidance message.
pub fn format_guidance_line(label: &str, message: &GuidanceMessage) -> String {
    let mut line = format!(
        "[{}] {} {} {} {}",
        Local::now().format("%H:%M:%S"),
        style(label).dim(),
        style(message.turn.label()).cyan().bold(),
        style(&message.distance_text).yellow(),
        message.current_road,
    );
    if !message.next_road.is_empty() {
        line.push_str(&format!(" → {}", style(&message.next_road).green()));
    }
    line
}

/// Print a status update, highlighting failures.
pub fn print_status(update: &StatusUpdate) {
    if update.status.is_error() {
        eprintln!("{}", style(update).red());
    } else {
        println!("{}", style(update).bold());
    }
}

/// A token cancelled on Ctrl-C.
pub fn shutdown_token() -> Result<CancellationToken, CliError> {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down");
        handler_token.cancel();
    })
    .map_err(|e| CliError::InvalidArgument(format!("Failed to set signal handler: {}", e)))?;

    Ok(token)
}

/// Load a pre-computed route file.
pub fn load_route_file(path: &Path) -> Result<LocalRouteFile, CliError> {
    let route_file = LocalRouteFile::load(path)?;
    println!(
        "Loaded route {} ({} points, {} steps)",
        path.display(),
        route_file.route().len(),
        route_file.route().step_count()
    );
    Ok(route_file)
}

/// Line reader over a fix file, or stdin when no file is given.
///
/// Must be called from within the runtime.
pub fn open_fix_reader(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
    match path {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|error| CliError::FileRead {
                path: path.to_path_buf(),
                error,
            })?;
            Ok(Box::new(BufReader::new(tokio::fs::File::from_std(file))))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navcast::guidance::TurnCategory;

    #[test]
    fn test_guidance_line_contains_fields() {
        console::set_colors_enabled(false);
        let message = GuidanceMessage {
            turn: TurnCategory::Right,
            icon_code: TurnCategory::Right.icon_code(),
            distance_text: "200米".to_string(),
            current_road: "长安路".to_string(),
            next_road: "大雁塔南路".to_string(),
        };

        let line = format_guidance_line("guidance", &message);
        assert!(line.contains("guidance"));
        assert!(line.contains("右转"));
        assert!(line.contains("200米"));
        assert!(line.contains("长安路"));
        assert!(line.ends_with("→ 大雁塔南路"));
    }

    #[test]
    fn test_missing_fix_file_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("missing.txt");
        match open_fix_reader(Some(&path)) {
            Err(CliError::FileRead { path: p, .. }) => assert_eq!(p, path),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an error"),
        }
    }
}
