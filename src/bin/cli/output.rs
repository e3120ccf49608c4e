//! Output formatting for CLI operations.

use serde_json::json;
use std::path::Path;
use zipmerge::{ExtractResult, UpdateResult};

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats a list of entry names
    fn format_list(&self, names: &[String]) -> String;

    /// Formats update results
    fn format_update_result(&self, archive: &Path, result: &UpdateResult) -> String;

    /// Formats extraction results
    fn format_extract_result(&self, result: &ExtractResult) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_list(&self, names: &[String]) -> String {
        let mut output = String::new();
        let mut dir_count = 0;

        for name in names {
            if name.ends_with('/') {
                dir_count += 1;
            }
            output.push_str(name);
            output.push('\n');
        }

        output.push_str(&"-".repeat(70));
        output.push('\n');
        output.push_str(&format!(
            "{} files, {} directories\n",
            names.len() - dir_count,
            dir_count
        ));
        output
    }

    fn format_update_result(&self, archive: &Path, result: &UpdateResult) -> String {
        let action = if result.merged { "Updated" } else { "Created" };
        format!(
            "{} {}: {} entries ({} files, {} directories, {})\n",
            action,
            archive.display(),
            result.entries_written,
            result.files_written,
            result.directories_written,
            humanize_bytes(result.bytes_written)
        )
    }

    fn format_extract_result(&self, result: &ExtractResult) -> String {
        format!(
            "Extracted {} files ({})\n",
            result.files_extracted,
            humanize_bytes(result.bytes_extracted)
        )
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_list(&self, names: &[String]) -> String {
        let items: Vec<_> = names
            .iter()
            .map(|name| {
                json!({
                    "path": name,
                    "is_directory": name.ends_with('/'),
                })
            })
            .collect();

        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string()) + "\n"
    }

    fn format_update_result(&self, archive: &Path, result: &UpdateResult) -> String {
        let obj = json!({
            "archive": archive.display().to_string(),
            "merged": result.merged,
            "entries_written": result.entries_written,
            "files_written": result.files_written,
            "directories_written": result.directories_written,
            "symlinks_written": result.symlinks_written,
            "bytes_written": result.bytes_written,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string()) + "\n"
    }

    fn format_extract_result(&self, result: &ExtractResult) -> String {
        let obj = json!({
            "entries_extracted": result.entries_extracted(),
            "files_extracted": result.files_extracted,
            "directories_extracted": result.directories_extracted,
            "symlinks_extracted": result.symlinks_extracted,
            "bytes_extracted": result.bytes_extracted,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string()) + "\n"
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
