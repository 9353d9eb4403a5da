//! Output formatting and styling module.
//!
//! Renders pass reports and the category table for the terminal with
//! consistent coloring. Logging goes through `tracing`; this module is only
//! for what the user asked to see.

use crate::category::CategoryMap;
use crate::organizer::PassReport;
use colored::*;
use std::collections::BTreeMap;

/// Manages CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints every move, unclassified file, and failure of a pass, then a summary.
    pub fn pass_report(report: &PassReport) {
        if report.dry_run {
            Self::dry_run_notice(&format!(
                "Planned organization of {}",
                report.root.display()
            ));
        } else {
            Self::info(&format!("Organized {}", report.root.display()));
        }

        for folder in &report.created_folders {
            Self::success(&format!("Created {}", folder.display()));
        }

        for moved in &report.moved {
            let name = moved
                .from
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let target = moved
                .to
                .strip_prefix(&report.root)
                .unwrap_or(&moved.to)
                .display()
                .to_string();
            if report.dry_run {
                println!(" - {} {} {}", name, "→ would move to".yellow(), target);
            } else {
                Self::success(&format!("{} → {}", name, target));
            }
        }

        if !report.skipped.is_empty() {
            Self::header("Unclassified (left in place)");
            for path in &report.skipped {
                println!(" - {}", path.display());
            }
        }

        if !report.failures.is_empty() {
            Self::header("Failures");
            for failure in &report.failures {
                match &failure.destination {
                    Some(dest) => Self::error(&format!(
                        "{} → {}: {}",
                        failure.path.display(),
                        dest.display(),
                        failure.cause
                    )),
                    None => Self::error(&format!("{}: {}", failure.path.display(), failure.cause)),
                }
            }
        }

        Self::summary_table(&report.counts_by_category(), report.moved_count());
        println!(
            "{} unclassified, {} failed",
            report.skipped_count(),
            if report.is_clean() {
                report.failed_count().to_string().green()
            } else {
                report.failed_count().to_string().red()
            }
        );
    }

    /// Prints a summary table with file counts by category.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_category_len = category_counts
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in category_counts {
            let file_word = if *count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word,
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            if total_files == 1 { "file" } else { "files" },
            width = max_category_len
        );
    }

    /// Prints the category table in classification order.
    pub fn category_table(categories: &CategoryMap) {
        Self::header("CATEGORIES");
        for (i, category) in categories.iter().enumerate() {
            let extensions: Vec<_> = category.extensions().collect();
            println!(
                "{:>2}. {} {}",
                i + 1,
                category.name().bold(),
                extensions.join(" ").dimmed()
            );
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
