use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::Report;

/// Matrix rows shown without `--verbose`.
const ROW_LIMIT: usize = 30;

/// Render a colored terminal report.
pub fn render(report: &Report, verbose: bool, quiet: bool) -> Result<()> {
    let summary = &report.summary;

    if quiet {
        println!(
            "Repositories: {}  Ok: {}  Errors: {}  Packages: {}",
            summary.repository_count,
            summary.success_count.to_string().green(),
            summary.error_count.to_string().red(),
            summary.package_count,
        );
        return Ok(());
    }

    println!("\n {} v{}", "depmatrix".bold(), env!("CARGO_PKG_VERSION"));

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Repositories       : {}", summary.repository_count)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Analyzed        : {:>4}", "✓".green(), summary.success_count)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Errored         : {:>4}", "✗".red(), summary.error_count)
    );
    println!(
        " │  {:<48} │",
        format!("Packages           : {}", summary.package_count)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if summary.error_count > 0 {
        println!(" {} Repositories that failed:\n", "[ERROR]".red().bold());
        render_error_table(report);
        println!();
    }

    if !report.packages.is_empty() && summary.repository_count > 0 {
        let limit = if verbose { usize::MAX } else { ROW_LIMIT };
        let (rows, truncated) = matrix_rows(report, limit);

        println!(" {} Version matrix:\n", "[MATRIX]".cyan().bold());
        render_matrix_table(report, rows);
        if truncated > 0 {
            println!(
                " … and {} more packages (use --verbose to show all)",
                truncated
            );
        }
        println!();
    }

    Ok(())
}

fn render_error_table(report: &Report) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Repository").add_attribute(Attribute::Bold),
            Cell::new("Ref").add_attribute(Attribute::Bold),
            Cell::new("Error").add_attribute(Attribute::Bold),
        ]);

    for result in report.repositories.iter().filter(|r| r.error.is_some()) {
        table.add_row(vec![
            Cell::new(result.slug()),
            Cell::new(&result.reference),
            Cell::new(result.error.as_deref().unwrap_or_default()).fg(Color::Red),
        ]);
    }

    println!("{}", table);
}

fn render_matrix_table(report: &Report, rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    let mut header = vec![Cell::new("Package").add_attribute(Attribute::Bold)];
    for result in &report.repositories {
        header.push(Cell::new(result.slug()).add_attribute(Attribute::Bold));
    }
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for row in rows {
        let cells: Vec<Cell> = row
            .iter()
            .enumerate()
            .map(|(i, value)| {
                if i > 0 && value == "-" {
                    Cell::new(value).fg(Color::DarkGrey)
                } else {
                    Cell::new(value)
                }
            })
            .collect();
        table.add_row(cells);
    }

    println!("{}", table);
}

/// Build matrix rows (package name followed by one version cell per
/// repository, `-` when absent), capped at `limit`. Returns the rows and
/// how many packages were cut off.
fn matrix_rows(report: &Report, limit: usize) -> (Vec<Vec<String>>, usize) {
    let rows: Vec<Vec<String>> = report
        .packages
        .iter()
        .take(limit)
        .map(|package| {
            let mut row = vec![package.clone()];
            for result in &report.repositories {
                row.push(
                    result
                        .dependencies
                        .get(package)
                        .cloned()
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
            row
        })
        .collect();

    let truncated = report.packages.len().saturating_sub(rows.len());
    (rows, truncated)
}
