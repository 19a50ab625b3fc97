use std::path::PathBuf;

use bankreg_cli::types::{BatchSummary, RunResult, ValidateResult};
use bankreg_model::{BatchStatus, ValidationError};
use bankreg_standards::VerifySummary;
use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum IssueKind {
    Gap,
    Structural,
    DataQuality,
    Annotation,
}

struct Issue {
    batch: String,
    kind: IssueKind,
    location: String,
    code: String,
    message: String,
}

pub fn print_summary(result: &RunResult) {
    println!("Standards: {}", result.standards_dir.display());
    println!("Output: {}", result.output_dir.display());
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Batch"),
        header_cell("Status"),
        header_cell("Records"),
        header_cell("Canonical"),
        header_cell("Excluded"),
        header_cell("DQ Errors"),
        header_cell("Schema Errors"),
        header_cell("Report"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 2..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    align_column(&mut table, 7, CellAlignment::Center);

    let mut compliant = 0usize;
    for batch in &result.batches {
        let outcome = &batch.outcome;
        if outcome.is_compliant() {
            compliant += 1;
        }
        table.add_row(vec![
            Cell::new(&batch.batch_id)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            status_cell(outcome.status),
            Cell::new(batch.source_records),
            Cell::new(outcome.canonical_count),
            count_cell(outcome.excluded_count, Color::Yellow),
            count_cell(outcome.data_quality_errors.len(), Color::Red),
            count_cell(outcome.validation_errors.len(), Color::Red),
            output_cell(batch.report.as_ref()),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{compliant}/{} compliant", result.batches.len()))
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(result.batches.iter().map(|b| b.source_records).sum::<usize>())
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    println!("{table}");
    print_issue_table(&result.batches);
    if !result.errors.is_empty() {
        eprintln!("Errors:");
        for error in &result.errors {
            eprintln!("- {error}");
        }
    }
}

fn print_issue_table(batches: &[BatchSummary]) {
    let mut issues = Vec::new();
    for batch in batches {
        collect_issues(batch, &mut issues);
    }
    if issues.is_empty() {
        return;
    }
    issues.sort_by(|a, b| a.batch.cmp(&b.batch).then(a.kind.cmp(&b.kind)));
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Batch"),
        header_cell("Kind"),
        header_cell("Location"),
        header_cell("Code"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for issue in issues {
        table.add_row(vec![
            Cell::new(issue.batch),
            kind_cell(issue.kind),
            Cell::new(issue.location),
            Cell::new(issue.code),
            Cell::new(issue.message),
        ]);
    }
    println!();
    println!("Issues:");
    println!("{table}");
}

fn collect_issues(batch: &BatchSummary, issues: &mut Vec<Issue>) {
    let outcome = &batch.outcome;
    if let Some(gap) = &outcome.structural_gap {
        issues.push(Issue {
            batch: batch.batch_id.clone(),
            kind: IssueKind::Gap,
            location: gap.path.clone(),
            code: "structural-gap".to_string(),
            message: gap.to_string(),
        });
    }
    for error in &outcome.validation_errors {
        issues.push(validation_issue(&batch.batch_id, error));
    }
    for error in &outcome.data_quality_errors {
        issues.push(Issue {
            batch: batch.batch_id.clone(),
            kind: IssueKind::DataQuality,
            location: record_location(&error.section, error.row.0, error.field.as_deref()),
            code: error.rule.clone(),
            message: error.message.clone(),
        });
    }
    for annotation in &outcome.annotations {
        issues.push(Issue {
            batch: batch.batch_id.clone(),
            kind: IssueKind::Annotation,
            location: record_location(
                &annotation.section,
                annotation.row.0,
                annotation.annotation.field.as_deref(),
            ),
            code: annotation.annotation.rule.clone(),
            message: annotation.annotation.message.clone(),
        });
    }
}

fn validation_issue(batch: &str, error: &ValidationError) -> Issue {
    Issue {
        batch: batch.to_string(),
        kind: IssueKind::Structural,
        location: error.location.to_string(),
        code: error.code().to_string(),
        message: error.message.clone(),
    }
}

fn record_location(section: &str, row: usize, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("{section} row {row} {field}"),
        None => format!("{section} row {row}"),
    }
}

pub fn print_validation(result: &ValidateResult) {
    println!("Document: {}", result.path.display());
    println!("Root: {}", result.root_element);
    if result.is_valid() {
        println!("Conformant: no validation errors");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Location"),
        header_cell("Code"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    for error in &result.errors {
        table.add_row(vec![
            Cell::new(error.location.to_string()),
            Cell::new(error.code()).fg(Color::Red),
            Cell::new(&error.message),
        ]);
    }
    println!("{table}");
    eprintln!("{} validation error(s)", result.errors.len());
}

pub fn print_standards(summary: &VerifySummary) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Item"), header_cell("Value")]);
    apply_table_style(&mut table);
    let rows = [
        ("Directory", summary.standards_dir.display().to_string()),
        ("Files verified", summary.file_count.to_string()),
        ("Root element", summary.root_element.clone()),
        (
            "Namespace",
            summary
                .target_namespace
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Elements", summary.element_count.to_string()),
        ("Sections", summary.section_count.to_string()),
        ("Vocabularies", summary.vocabulary_count.to_string()),
        ("Batch key", summary.batch_key.clone()),
        (
            "Rules",
            summary
                .rules_file
                .as_ref()
                .map_or_else(|| "-".to_string(), |path| path.display().to_string()),
        ),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    println!("{table}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
    if table.column_count() >= 8 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Percentage(25)),
            ColumnConstraint::LowerBoundary(Width::Fixed(12)),
            ColumnConstraint::LowerBoundary(Width::Fixed(7)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::LowerBoundary(Width::Fixed(13)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
        ]);
    }
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(180);
    if table.column_count() >= 5 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(18)),
            ColumnConstraint::UpperBoundary(Width::Fixed(12)),
            ColumnConstraint::UpperBoundary(Width::Percentage(30)),
            ColumnConstraint::UpperBoundary(Width::Fixed(28)),
            ColumnConstraint::UpperBoundary(Width::Percentage(45)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn status_cell(status: BatchStatus) -> Cell {
    let cell = Cell::new(status.as_str()).add_attribute(Attribute::Bold);
    match status {
        BatchStatus::Compliant => cell.fg(Color::Green),
        BatchStatus::RejectedDataQuality | BatchStatus::RejectedStructural => cell.fg(Color::Red),
        BatchStatus::Aborted => cell.fg(Color::Magenta),
    }
}

fn kind_cell(kind: IssueKind) -> Cell {
    match kind {
        IssueKind::Gap => Cell::new("GAP")
            .fg(Color::Magenta)
            .add_attribute(Attribute::Bold),
        IssueKind::Structural => Cell::new("SCHEMA").fg(Color::Red),
        IssueKind::DataQuality => Cell::new("DATA").fg(Color::Red),
        IssueKind::Annotation => Cell::new("NOTE").fg(Color::Yellow),
    }
}

fn output_cell(path: Option<&PathBuf>) -> Cell {
    match path {
        Some(_) => Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
        None => dim_cell("-"),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
