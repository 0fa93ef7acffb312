use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{FinplanError, Result};
use crate::settings::{load_settings, shellexpand_path};
use crate::store::{create_report, find_report, find_term, find_user, list_reports};
use crate::submission::{build_review_submission, ExpenseSink, SqliteSink};
use crate::workflow::{ensure_reviewer, prepare_review};

use super::{open_db, print_row_errors};

pub fn create(term: &str, name: &str) -> Result<()> {
    let conn = open_db()?;
    let term = find_term(&conn, term)?;
    let id = create_report(&conn, &term, name)?;
    let report = find_report(&conn, id)?;
    println!(
        "Created report #{} ({}) with {} expenses awaiting approval",
        report.id, report.name, report.expense_count
    );
    Ok(())
}

pub fn list(term: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let term_id = term.map(|t| find_term(&conn, t)).transpose()?.map(|t| t.id);
    let mut table = Table::new();
    table.set_header(vec!["ID", "Term", "Name", "Expenses", "Created"]);
    for report in list_reports(&conn, term_id)? {
        table.add_row(vec![
            Cell::new(report.id),
            Cell::new(report.term_name),
            Cell::new(report.name),
            Cell::new(report.expense_count),
            Cell::new(report.created_at),
        ]);
    }
    println!("Reports\n{table}");
    Ok(())
}

pub fn review(file: &str, report_id: i64, dry_run: bool, json: bool) -> Result<()> {
    let conn = open_db()?;
    let settings = load_settings();
    let user = if settings.user_name.is_empty() {
        None
    } else {
        find_user(&conn, &settings.user_name)?
    };
    ensure_reviewer(user.as_ref())?;

    let report = find_report(&conn, report_id)?;
    let path = PathBuf::from(shellexpand_path(file));
    let rows = prepare_review(&conn, &report, &path)?;
    if rows.is_empty() {
        return Err(FinplanError::Other("The file contains no review rows".into()));
    }
    let invalid = rows.iter().filter(|r| !r.is_valid()).count();
    if invalid > 0 {
        println!(
            "{} of {} rows are invalid:",
            invalid.to_string().red().bold(),
            rows.len()
        );
        print_row_errors(&rows);
        return Err(FinplanError::SubmissionBlocked(invalid));
    }

    let submission = build_review_submission(report.id, &rows)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&submission)?);
    }
    if dry_run {
        println!("{} rows valid; dry run, nothing stored", rows.len());
        return Ok(());
    }
    let updated = SqliteSink::new(&conn).submit_review(&submission)?;
    println!("{} {updated} expenses in report {}", "Reviewed".green().bold(), report.name);
    Ok(())
}
