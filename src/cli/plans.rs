use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{FinplanError, Result};
use crate::expense::Column;
use crate::parser::{compute_checksum, parse_file};
use crate::settings::shellexpand_path;
use crate::store::{find_term, is_duplicate_upload, list_plans, load_reference_data, record_upload};
use crate::submission::{build_plan_submission, ExpenseSink, SqliteSink};
use crate::validation::{validate_all, Check};

use super::{open_db, print_row_errors};

pub struct UploadOptions<'a> {
    pub plan_name: Option<&'a str>,
    pub dry_run: bool,
    pub json: bool,
    pub force: bool,
}

pub fn upload(file: &str, term: &str, opts: UploadOptions) -> Result<()> {
    let conn = open_db()?;
    let term = find_term(&conn, term)?;
    if !term.status.accepts_uploads() {
        return Err(FinplanError::Other(format!("Term {} is closed for uploads", term.name)));
    }

    let path = PathBuf::from(shellexpand_path(file));
    let mut rows = parse_file(&path, &Column::UPLOAD)?;
    if rows.is_empty() {
        return Err(FinplanError::Other("The file contains no expense rows".into()));
    }
    let refs = load_reference_data(&conn)?;
    let invalid = validate_all(&mut rows, Check::PLAN_UPLOAD, &refs);

    let checksum = compute_checksum(&path)?;
    if !opts.force && is_duplicate_upload(&conn, term.id, &checksum)? {
        return Err(FinplanError::DuplicateUpload(term.name));
    }

    if invalid > 0 {
        println!(
            "{} of {} rows are invalid:",
            invalid.to_string().red().bold(),
            rows.len()
        );
        print_row_errors(&rows);
        return Err(FinplanError::SubmissionBlocked(invalid));
    }

    let submission = build_plan_submission(term.id, opts.plan_name, &rows, &refs)?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&submission)?);
    }
    if opts.dry_run {
        println!("{} rows valid; dry run, nothing stored", rows.len());
        return Ok(());
    }

    let receipt = SqliteSink::new(&conn).submit_plan(&submission)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    record_upload(&conn, &filename, term.id, receipt.plan_id, rows.len(), &checksum)?;

    println!(
        "{} plan {} v{} with {} expenses into {}",
        "Uploaded".green().bold(),
        receipt.plan_name,
        receipt.version,
        receipt.expense_count,
        term.name
    );
    Ok(())
}

pub fn list(term: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let term_id = term.map(|t| find_term(&conn, t)).transpose()?.map(|t| t.id);
    let mut table = Table::new();
    table.set_header(vec!["ID", "Term", "Name", "Version", "Expenses", "Created"]);
    for plan in list_plans(&conn, term_id)? {
        table.add_row(vec![
            Cell::new(plan.id),
            Cell::new(plan.term_name),
            Cell::new(plan.name),
            Cell::new(plan.version),
            Cell::new(plan.expense_count),
            Cell::new(plan.created_at),
        ]);
    }
    println!("Plans\n{table}");
    Ok(())
}
