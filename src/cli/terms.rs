use comfy_table::{Cell, Table};

use crate::error::{FinplanError, Result};
use crate::models::TermStatus;
use crate::store::{add_term, find_term, set_term_status, term_summaries};

use super::open_db;

pub fn add(name: &str, start: &str, end: &str) -> Result<()> {
    let conn = open_db()?;
    let id = add_term(&conn, name, start, end)?;
    println!("Added term #{id}: {name}");
    Ok(())
}

pub fn set_status(key: &str, status: &str) -> Result<()> {
    let conn = open_db()?;
    let term = find_term(&conn, key)?;
    let status = TermStatus::from_code(status)
        .ok_or_else(|| FinplanError::Other(format!("Unknown term status: {status}")))?;
    set_term_status(&conn, term.id, status)?;
    println!("Term {} is now {status}", term.name);
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Start", "End", "Status", "Plans"]);
    for s in term_summaries(&conn)? {
        table.add_row(vec![
            Cell::new(s.term.id),
            Cell::new(&s.term.name),
            Cell::new(&s.term.start_date),
            Cell::new(&s.term.end_date),
            Cell::new(s.term.status),
            Cell::new(s.plan_count),
        ]);
    }
    println!("Terms\n{table}");
    Ok(())
}
