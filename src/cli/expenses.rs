use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::error::Result;
use crate::expense::Column;
use crate::fmt::money;
use crate::models::{Expense, ExpenseStatus};
use crate::store::{list_expenses, ExpenseFilter};

use super::open_db;

fn status_cell(status: ExpenseStatus) -> Cell {
    let label = status.to_string();
    let styled = match status {
        ExpenseStatus::Approved => label.green().to_string(),
        ExpenseStatus::Denied => label.red().to_string(),
        ExpenseStatus::WaitingForApproval => label.yellow().to_string(),
        ExpenseStatus::New => label,
    };
    Cell::new(styled)
}

pub fn list(filter: ExpenseFilter) -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Plan", "Report", "Expense", "Cost Type", "Unit Price", "Qty", "Total", "Project", "Supplier",
        "PIC", "Status",
    ]);
    for e in list_expenses(&conn, filter)? {
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(e.plan_id),
            Cell::new(e.report_id.map(|r| r.to_string()).unwrap_or_default()),
            Cell::new(&e.name),
            Cell::new(&e.cost_type),
            Cell::new(money(e.unit_price, &e.currency)).set_alignment(CellAlignment::Right),
            Cell::new(e.amount).set_alignment(CellAlignment::Right),
            Cell::new(money(e.total(), &e.currency)).set_alignment(CellAlignment::Right),
            Cell::new(&e.project),
            Cell::new(&e.supplier),
            Cell::new(&e.pic),
            status_cell(e.status),
        ]);
    }
    println!("Expenses\n{table}");
    Ok(())
}

fn export_record(e: &Expense) -> Vec<String> {
    Column::UPLOAD
        .iter()
        .map(|col| match col {
            Column::Name => e.name.clone(),
            Column::CostType => e.cost_type.clone(),
            Column::UnitPrice => e.unit_price.to_string(),
            Column::Amount => e.amount.to_string(),
            Column::Project => e.project.clone(),
            Column::Supplier => e.supplier.clone(),
            Column::Pic => e.pic.clone(),
            Column::Notes => e.notes.clone(),
            Column::Currency => e.currency.clone(),
            Column::ExpenseCode => e.id.to_string(),
            Column::Status => e.status.code().to_string(),
        })
        .collect()
}

/// Write expenses as CSV with the upload headers, so the file can be edited
/// and uploaded again.
pub fn export(output: &str, filter: ExpenseFilter) -> Result<()> {
    let conn = open_db()?;
    let expenses = list_expenses(&conn, filter)?;
    let path = PathBuf::from(output);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(Column::UPLOAD.iter().map(|c| c.header()))?;
    for e in &expenses {
        writer.write_record(export_record(e))?;
    }
    writer.flush()?;
    println!("Exported {} expenses to {}", expenses.len(), path.display());
    Ok(())
}
