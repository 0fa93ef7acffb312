pub mod expenses;
pub mod init;
pub mod lookups;
pub mod plans;
pub mod reports;
pub mod status;
pub mod template;
pub mod terms;
pub mod users;
pub mod wizard;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{FinplanError, Result};
use crate::expense::ExpenseRow;
use crate::models::{normalize_code, LookupKind, Role};
use crate::settings::db_path;

#[derive(Parser)]
#[command(name = "finplan", about = "Expense plan uploads and reviews for finance teams.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for finplan data (default: ~/Documents/finplan)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Username acting on reviews
        #[arg(long)]
        user: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
    /// Manage budgeting terms.
    Terms {
        #[command(subcommand)]
        command: TermsCommands,
    },
    /// Upload and list expense plans.
    Plans {
        #[command(subcommand)]
        command: PlansCommands,
    },
    /// Create, list and review reports.
    Reports {
        #[command(subcommand)]
        command: ReportsCommands,
    },
    /// List or export stored expenses.
    Expenses {
        #[command(subcommand)]
        command: ExpensesCommands,
    },
    /// Manage cost types, currencies, projects, suppliers and departments.
    Lookups {
        #[command(subcommand)]
        command: LookupsCommands,
    },
    /// Manage users.
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Write an empty upload template.
    Template {
        /// Output path
        #[arg(default_value = "expense-plan-template.csv")]
        output: String,
    },
    /// Guided plan upload in the terminal.
    Wizard,
}

#[derive(Subcommand)]
pub enum TermsCommands {
    /// Add a term.
    Add {
        name: String,
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// End date: YYYY-MM-DD
        #[arg(long)]
        end: String,
    },
    /// Change a term's status: new, in_progress, closed.
    SetStatus {
        /// Term name or id
        term: String,
        status: String,
    },
    /// List all terms.
    List,
}

#[derive(Subcommand)]
pub enum PlansCommands {
    /// Upload a CSV/XLSX expense plan into a term.
    Upload {
        /// Path to CSV or XLSX file
        file: String,
        /// Term name or id
        #[arg(long)]
        term: String,
        /// Plan name (default: Plan)
        #[arg(long = "plan-name")]
        plan_name: Option<String>,
        /// Validate only, do not store anything
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Print the submission payload as JSON
        #[arg(long)]
        json: bool,
        /// Upload even if the same file was already uploaded to the term
        #[arg(long)]
        force: bool,
    },
    /// List plans.
    List {
        /// Only plans in this term (name or id)
        #[arg(long)]
        term: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportsCommands {
    /// Collect a term's unreported plan expenses into a report.
    Create {
        /// Term name or id
        #[arg(long)]
        term: String,
        /// Report name
        name: String,
    },
    /// List reports.
    List {
        /// Only reports in this term (name or id)
        #[arg(long)]
        term: Option<String>,
    },
    /// Apply an approval spreadsheet (Expense ID, Status) to a report.
    Review {
        /// Path to CSV or XLSX file
        file: String,
        /// Report id
        #[arg(long)]
        report: i64,
        /// Validate only, do not store anything
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Print the submission payload as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ExpensesCommands {
    /// List expenses.
    List {
        #[arg(long)]
        plan: Option<i64>,
        #[arg(long)]
        report: Option<i64>,
    },
    /// Export expenses to CSV in the upload layout.
    Export {
        /// Output path
        output: String,
        #[arg(long)]
        plan: Option<i64>,
        #[arg(long)]
        report: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum LookupsCommands {
    /// Add a value: cost-type, currency, project, supplier, department.
    Add { kind: String, name: String },
    /// List values of one kind, or all kinds.
    List { kind: Option<String> },
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Add a user.
    Add {
        username: String,
        /// Role: admin, accountant, financial_staff
        #[arg(long, default_value = "financial_staff")]
        role: String,
        /// Department name
        #[arg(long)]
        department: Option<String>,
    },
    /// List users.
    List,
}

pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(FinplanError::Settings(format!(
            "No database at {}. Run `finplan init` first.",
            path.display()
        )));
    }
    get_connection(&path)
}

pub(crate) fn parse_lookup_kind(raw: &str) -> Result<LookupKind> {
    let key = normalize_code(raw);
    LookupKind::ALL
        .into_iter()
        .find(|k| normalize_code(k.label()) == key || normalize_code(k.table()) == key)
        .ok_or_else(|| FinplanError::Other(format!("Unknown lookup kind: {raw}")))
}

pub(crate) fn parse_role(raw: &str) -> Result<Role> {
    Role::from_code(raw).ok_or_else(|| FinplanError::Other(format!("Unknown role: {raw}")))
}

/// Print each invalid row with its field errors.
pub(crate) fn print_row_errors(rows: &[ExpenseRow]) {
    for row in rows.iter().filter(|r| !r.is_valid()) {
        let Some(validation) = &row.validation else {
            println!("  {} not validated", format!("Row {}", row.id).red().bold());
            continue;
        };
        for (column, err) in &validation.field_errors {
            println!(
                "  {} {}: {}",
                format!("Row {}", row.id).red().bold(),
                column.header(),
                err.message
            );
        }
    }
}
