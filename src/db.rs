use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS departments (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    department_id INTEGER,
    role TEXT NOT NULL DEFAULT 'financial_staff',
    FOREIGN KEY (department_id) REFERENCES departments(id)
);

CREATE TABLE IF NOT EXISTS cost_types (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS currencies (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS suppliers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS terms (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'new',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS plans (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    term_id INTEGER NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (term_id) REFERENCES terms(id),
    UNIQUE (term_id, name, version)
);

CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    term_id INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (term_id) REFERENCES terms(id)
);

CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY,
    plan_id INTEGER NOT NULL,
    report_id INTEGER,
    name TEXT NOT NULL,
    cost_type_id INTEGER NOT NULL,
    unit_price REAL NOT NULL,
    amount INTEGER NOT NULL,
    project_id INTEGER NOT NULL,
    supplier_id INTEGER NOT NULL,
    pic_id INTEGER NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    currency_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'NEW',
    FOREIGN KEY (plan_id) REFERENCES plans(id),
    FOREIGN KEY (report_id) REFERENCES reports(id),
    FOREIGN KEY (cost_type_id) REFERENCES cost_types(id),
    FOREIGN KEY (project_id) REFERENCES projects(id),
    FOREIGN KEY (supplier_id) REFERENCES suppliers(id),
    FOREIGN KEY (pic_id) REFERENCES users(id),
    FOREIGN KEY (currency_id) REFERENCES currencies(id)
);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    term_id INTEGER NOT NULL,
    plan_id INTEGER,
    row_count INTEGER,
    checksum TEXT,
    uploaded_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (term_id) REFERENCES terms(id),
    FOREIGN KEY (plan_id) REFERENCES plans(id)
);
";

const DEFAULT_COST_TYPES: &[&str] = &[
    "Hardware",
    "Software",
    "Training",
    "Travel",
    "Marketing",
    "Office",
    "Outsourcing",
];

const DEFAULT_CURRENCIES: &[&str] = &["VND", "USD", "JPY", "EUR"];

const DEFAULT_DEPARTMENTS: &[&str] = &["Accounting", "Engineering", "Sales", "Human Resources"];

// (username, department, role)
const DEFAULT_USERS: &[(&str, &str, &str)] = &[("admin", "Accounting", "admin")];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    seed_names(conn, "cost_types", DEFAULT_COST_TYPES)?;
    seed_names(conn, "currencies", DEFAULT_CURRENCIES)?;
    seed_names(conn, "departments", DEFAULT_DEPARTMENTS)?;

    let users: i64 = conn.query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
    if users == 0 {
        for (username, department, role) in DEFAULT_USERS {
            conn.execute(
                "INSERT INTO users (username, department_id, role) \
                 VALUES (?1, (SELECT id FROM departments WHERE name = ?2), ?3)",
                rusqlite::params![username, department, role],
            )?;
        }
    }
    Ok(())
}

fn seed_names(conn: &Connection, table: &str, names: &[&str]) -> Result<()> {
    let count: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
    if count == 0 {
        for name in names {
            conn.execute(&format!("INSERT INTO {table} (name) VALUES (?1)"), [name])?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}

/// Adds the reference rows the upload fixtures in tests refer to.
#[cfg(test)]
pub(crate) fn seed_fixtures(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO projects (name) VALUES ('Apollo'), ('Zephyr');
         INSERT INTO suppliers (name) VALUES ('FPT Shop'), ('Amazon');
         INSERT INTO users (username, department_id, role) VALUES
            ('hoa.pt', 2, 'financial_staff'),
            ('minh.lv', 1, 'accountant');
         INSERT INTO terms (name, start_date, end_date, status)
            VALUES ('Q1 2025', '2025-01-01', '2025-03-31', 'in_progress');",
    )
    .unwrap();
}
