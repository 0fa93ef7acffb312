use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{FinplanError, Result};
use crate::models::{
    Expense, ExpenseStatus, Lookup, LookupKind, Plan, Report, Role, Term, TermStatus, User,
};
use crate::validation::ReferenceData;

fn stored_code<T>(idx: usize, raw: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown stored code: {raw}").into(),
        )
    })
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

pub fn list_lookups(conn: &Connection, kind: LookupKind) -> Result<Vec<Lookup>> {
    let mut stmt = conn.prepare(&format!("SELECT id, name FROM {} ORDER BY name", kind.table()))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Lookup {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn add_lookup(conn: &Connection, kind: LookupKind, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FinplanError::Other(format!("{} name is required", kind.label())));
    }
    conn.execute(
        &format!("INSERT INTO {} (name) VALUES (?1)", kind.table()),
        [name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_lookup(conn: &Connection, kind: LookupKind, name: &str) -> Result<i64> {
    conn.query_row(
        &format!("SELECT id FROM {} WHERE lower(name) = lower(?1)", kind.table()),
        [name.trim()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| FinplanError::UnknownLookup {
        kind: kind.label().to_string(),
        name: name.to_string(),
    })
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, d.name, u.role FROM users u \
         LEFT JOIN departments d ON u.department_id = d.id ORDER BY u.username",
    )?;
    let rows = stmt
        .query_map([], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        department: row.get(2)?,
        role: stored_code(3, &role, Role::from_code)?,
    })
}

pub fn find_user(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT u.id, u.username, d.name, u.role FROM users u \
             LEFT JOIN departments d ON u.department_id = d.id WHERE lower(u.username) = lower(?1)",
            [username.trim()],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn add_user(conn: &Connection, username: &str, role: Role, department: Option<&str>) -> Result<i64> {
    let department_id = department
        .map(|d| find_lookup(conn, LookupKind::Department, d))
        .transpose()?;
    conn.execute(
        "INSERT INTO users (username, department_id, role) VALUES (?1, ?2, ?3)",
        rusqlite::params![username.trim(), department_id, role.code()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Everything the plan upload checks resolve names against.
pub fn load_reference_data(conn: &Connection) -> Result<ReferenceData> {
    let mut refs = ReferenceData::default();
    for kind in LookupKind::ALL {
        for lookup in list_lookups(conn, kind)? {
            refs.insert(kind, &lookup.name, lookup.id);
        }
    }
    for user in list_users(conn)? {
        refs.insert_user(&user.username, user.id);
    }
    Ok(refs)
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

const TERM_COLUMNS: &str = "id, name, start_date, end_date, status";

fn term_from_row(row: &Row) -> rusqlite::Result<Term> {
    let status: String = row.get(4)?;
    Ok(Term {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        status: stored_code(4, &status, TermStatus::from_code)?,
    })
}

pub fn list_terms(conn: &Connection) -> Result<Vec<Term>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TERM_COLUMNS} FROM terms ORDER BY start_date DESC, name"
    ))?;
    let rows = stmt
        .query_map([], term_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Look a term up by name, or by id when `key` is numeric.
pub fn find_term(conn: &Connection, key: &str) -> Result<Term> {
    let key = key.trim();
    let by_id = key.parse::<i64>().ok();
    conn.query_row(
        &format!("SELECT {TERM_COLUMNS} FROM terms WHERE id = ?1 OR lower(name) = lower(?2)"),
        rusqlite::params![by_id, key],
        term_from_row,
    )
    .optional()?
    .ok_or_else(|| FinplanError::UnknownTerm(key.to_string()))
}

pub fn add_term(conn: &Connection, name: &str, start: &str, end: &str) -> Result<i64> {
    let parse = |raw: &str| {
        chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| FinplanError::Other(format!("Invalid date (expected YYYY-MM-DD): {raw}")))
    };
    let (start_date, end_date) = (parse(start)?, parse(end)?);
    if end_date < start_date {
        return Err(FinplanError::Other("Term end date is before its start date".into()));
    }
    conn.execute(
        "INSERT INTO terms (name, start_date, end_date, status) VALUES (?1, ?2, ?3, 'new')",
        rusqlite::params![
            name.trim(),
            start_date.format("%Y-%m-%d").to_string(),
            end_date.format("%Y-%m-%d").to_string()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_term_status(conn: &Connection, term_id: i64, status: TermStatus) -> Result<()> {
    conn.execute(
        "UPDATE terms SET status = ?1 WHERE id = ?2",
        rusqlite::params![status.code(), term_id],
    )?;
    Ok(())
}

/// A term with its current number of plans, as listed by the upload wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct TermSummary {
    pub term: Term,
    pub plan_count: i64,
}

pub fn term_summaries(conn: &Connection) -> Result<Vec<TermSummary>> {
    let mut summaries = Vec::new();
    for term in list_terms(conn)? {
        let plan_count: i64 = conn.query_row(
            "SELECT count(*) FROM plans WHERE term_id = ?1",
            [term.id],
            |r| r.get(0),
        )?;
        summaries.push(TermSummary { term, plan_count });
    }
    Ok(summaries)
}

// ---------------------------------------------------------------------------
// Plans and reports
// ---------------------------------------------------------------------------

pub fn list_plans(conn: &Connection, term_id: Option<i64>) -> Result<Vec<Plan>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.term_id, t.name, p.version, \
                (SELECT count(*) FROM expenses e WHERE e.plan_id = p.id), p.created_at \
         FROM plans p JOIN terms t ON p.term_id = t.id \
         WHERE ?1 IS NULL OR p.term_id = ?1 \
         ORDER BY t.name, p.name, p.version",
    )?;
    let rows = stmt
        .query_map([term_id], |row| {
            Ok(Plan {
                id: row.get(0)?,
                name: row.get(1)?,
                term_id: row.get(2)?,
                term_name: row.get(3)?,
                version: row.get(4)?,
                expense_count: row.get(5)?,
                created_at: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_reports(conn: &Connection, term_id: Option<i64>) -> Result<Vec<Report>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name, r.term_id, t.name, \
                (SELECT count(*) FROM expenses e WHERE e.report_id = r.id), r.created_at \
         FROM reports r JOIN terms t ON r.term_id = t.id \
         WHERE ?1 IS NULL OR r.term_id = ?1 \
         ORDER BY r.id",
    )?;
    let rows = stmt
        .query_map([term_id], report_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn report_from_row(row: &Row) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        name: row.get(1)?,
        term_id: row.get(2)?,
        term_name: row.get(3)?,
        expense_count: row.get(4)?,
        created_at: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

pub fn find_report(conn: &Connection, report_id: i64) -> Result<Report> {
    conn.query_row(
        "SELECT r.id, r.name, r.term_id, t.name, \
                (SELECT count(*) FROM expenses e WHERE e.report_id = r.id), r.created_at \
         FROM reports r JOIN terms t ON r.term_id = t.id WHERE r.id = ?1",
        [report_id],
        report_from_row,
    )
    .optional()?
    .ok_or_else(|| FinplanError::UnknownReport(report_id.to_string()))
}

/// Create a report for a term. Expenses from the latest version of each plan
/// in the term that are not yet reported are attached and await approval.
pub fn create_report(conn: &Connection, term: &Term, name: &str) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO reports (name, term_id) VALUES (?1, ?2)",
        rusqlite::params![name.trim(), term.id],
    )?;
    let report_id = tx.last_insert_rowid();
    let attached = tx.execute(
        "UPDATE expenses SET report_id = ?1, status = ?2 \
         WHERE report_id IS NULL AND plan_id IN ( \
             SELECT p.id FROM plans p WHERE p.term_id = ?3 AND p.version = ( \
                 SELECT max(p2.version) FROM plans p2 WHERE p2.term_id = p.term_id AND p2.name = p.name))",
        rusqlite::params![report_id, ExpenseStatus::WaitingForApproval.code(), term.id],
    )?;
    tx.commit()?;
    log::info!("report {report_id} created for term {} with {attached} expenses", term.name);
    Ok(report_id)
}

pub fn report_expense_ids(conn: &Connection, report_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM expenses WHERE report_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map([report_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpenseFilter {
    pub plan_id: Option<i64>,
    pub report_id: Option<i64>,
}

pub fn list_expenses(conn: &Connection, filter: ExpenseFilter) -> Result<Vec<Expense>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.plan_id, e.report_id, e.name, ct.name, e.unit_price, e.amount, \
                p.name, s.name, u.username, c.name, e.notes, e.status \
         FROM expenses e \
         JOIN cost_types ct ON e.cost_type_id = ct.id \
         JOIN projects p ON e.project_id = p.id \
         JOIN suppliers s ON e.supplier_id = s.id \
         JOIN users u ON e.pic_id = u.id \
         JOIN currencies c ON e.currency_id = c.id \
         WHERE (?1 IS NULL OR e.plan_id = ?1) AND (?2 IS NULL OR e.report_id = ?2) \
         ORDER BY e.id",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![filter.plan_id, filter.report_id], |row| {
            let status: String = row.get(12)?;
            Ok(Expense {
                id: row.get(0)?,
                plan_id: row.get(1)?,
                report_id: row.get(2)?,
                name: row.get(3)?,
                cost_type: row.get(4)?,
                unit_price: row.get(5)?,
                amount: row.get(6)?,
                project: row.get(7)?,
                supplier: row.get(8)?,
                pic: row.get(9)?,
                currency: row.get(10)?,
                notes: row.get(11)?,
                status: stored_code(12, &status, ExpenseStatus::from_code)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Upload history
// ---------------------------------------------------------------------------

pub fn is_duplicate_upload(conn: &Connection, term_id: i64, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM uploads WHERE checksum = ?1 AND term_id = ?2")?;
    Ok(stmt.exists(rusqlite::params![checksum, term_id])?)
}

pub fn record_upload(
    conn: &Connection,
    filename: &str,
    term_id: i64,
    plan_id: i64,
    row_count: usize,
    checksum: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO uploads (filename, term_id, plan_id, row_count, checksum) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![filename, term_id, plan_id, row_count as i64, checksum],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_fixtures, test_db};

    #[test]
    fn test_reference_data_resolves_seeded_names() {
        let (_dir, conn) = test_db();
        seed_fixtures(&conn);
        let refs = load_reference_data(&conn).unwrap();
        assert!(refs.resolve(LookupKind::CostType, "hardware").is_some());
        assert!(refs.resolve(LookupKind::Currency, "VND").is_some());
        assert!(refs.resolve(LookupKind::Project, "Apollo").is_some());
        assert!(refs.resolve_user("hoa.pt").is_some());
        assert!(refs.resolve(LookupKind::Project, "Hermes").is_none());
    }

    #[test]
    fn test_find_term_by_name_or_id() {
        let (_dir, conn) = test_db();
        seed_fixtures(&conn);
        let term = find_term(&conn, "q1 2025").unwrap();
        assert_eq!(term.status, TermStatus::InProgress);
        assert_eq!(find_term(&conn, &term.id.to_string()).unwrap().name, "Q1 2025");
        assert!(matches!(find_term(&conn, "Q9"), Err(FinplanError::UnknownTerm(_))));
    }

    #[test]
    fn test_add_term_validates_dates() {
        let (_dir, conn) = test_db();
        add_term(&conn, "H1 2025", "2025-01-01", "2025-06-30").unwrap();
        assert!(add_term(&conn, "Bad", "2025-13-01", "2025-06-30").is_err());
        assert!(add_term(&conn, "Backwards", "2025-06-30", "2025-01-01").is_err());
        let terms = list_terms(&conn).unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].status, TermStatus::New);
    }

    #[test]
    fn test_lookups_and_users() {
        let (_dir, conn) = test_db();
        add_lookup(&conn, LookupKind::Supplier, "Amazon").unwrap();
        assert!(add_lookup(&conn, LookupKind::Supplier, "  ").is_err());
        assert_eq!(find_lookup(&conn, LookupKind::Supplier, "amazon").unwrap(), 1);

        add_user(&conn, "thu.nd", Role::Accountant, Some("Accounting")).unwrap();
        let user = find_user(&conn, "THU.ND").unwrap().unwrap();
        assert_eq!(user.role, Role::Accountant);
        assert_eq!(user.department.as_deref(), Some("Accounting"));
        assert!(matches!(
            add_user(&conn, "x", Role::Admin, Some("Nowhere")),
            Err(FinplanError::UnknownLookup { .. })
        ));
    }

    #[test]
    fn test_term_summaries_count_plans() {
        let (_dir, conn) = test_db();
        seed_fixtures(&conn);
        conn.execute("INSERT INTO plans (name, term_id, version) VALUES ('IT', 1, 1), ('IT', 1, 2)", [])
            .unwrap();
        let summaries = term_summaries(&conn).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].plan_count, 2);
    }

    #[test]
    fn test_upload_history_is_per_term() {
        let (_dir, conn) = test_db();
        seed_fixtures(&conn);
        add_term(&conn, "Q2 2025", "2025-04-01", "2025-06-30").unwrap();
        conn.execute("INSERT INTO plans (name, term_id, version) VALUES ('IT', 1, 1)", [])
            .unwrap();
        assert!(!is_duplicate_upload(&conn, 1, "abc123").unwrap());
        record_upload(&conn, "plan.csv", 1, 1, 3, "abc123").unwrap();
        assert!(is_duplicate_upload(&conn, 1, "abc123").unwrap());
        assert!(!is_duplicate_upload(&conn, 2, "abc123").unwrap());
    }

    #[test]
    fn test_create_report_takes_latest_plan_version() {
        let (_dir, conn) = test_db();
        seed_fixtures(&conn);
        conn.execute_batch(
            "INSERT INTO plans (name, term_id, version) VALUES ('IT', 1, 1), ('IT', 1, 2);
             INSERT INTO expenses (plan_id, name, cost_type_id, unit_price, amount, project_id, supplier_id, pic_id, currency_id)
                VALUES (1, 'Old laptop', 1, 900, 1, 1, 1, 2, 2),
                       (2, 'Laptop', 1, 1200, 2, 1, 1, 2, 2);",
        )
        .unwrap();
        let term = find_term(&conn, "Q1 2025").unwrap();
        let report_id = create_report(&conn, &term, "Q1").unwrap();
        assert_eq!(report_expense_ids(&conn, report_id).unwrap(), vec![2]);
        let report = find_report(&conn, report_id).unwrap();
        assert_eq!(report.expense_count, 1);
        let expenses = list_expenses(&conn, ExpenseFilter { plan_id: None, report_id: Some(report_id) }).unwrap();
        assert_eq!(expenses[0].status, ExpenseStatus::WaitingForApproval);

        // Already reported expenses are not collected again.
        let again = create_report(&conn, &term, "Q1 again").unwrap();
        assert!(report_expense_ids(&conn, again).unwrap().is_empty());
        assert!(matches!(find_report(&conn, 99), Err(FinplanError::UnknownReport(_))));
    }
}
