use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::store::{add_user, list_users};

use super::{open_db, parse_role};

pub fn add(username: &str, role: &str, department: Option<&str>) -> Result<()> {
    let role = parse_role(role)?;
    let conn = open_db()?;
    add_user(&conn, username, role, department)?;
    println!("Added user: {} ({role})", username.trim());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Username", "Department", "Role"]);
    for user in list_users(&conn)? {
        table.add_row(vec![
            Cell::new(user.id),
            Cell::new(user.username),
            Cell::new(user.department.unwrap_or_default()),
            Cell::new(user.role),
        ]);
    }
    println!("Users\n{table}");
    Ok(())
}
