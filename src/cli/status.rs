use crate::db::get_connection;
use crate::error::Result;
use crate::settings::{db_path, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = db_path();

    println!("User:       {}", if settings.user_name.is_empty() { "(not set)" } else { &settings.user_name });
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Page size:  {}", settings.page_size);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `finplan init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let count = |table: &str| -> Result<i64> {
        Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
    };
    let waiting: i64 = conn.query_row(
        "SELECT count(*) FROM expenses WHERE status = 'WAITING_FOR_APPROVAL'",
        [],
        |r| r.get(0),
    )?;

    println!();
    println!("Terms:         {}", count("terms")?);
    println!("Plans:         {}", count("plans")?);
    println!("Reports:       {}", count("reports")?);
    println!("Expenses:      {}", count("expenses")?);
    println!("Awaiting review: {waiting}");
    println!("Uploads:       {}", count("uploads")?);
    Ok(())
}
