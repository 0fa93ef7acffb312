use std::path::PathBuf;

use colored::Colorize;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, Settings};
use crate::store::find_user;

pub fn run(data_dir: Option<String>, user: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    let defaults = Settings::default();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if settings.data_dir == defaults.data_dir && settings.user_name.is_empty() {
        // First run: offer to pick the data dir
        println!("Data directory [{}]: ", settings.data_dir);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).ok();
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }
    if let Some(user) = user {
        settings.user_name = user.trim().to_string();
    }

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("exports"))?;

    let conn = get_connection(&resolved.join("finplan.db"))?;
    init_db(&conn)?;
    save_settings(&settings)?;

    println!("Initialized finplan at {}", resolved.display());
    if !settings.user_name.is_empty() {
        match find_user(&conn, &settings.user_name)? {
            Some(u) => println!("Acting as {} ({})", u.username, u.role),
            None => println!(
                "{} user {} does not exist yet; add it with `finplan users add`",
                "Warning:".yellow().bold(),
                settings.user_name
            ),
        }
    }
    Ok(())
}
