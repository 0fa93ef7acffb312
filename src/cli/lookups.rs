use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::models::LookupKind;
use crate::store::{add_lookup, list_lookups};

use super::{open_db, parse_lookup_kind};

pub fn add(kind: &str, name: &str) -> Result<()> {
    let kind = parse_lookup_kind(kind)?;
    let conn = open_db()?;
    add_lookup(&conn, kind, name)?;
    println!("Added {}: {}", kind.label(), name.trim());
    Ok(())
}

pub fn list(kind: Option<&str>) -> Result<()> {
    let kinds = match kind {
        Some(k) => vec![parse_lookup_kind(k)?],
        None => LookupKind::ALL.to_vec(),
    };
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["Kind", "ID", "Name"]);
    for kind in kinds {
        for lookup in list_lookups(&conn, kind)? {
            table.add_row(vec![
                Cell::new(kind.label()),
                Cell::new(lookup.id),
                Cell::new(lookup.name),
            ]);
        }
    }
    println!("Lookups\n{table}");
    Ok(())
}
