use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{FinplanError, Result};
use crate::expense::{Column, ExpenseRow};

// ---------------------------------------------------------------------------
// Sheet formats, dispatched on the file extension
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetFormat {
    Csv,
    #[cfg(feature = "xlsx")]
    Workbook,
}

impl SheetFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            #[cfg(feature = "xlsx")]
            Self::Workbook => "Excel workbook",
        }
    }

    pub fn extensions(&self) -> &[&str] {
        match self {
            Self::Csv => &["csv"],
            #[cfg(feature = "xlsx")]
            Self::Workbook => &["xlsx", "xlsm", "xls", "ods"],
        }
    }

    pub fn detect(file_path: &Path) -> Option<Self> {
        let ext = file_path.extension()?.to_str()?.to_lowercase();
        ALL_FORMATS
            .iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
            .copied()
    }

    fn read_table(&self, file_path: &Path) -> Result<Vec<Vec<String>>> {
        match self {
            Self::Csv => read_csv_table(file_path),
            #[cfg(feature = "xlsx")]
            Self::Workbook => read_workbook_table(file_path),
        }
    }
}

const ALL_FORMATS: &[SheetFormat] = &[
    SheetFormat::Csv,
    #[cfg(feature = "xlsx")]
    SheetFormat::Workbook,
];

// ---------------------------------------------------------------------------
// parse_file
// ---------------------------------------------------------------------------

/// Parse an uploaded spreadsheet into expense rows.
///
/// The first non-blank row is the header. Every column in `required` must be
/// present; unrecognised columns are ignored and blank lines are skipped.
pub fn parse_file(file_path: &Path, required: &[Column]) -> Result<Vec<ExpenseRow>> {
    let format = SheetFormat::detect(file_path)
        .ok_or_else(|| FinplanError::UnsupportedFile(file_path.display().to_string()))?;
    let table = format.read_table(file_path)?;
    let rows = rows_from_table(&table, required)?;
    log::info!(
        "parsed {} rows from {} ({})",
        rows.len(),
        file_path.display(),
        format.name()
    );
    Ok(rows)
}

pub fn rows_from_table(table: &[Vec<String>], required: &[Column]) -> Result<Vec<ExpenseRow>> {
    let mut lines = table.iter().filter(|r| !is_blank(r));
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };

    let columns: Vec<Option<Column>> = header.iter().map(|h| Column::from_header(h)).collect();
    for col in required {
        if !columns.contains(&Some(*col)) {
            return Err(FinplanError::MissingColumn(col.header().to_string()));
        }
    }

    let mut rows = Vec::new();
    for record in lines {
        let cells: HashMap<Column, String> = columns
            .iter()
            .zip(record.iter())
            .filter_map(|(col, value)| col.map(|c| (c, value.clone())))
            .collect();
        rows.push(ExpenseRow::from_cells(rows.len() as i64 + 1, &cells));
    }
    Ok(rows)
}

fn is_blank(record: &[String]) -> bool {
    record.iter().all(|c| c.trim().is_empty())
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn read_csv_table(file_path: &Path) -> Result<Vec<Vec<String>>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut table = Vec::new();
    for result in rdr.records() {
        let record = result?;
        table.push(record.iter().map(|f| f.trim_start_matches('\u{feff}').to_string()).collect());
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Excel / ODS (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::String(s) => s.clone(),
        // Whole floats print without a trailing `.0` so `2` stays `2`.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Reads the first worksheet of the workbook.
#[cfg(feature = "xlsx")]
fn read_workbook_table(file_path: &Path) -> Result<Vec<Vec<String>>> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&sheet)?;
    Ok(range
        .rows()
        .map(|r| r.iter().map(cell_to_string).collect())
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub(crate) const PLAN_CSV: &str = "\
Expense,Cost Type,Unit Price,Amount,Project,Supplier,PIC,Notes,Currency
Laptop,Hardware,\"1,200.00\",2,Apollo,FPT Shop,hoa.pt,For new hires,USD
Flight,Travel,abc,1,Apollo,FPT Shop,hoa.pt,,USD
Monitor,Hardware,300,3,Apollo,FPT Shop,hoa.pt,,USD
";

    #[test]
    fn test_parse_csv_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "plan.csv", PLAN_CSV);
        let rows = parse_file(&path, &Column::UPLOAD).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].name, "Laptop");
        assert_eq!(rows[0].unit_price, "1,200.00");
        assert_eq!(rows[0].notes, "For new hires");
        assert_eq!(rows[1].unit_price, "abc");
        assert_eq!(rows[2].id, 3);
    }

    #[test]
    fn test_header_order_and_extra_columns_do_not_matter() {
        let table: Vec<Vec<String>> = vec![
            vec!["", "", ""],
            vec!["Status Code", "Remarks", "Expense ID"],
            vec!["approved", "ok", "7"],
            vec!["", "", ""],
            vec!["denied", "", "8"],
        ]
        .into_iter()
        .map(|r| r.into_iter().map(String::from).collect())
        .collect();
        let rows = rows_from_table(&table, &Column::REVIEW).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].expense_code.as_deref(), Some("7"));
        assert_eq!(rows[1].status.as_deref(), Some("denied"));
        assert_eq!(rows[1].id, 2);
    }

    #[test]
    fn test_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "plan.csv", "Expense,Cost Type\nLaptop,Hardware\n");
        let err = parse_file(&path, &Column::UPLOAD).unwrap_err();
        assert!(matches!(err, FinplanError::MissingColumn(ref c) if c == "Unit Price"));
    }

    #[test]
    fn test_short_records_leave_cells_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "plan.csv", "Expense,Unit Price,Currency\nLaptop,10\n");
        let rows = parse_file(&path, &[Column::Name]).unwrap();
        assert_eq!(rows[0].currency, "");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "plan.txt", PLAN_CSV);
        assert!(matches!(
            parse_file(&path, &Column::UPLOAD),
            Err(FinplanError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn test_empty_file_has_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "plan.csv", "");
        assert!(parse_file(&path, &Column::UPLOAD).unwrap().is_empty());
    }

    #[test]
    fn test_checksum_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_csv(dir.path(), "a.csv", PLAN_CSV);
        let b = write_csv(dir.path(), "b.csv", PLAN_CSV);
        assert_eq!(compute_checksum(&a).unwrap(), compute_checksum(&b).unwrap());
        assert_eq!(compute_checksum(&a).unwrap().len(), 64);
    }
}
