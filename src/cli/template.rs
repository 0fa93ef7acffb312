use std::path::PathBuf;

use crate::error::Result;
use crate::expense::Column;

pub fn run(output: &str) -> Result<()> {
    let path = PathBuf::from(output);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(Column::UPLOAD.iter().map(|c| c.header()))?;
    writer.flush()?;
    println!("Wrote upload template to {}", path.display());
    Ok(())
}
