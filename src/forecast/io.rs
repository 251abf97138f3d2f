use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::error::{ForecastError, Result};

/// Read a delimited text file with a header row.
pub fn read_csv(path: &Path, infer_schema_rows: usize) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| ForecastError::io(path, e))?;
    let df = CsvReader::new(file)
        .has_header(true)
        .infer_schema(Some(infer_schema_rows))
        .finish()?;

    info!(
        path = %path.display(),
        rows = df.height(),
        columns = ?df.get_column_names(),
        "loaded table"
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_csv_with_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Year,Month,Monthly_kWh").unwrap();
        writeln!(file, "2023,Jan,410.5").unwrap();
        writeln!(file, "2023,Feb,388.0").unwrap();

        let df = read_csv(file.path(), 100).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names(), vec!["Year", "Month", "Monthly_kWh"]);
        assert_eq!(df.column("Monthly_kWh").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_csv(Path::new("/definitely/not/here.csv"), 100).unwrap_err();
        assert!(matches!(err, ForecastError::Io { .. }));
    }
}
