use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::Path;

pub const DELIMITER: u8 = b';';

/// One sample file in memory. Inputs are delimiter-normalized to `;` before
/// they reach us, and every artifact we write uses the same separator.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Table {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let fh = ex::fs::File::open(path)
            .with_context(|| format!("Could not open file {:?}", path))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .flexible(false)
            .from_reader(fh);
        let headers = reader
            .headers()
            .with_context(|| format!("Could not read header of {:?}", path))?
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Malformed row in {:?}", path))?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }
        Ok(Table { headers, rows })
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_path(path)
            .with_context(|| format!("Could not create file {:?}", path))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Could not flush {:?}", path))?;
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .with_context(|| format!("Missing column '{}'", name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct non-empty values in a column.
    pub fn distinct_count(&self, column: usize) -> usize {
        self.rows
            .iter()
            .map(|row| row[column].as_str())
            .filter(|v| !v.trim().is_empty())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Keep only the named columns, in the given order. All of them must
    /// exist.
    pub fn project(&self, columns: &[String]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            headers: columns.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Append the rows of another table; the headers must match exactly.
    pub fn append(&mut self, other: &Table) -> Result<()> {
        if self.headers != other.headers {
            bail!(
                "Header mismatch: {:?} vs {:?}",
                self.headers,
                other.headers
            );
        }
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }

    /// Add a column. `values` must hold one entry per row.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            bail!(
                "Column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            );
        }
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Drop a column by index.
    pub fn remove_column(&mut self, column: usize) {
        self.headers.remove(column);
        for row in &mut self.rows {
            row.remove(column);
        }
    }
}
