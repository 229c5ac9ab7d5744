//! CSV spectral data loading.
//!
//! Files are plain comma-separated text: `#` lines and blank lines are
//! skipped, the first remaining line is a header, and the first column is the
//! frequency grid.
//!
//! ```text
//! # Drude model, gamma = 0.1
//! omega,sigma1,sigma2
//! 0.01,0.39,-0.039
//! ```

use anyhow::{bail, Context, Result};
use lib_types::{FrequencyGrid, SpectralFunction};
use std::path::Path;

/// Column-oriented table of spectral data.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralTable {
    headers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl SpectralTable {
    /// Load a table from a CSV file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read spectral data file {:?}", path))?;
        let table = Self::parse(&content).with_context(|| format!("Failed to parse {:?}", path))?;
        tracing::debug!(points = table.len(), columns = ?table.headers(), "loaded {:?}", path);
        Ok(table)
    }

    /// Parse CSV text.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (_, header) = lines.next().context("No header row found")?;
        let headers: Vec<String> = header.split(',').map(|h| h.trim().to_string()).collect();
        if headers.len() < 2 {
            bail!("Expected at least two columns (omega and data), got {}", headers.len());
        }

        let mut columns = vec![Vec::new(); headers.len()];
        for (line_no, line) in lines {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != headers.len() {
                bail!(
                    "Line {}: expected {} fields, got {}",
                    line_no,
                    headers.len(),
                    fields.len()
                );
            }
            for (column, field) in columns.iter_mut().zip(&fields) {
                let value: f64 = field
                    .parse()
                    .with_context(|| format!("Line {}: invalid number '{}'", line_no, field))?;
                column.push(value);
            }
        }

        if columns[0].is_empty() {
            bail!("No data rows found");
        }

        Ok(Self { headers, columns })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    /// Frequencies from the first column.
    pub fn omega(&self) -> &[f64] {
        &self.columns[0]
    }

    /// Validated frequency grid from the first column.
    pub fn grid(&self) -> Result<FrequencyGrid> {
        FrequencyGrid::new(self.omega().to_vec()).context("Invalid frequency column")
    }

    /// Data column by header name.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .filter(|&i| i > 0)
            .map(|i| self.columns[i].as_slice())
            .with_context(|| {
                format!(
                    "Column '{}' not found (available: {})",
                    name,
                    self.headers[1..].join(", ")
                )
            })
    }

    /// Named column bound to `grid`.
    pub fn spectral(&self, grid: &FrequencyGrid, name: &str) -> Result<SpectralFunction> {
        SpectralFunction::on_grid(grid, self.column(name)?.to_vec())
            .with_context(|| format!("Column '{}' does not match the grid", name))
    }

    /// Named column, or the first data column when no name is given.
    pub fn column_or_first<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a [f64])> {
        match name {
            Some(name) => Ok((name, self.column(name)?)),
            None => Ok((self.headers[1].as_str(), self.columns[1].as_slice())),
        }
    }
}
