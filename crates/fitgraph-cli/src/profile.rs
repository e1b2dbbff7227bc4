use crate::error::{CliError, Result};
use anyhow::{Context, anyhow};
use std::path::Path;

/// A sampled profile read from CSV: intensities with an optional abscissa.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub x: Option<Vec<f64>>,
    pub y: Vec<f64>,
}

impl Profile {
    pub fn read(path: &Path) -> Result<Self> {
        parse(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| CliError::Other(e.into()))?;
        for (i, y) in self.y.iter().enumerate() {
            let record = match &self.x {
                Some(x) => vec![x[i].to_string(), y.to_string()],
                None => vec![y.to_string()],
            };
            writer
                .write_record(&record)
                .map_err(|e| CliError::Other(e.into()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn parse(path: &Path) -> anyhow::Result<Profile> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut columns = None;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let width = record.len();
        if width == 0 {
            continue;
        }
        if *columns.get_or_insert(width) != width {
            return Err(anyhow!(
                "row {} has {} column(s), expected {}",
                line + 1,
                width,
                columns.unwrap_or(width)
            ));
        }

        let values = record
            .iter()
            .map(|field| {
                field
                    .parse::<f64>()
                    .with_context(|| format!("row {}: '{}' is not a number", line + 1, field))
            })
            .collect::<anyhow::Result<Vec<f64>>>()?;

        match values.as_slice() {
            [y] => ys.push(*y),
            [x, y] => {
                xs.push(*x);
                ys.push(*y);
            }
            _ => return Err(anyhow!("row {} has {} columns, expected 1 or 2", line + 1, width)),
        }
    }

    if ys.is_empty() {
        return Err(anyhow!("profile contains no samples"));
    }

    Ok(Profile {
        x: (!xs.is_empty()).then_some(xs),
        y: ys,
    })
}
