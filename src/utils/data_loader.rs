//! Dataset loading and saving

use crate::error::{Result, WireRodError};
use crate::schema::FeatureSchema;
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// CSV loader for wire-rod datasets
pub struct DataLoader {
    /// Rows used for schema inference (`None` scans the whole file)
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader. Column types are inferred from every row so
    /// a column of whole numbers with a late decimal still loads.
    pub fn new() -> Self {
        Self {
            infer_schema_length: None,
        }
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| WireRodError::DataError(format!("{}: {}", path.display(), e)))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| WireRodError::DataError(e.to_string()))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }
}

/// Writes frames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;

        CsvWriter::new(&mut file)
            .finish(df)
            .map_err(|e| WireRodError::DataError(e.to_string()))
    }
}

/// Feature and target matrices extracted from a frame in schema order
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub schema: FeatureSchema,
}

impl Dataset {
    /// Extract the schema's columns. Extra columns are ignored; missing
    /// columns, non-numeric columns and nulls are errors.
    pub fn from_frame(df: &DataFrame, schema: &FeatureSchema) -> Result<Self> {
        let x = columns_to_array2(df, &schema.features)?;
        let y = columns_to_array2(df, &schema.targets)?;
        Ok(Self {
            x,
            y,
            schema: schema.clone(),
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }
}

/// Extract named columns from a DataFrame into a row-major `Array2<f64>`.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| WireRodError::FeatureNotFound(col_name.clone()))?;
            if column.null_count() > 0 {
                return Err(WireRodError::DataError(format!(
                    "column '{}' has {} missing values",
                    col_name,
                    column.null_count()
                )));
            }
            let casted = column.cast(&DataType::Float64).map_err(|e| {
                WireRodError::DataError(format!("column '{}' is not numeric: {}", col_name, e))
            })?;
            let values: Vec<f64> = casted
                .as_materialized_series()
                .f64()
                .map_err(|e| WireRodError::DataError(e.to_string()))?
                .into_iter()
                .enumerate()
                .map(|(row, v)| match v {
                    Some(v) if v.is_finite() => Ok(v),
                    _ => Err(WireRodError::DataError(format!(
                        "column '{}' row {}: not a finite number",
                        col_name, row
                    ))),
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}
