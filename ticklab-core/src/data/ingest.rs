//! Parquet/CSV ingestion of annotated tick data into a [`TickFrame`].
//!
//! Required base columns: `date`, `second`, `price`, `qty`, `volume`,
//! `open_interest`, `b1`, `b1_size`, `s1`, `s1_size`, `mid`. An optional `dt`
//! timestamp is carried through. Every other numeric column whose name
//! follows the `{base}_{back}_{fwd}` convention becomes a feature or response
//! column; nulls are stored as NaN.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::columns::parse_moving_column;
use crate::domain::{Tick, TickFrame};
use crate::error::ConsistencyError;

/// Base columns every input file must carry.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "date",
    "second",
    "price",
    "qty",
    "volume",
    "open_interest",
    "b1",
    "b1_size",
    "s1",
    "s1_size",
    "mid",
];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported file extension for {0} (expected .parquet or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),

    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("column '{column}': {reason}")]
    ColumnType { column: String, reason: String },

    #[error("null or invalid '{column}' at row {row}")]
    InvalidKey { column: String, row: usize },

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

/// On-disk formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Parquet,
    Csv,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Ok(FileFormat::Parquet),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(FileFormat::Csv),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load an annotated tick file.
pub fn load_ticks(path: &Path) -> Result<TickFrame, LoadError> {
    let df = read_dataframe(path)?;
    let frame = frame_from_dataframe(&df)?;
    info!(
        path = %path.display(),
        rows = frame.len(),
        days = frame.days().len(),
        "loaded ticks"
    );
    Ok(frame)
}

/// Write a tick frame as Parquet or CSV, by extension.
pub fn write_ticks(frame: &TickFrame, path: &Path) -> Result<(), LoadError> {
    let format = FileFormat::from_path(path)?;
    let mut df = frame_to_dataframe(frame)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LoadError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = fs::File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        FileFormat::Parquet => {
            ParquetWriter::new(file).finish(&mut df)?;
        }
        FileFormat::Csv => {
            CsvWriter::new(file).include_header(true).finish(&mut df)?;
        }
    }
    debug!(path = %path.display(), rows = frame.len(), "wrote ticks");
    Ok(())
}

pub fn read_dataframe(path: &Path) -> Result<DataFrame, LoadError> {
    match FileFormat::from_path(path)? {
        FileFormat::Parquet => {
            let file = fs::File::open(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(ParquetReader::new(file).finish()?)
        }
        FileFormat::Csv => {
            if !path.exists() {
                return Err(LoadError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(LazyCsvReader::new(path)
                .with_has_header(true)
                .with_try_parse_dates(true)
                .finish()?
                .collect()?)
        }
    }
}

/// Convert a dataframe with the base tick schema into a [`TickFrame`].
pub fn frame_from_dataframe(df: &DataFrame) -> Result<TickFrame, LoadError> {
    for name in REQUIRED_COLUMNS {
        if df.column(name).is_err() {
            return Err(LoadError::MissingColumn(name.to_string()));
        }
    }

    let dates = date_values(df.column("date")?)?;
    let seconds = second_values(df.column("second")?)?;
    let dts = match df.column("dt") {
        Ok(column) => datetime_values(column)?,
        Err(_) => vec![None; df.height()],
    };
    let price = float_values(df.column("price")?)?;
    let qty = float_values(df.column("qty")?)?;
    let volume = float_values(df.column("volume")?)?;
    let open_interest = float_values(df.column("open_interest")?)?;
    let b1 = float_values(df.column("b1")?)?;
    let b1_size = float_values(df.column("b1_size")?)?;
    let s1 = float_values(df.column("s1")?)?;
    let s1_size = float_values(df.column("s1_size")?)?;
    let mid = float_values(df.column("mid")?)?;

    let ticks: Vec<Tick> = (0..df.height())
        .map(|i| Tick {
            dt: dts[i],
            date: dates[i],
            second: seconds[i],
            price: price[i],
            qty: qty[i],
            volume: volume[i],
            open_interest: open_interest[i],
            b1: b1[i],
            b1_size: b1_size[i],
            s1: s1[i],
            s1_size: s1_size[i],
            mid: mid[i],
        })
        .collect();

    let mut columns = BTreeMap::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        if REQUIRED_COLUMNS.contains(&name) || parse_moving_column(name).is_none() {
            continue;
        }
        if !is_numeric(column.dtype()) {
            debug!(column = name, dtype = %column.dtype(), "skipping non-numeric column");
            continue;
        }
        columns.insert(name.to_string(), float_values(column)?);
    }

    Ok(TickFrame::new(ticks, columns)?)
}

/// Inverse of [`frame_from_dataframe`].
pub fn frame_to_dataframe(frame: &TickFrame) -> Result<DataFrame, LoadError> {
    let ticks = frame.ticks();
    let epoch = epoch();
    let dates: Vec<i32> = ticks
        .iter()
        .map(|t| (t.date - epoch).num_days() as i32)
        .collect();
    let dts: Vec<Option<i64>> = ticks
        .iter()
        .map(|t| t.dt.map(|dt| dt.and_utc().timestamp_millis()))
        .collect();
    let field = |f: fn(&Tick) -> f64| -> Vec<f64> { ticks.iter().map(f).collect() };

    let mut columns = vec![
        Column::new("dt".into(), dts)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        Column::new("date".into(), dates).cast(&DataType::Date)?,
        Column::new(
            "second".into(),
            ticks.iter().map(|t| t.second).collect::<Vec<u32>>(),
        ),
        Column::new("price".into(), field(|t| t.price)),
        Column::new("qty".into(), field(|t| t.qty)),
        Column::new("volume".into(), field(|t| t.volume)),
        Column::new("open_interest".into(), field(|t| t.open_interest)),
        Column::new("b1".into(), field(|t| t.b1)),
        Column::new("b1_size".into(), field(|t| t.b1_size)),
        Column::new("s1".into(), field(|t| t.s1)),
        Column::new("s1_size".into(), field(|t| t.s1_size)),
        Column::new("mid".into(), field(|t| t.mid)),
    ];
    for name in frame.column_names() {
        if let Some(values) = frame.column(name) {
            columns.push(Column::new(name.into(), values.to_vec()));
        }
    }
    Ok(DataFrame::new(columns)?)
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

fn column_type_error(column: &Column, expected: &str) -> LoadError {
    LoadError::ColumnType {
        column: column.name().to_string(),
        reason: format!("expected {expected}, found {}", column.dtype()),
    }
}

fn float_values(column: &Column) -> Result<Vec<f64>, LoadError> {
    if !is_numeric(column.dtype()) && column.dtype() != &DataType::Boolean {
        return Err(column_type_error(column, "a numeric column"));
    }
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn second_values(column: &Column) -> Result<Vec<u32>, LoadError> {
    if !is_numeric(column.dtype()) {
        return Err(column_type_error(column, "an integer column"));
    }
    let cast = column.cast(&DataType::Int64)?;
    cast.i64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.and_then(|s| u32::try_from(s).ok())
                .ok_or_else(|| LoadError::InvalidKey {
                    column: "second".into(),
                    row,
                })
        })
        .collect()
}

fn date_values(column: &Column) -> Result<Vec<NaiveDate>, LoadError> {
    let invalid = |row| LoadError::InvalidKey {
        column: "date".into(),
        row,
    };
    match column.dtype() {
        DataType::Date => {
            let epoch = epoch();
            column
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.map(|days| epoch + chrono::Duration::days(i64::from(days)))
                        .ok_or_else(|| invalid(row))
                })
                .collect()
        }
        DataType::String => column
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                    .ok_or_else(|| invalid(row))
            })
            .collect(),
        _ => Err(column_type_error(column, "a date column")),
    }
}

fn datetime_values(column: &Column) -> Result<Vec<Option<NaiveDateTime>>, LoadError> {
    match column.dtype() {
        DataType::Datetime(_, _) => {
            let millis = column
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?;
            Ok(millis
                .i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(DateTime::from_timestamp_millis)
                        .map(|dt| dt.naive_utc())
                })
                .collect())
        }
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_datetime))
            .collect()),
        DataType::Null => Ok(vec![None; column.len()]),
        _ => Err(column_type_error(column, "a datetime column")),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
}
