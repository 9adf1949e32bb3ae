//! Row collection loaded from a tabular source.
//!
//! Rows keep every original column so snapshots can be written back as the
//! input table plus a `distance_km` column.

use std::io;
use std::path::Path;

use rayon::prelude::*;

use crate::coordinate::{parse_decimal, Coord};
use crate::error::Error;

/// Name of the result column appended to the output table.
pub const DISTANCE_COLUMN: &str = "distance_km";

/// Stable positional identifier of a row in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub usize);

/// One origin/destination pair to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub origin_name: String,
    /// Raw `lon|lat` field of the origin, parsed during grouping.
    pub origin_coord_field: String,
    pub destination: Coord,
    pub label: String,
    /// `None` until resolved, and also when the service reports no route.
    pub distance_km: Option<f64>,
    /// Original column values, in `RowTable::headers` order.
    pub fields: Vec<String>,
}

/// Column names and CSV dialect of the source table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub origin: String,
    pub origin_coord: String,
    pub longitude: String,
    pub latitude: String,
    pub label: String,
    pub delimiter: u8,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            origin: "Origin".to_string(),
            origin_coord: "Long|Lat".to_string(),
            longitude: "Longitude".to_string(),
            latitude: "Latitude".to_string(),
            label: "Destino".to_string(),
            delimiter: b',',
        }
    }
}

struct ColumnIndex {
    origin: usize,
    origin_coord: usize,
    longitude: usize,
    latitude: usize,
    label: usize,
}

impl TableSchema {
    fn locate(&self, headers: &[String]) -> Result<ColumnIndex, Error> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or_else(|| Error::Config(format!("input table has no column {name:?}")))
        };
        Ok(ColumnIndex {
            origin: find(&self.origin)?,
            origin_coord: find(&self.origin_coord)?,
            longitude: find(&self.longitude)?,
            latitude: find(&self.latitude)?,
            label: find(&self.label)?,
        })
    }
}

/// The full set of rows for one run, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowTable {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl RowTable {
    /// Build a table from already-parsed rows. Ids are reassigned by position.
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| Row {
                id: RowId(index),
                ..row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn from_csv_path(path: impl AsRef<Path>, schema: &TableSchema) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file, schema)
    }

    /// Read a delimited table. Destination coordinates are parsed here, so a
    /// malformed `Longitude`/`Latitude` fails the load before any request.
    pub fn from_csv_reader<R: io::Read>(reader: R, schema: &TableSchema) -> Result<Self, Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(schema.delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').to_string())
            .collect();
        let columns = schema.locate(&headers)?;

        let records = csv_reader
            .records()
            .collect::<Result<Vec<_>, csv::Error>>()?;

        let rows = records
            .par_iter()
            .enumerate()
            .map(|(index, record)| -> Result<Row, Error> {
                let field = |column: usize| record.get(column).unwrap_or_default().to_string();
                let destination = Coord::new(
                    parse_decimal(&field(columns.longitude))?,
                    parse_decimal(&field(columns.latitude))?,
                );
                Ok(Row {
                    id: RowId(index),
                    origin_name: field(columns.origin).trim().to_string(),
                    origin_coord_field: field(columns.origin_coord),
                    destination,
                    label: field(columns.label),
                    distance_km: None,
                    fields: record.iter().map(str::to_string).collect(),
                })
            })
            .collect::<Result<Vec<Row>, Error>>()?;

        Ok(Self { headers, rows })
    }

    /// Write headers plus `distance_km` and one record per row.
    ///
    /// An existing `distance_km` input column is replaced rather than duplicated.
    pub fn write_csv<W: io::Write>(&self, writer: W, delimiter: u8) -> Result<(), Error> {
        let existing = self
            .headers
            .iter()
            .position(|header| header == DISTANCE_COLUMN);

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(writer);

        let mut header_record: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        if existing.is_none() {
            header_record.push(DISTANCE_COLUMN);
        }
        csv_writer.write_record(&header_record)?;

        for row in &self.rows {
            let distance = format_distance(row.distance_km);
            let mut record: Vec<&str> = row.fields.iter().map(String::as_str).collect();
            match existing {
                Some(column) => {
                    if record.len() <= column {
                        record.resize(column + 1, "");
                    }
                    record[column] = &distance;
                }
                None => {
                    record.resize(self.headers.len().max(record.len()), "");
                    record.push(&distance);
                }
            }
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0)
    }

    /// Record the resolved distance for a row. Unknown ids are ignored.
    pub fn set_distance(&mut self, id: RowId, distance_km: Option<f64>) {
        if let Some(row) = self.rows.get_mut(id.0) {
            row.distance_km = distance_km;
        }
    }

    /// Count of rows with a distance present.
    pub fn resolved_count(&self) -> usize {
        self.rows.iter().filter(|row| row.distance_km.is_some()).count()
    }
}

/// Two decimals, or an empty cell for a missing distance.
pub fn format_distance(distance_km: Option<f64>) -> String {
    distance_km
        .map(|km| format!("{:.2}", km))
        .unwrap_or_default()
}
