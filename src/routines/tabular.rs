//! Tabular routines: CSV ↔ XLSX and JSON ↔ CSV.
//!
//! Every input is parsed fully into a [`Table`] and re-serialised. The header
//! row and column order always survive. Cells are typed so numbers stay
//! numbers in XLSX and JSON; CSV text is inferred the same way regardless of
//! which format it ends up in.
//!
//! JSON output is one record per line. JSON input may be an array of
//! records, newline-delimited records, or a column-oriented object
//! (`{"col": {"0": v, …}}` or `{"col": [v, …]}`).

use super::Job;
use crate::error::ConvertError;
use crate::kind::FileKind;
use crate::output::OutputFile;
use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};
use serde_json::{Map, Value};
use std::io::Cursor;
use tracing::debug;

// ── Table model ──────────────────────────────────────────────────────────

/// A typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    /// Infer a cell from CSV text.
    pub fn infer(raw: &str) -> Cell {
        if raw.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Cell::Int(i);
        }
        if raw.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = raw.parse::<f64>() {
                if f.is_finite() {
                    return Cell::Float(f);
                }
            }
        }
        match raw {
            "true" | "True" | "TRUE" => Cell::Bool(true),
            "false" | "False" | "FALSE" => Cell::Bool(false),
            _ => Cell::Text(raw.to_string()),
        }
    }

    fn from_json(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map_or(Cell::Empty, Cell::Float),
            },
            Value::String(s) => Cell::Text(s.clone()),
            nested => Cell::Text(nested.to_string()),
        }
    }

    fn from_sheet(data: &Data) -> Cell {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) if s.is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::DateTime(dt) if dt.is_duration() => match dt.as_duration() {
                Some(d) => Cell::Text(duration_text(d.num_seconds())),
                None => Cell::Float(dt.as_f64()),
            },
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(t) => Cell::Text(t.format("%Y-%m-%d %H:%M:%S").to_string()),
                None => Cell::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// CSV field text. Integral floats print without a fractional part.
    pub fn to_field(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

/// `1 days 02:03:04`, the way pandas prints a timedelta.
fn duration_text(total_secs: i64) -> String {
    let sign = if total_secs < 0 { "-" } else { "" };
    let secs = total_secs.unsigned_abs();
    format!(
        "{sign}{} days {:02}:{:02}:{:02}",
        secs / 86_400,
        secs % 86_400 / 3600,
        secs % 3600 / 60,
        secs % 60
    )
}

/// Header row plus rows of typed cells; every row has `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }
}

// ── Routines ─────────────────────────────────────────────────────────────

/// CSV → XLSX.
pub fn csv_to_xlsx(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let table = read_csv(job.bytes)?;
    Ok(job.single(write_xlsx(&table)?))
}

/// XLSX → CSV (first worksheet).
pub fn xlsx_to_csv(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let table = read_xlsx(job.bytes)?;
    Ok(job.single(write_csv(&table)?))
}

/// JSON → CSV.
pub fn json_to_csv(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let table = read_json(job.text()?)?;
    Ok(job.single(write_csv(&table)?))
}

/// CSV → JSON, one record per line.
pub fn csv_to_json(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let table = read_csv(job.bytes)?;
    Ok(job.single(write_json_lines(&table)))
}

// ── CSV ──────────────────────────────────────────────────────────────────

/// Parse CSV with a header row. Short rows are padded; long rows are an error.
/// Blank header cells become `Unnamed: <index>` and repeated names get `.1`,
/// `.2`, … suffixes.
pub fn read_csv(bytes: &[u8]) -> Result<Table, ConvertError> {
    let unreadable = |e: &dyn std::fmt::Display| ConvertError::unreadable(FileKind::Csv, e);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| unreadable(&e))?;
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(unreadable(&"no header row"));
    }
    let mut table = Table {
        headers: name_headers(headers.iter().map(str::to_string)),
        rows: Vec::new(),
    };

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| unreadable(&e))?;
        if record.len() > table.headers.len() {
            return Err(unreadable(&format!(
                "row {} has {} fields but the header has {}",
                i + 2,
                record.len(),
                table.headers.len()
            )));
        }
        table.push_row(record.iter().map(Cell::infer).collect());
    }

    debug!("Read CSV: {} columns × {} rows", table.headers.len(), table.rows.len());
    Ok(table)
}

/// Name blank headers by position, then disambiguate repeats.
fn name_headers(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for (i, name) in names.enumerate() {
        let name = if name.is_empty() { format!("Unnamed: {i}") } else { name };
        let mut candidate = name.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        seen.push(candidate);
    }
    seen
}

pub fn write_csv(table: &Table) -> Result<Vec<u8>, ConvertError> {
    let encoding = |e: &dyn std::fmt::Display| ConvertError::encoding(FileKind::Csv, e);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers).map_err(|e| encoding(&e))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(Cell::to_field))
            .map_err(|e| encoding(&e))?;
    }
    writer.into_inner().map_err(|e| encoding(&e))
}

// ── XLSX ─────────────────────────────────────────────────────────────────

/// Read the first worksheet. The first row is the header; blank header
/// cells become `Unnamed: <index>`.
pub fn read_xlsx(bytes: &[u8]) -> Result<Table, ConvertError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::unreadable(FileKind::Xlsx, e))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ConvertError::unreadable(FileKind::Xlsx, "workbook has no worksheets"))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ConvertError::unreadable(FileKind::Xlsx, e))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| ConvertError::unreadable(FileKind::Xlsx, format!("worksheet '{first}' is empty")))?;
    let names = header_row.iter().map(|cell| Cell::from_sheet(cell).to_field());

    let mut table = Table {
        headers: name_headers(names),
        rows: Vec::new(),
    };
    for row in rows {
        table.push_row(row.iter().map(Cell::from_sheet).collect());
    }

    debug!(
        "Read XLSX sheet '{}': {} columns × {} rows",
        first,
        table.headers.len(),
        table.rows.len()
    );
    Ok(table)
}

/// Write a single `Sheet1` with a bold header row.
///
/// The creation date is pinned so the same table always produces the same
/// bytes.
pub fn write_xlsx(table: &Table) -> Result<Vec<u8>, ConvertError> {
    let encoding = |e: &dyn std::fmt::Display| ConvertError::encoding(FileKind::Xlsx, e);

    let created = ExcelDateTime::from_ymd(2000, 1, 1).map_err(|e| encoding(&e))?;
    let mut workbook = Workbook::new();
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (c, name) in table.headers.iter().enumerate() {
        let col = column(c)?;
        sheet
            .write_string_with_format(0, col, name, &header_format)
            .map_err(|e| encoding(&e))?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(r + 1)
            .map_err(|_| encoding(&format!("{} rows exceed the worksheet limit", table.rows.len())))?;
        for (c, cell) in row.iter().enumerate() {
            let col = column(c)?;
            let written = match cell {
                Cell::Empty => continue,
                Cell::Int(i) => sheet.write_number(row_num, col, *i as f64),
                Cell::Float(f) => sheet.write_number(row_num, col, *f),
                Cell::Bool(b) => sheet.write_boolean(row_num, col, *b),
                Cell::Text(s) => sheet.write_string(row_num, col, s),
            };
            written.map_err(|e| encoding(&e))?;
        }
    }

    workbook.save_to_buffer().map_err(|e| encoding(&e))
}

fn column(index: usize) -> Result<u16, ConvertError> {
    u16::try_from(index).map_err(|_| {
        ConvertError::encoding(FileKind::Xlsx, format!("column {} exceeds the worksheet limit", index + 1))
    })
}

// ── JSON ─────────────────────────────────────────────────────────────────

/// Parse JSON records into a table. Columns appear in first-seen key order.
pub fn read_json(text: &str) -> Result<Table, ConvertError> {
    let records = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(into_record)
            .collect::<Result<Vec<_>, _>>()?,
        Ok(Value::Object(map)) => object_records(map),
        Ok(other) => {
            return Err(ConvertError::unreadable(
                FileKind::Json,
                format!("expected records, got {}", json_type(&other)),
            ))
        }
        Err(whole_err) => read_json_lines(text).map_err(|line_err| {
            // Report the whole-document error unless the input plainly is
            // line-delimited.
            if text.trim().lines().count() > 1 {
                line_err
            } else {
                ConvertError::unreadable(FileKind::Json, whole_err)
            }
        })?,
    };

    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    if headers.is_empty() {
        return Err(ConvertError::unreadable(FileKind::Json, "no records with fields"));
    }

    let mut table = Table {
        headers,
        rows: Vec::with_capacity(records.len()),
    };
    for record in &records {
        let row = table
            .headers
            .iter()
            .map(|h| record.get(h).map_or(Cell::Empty, Cell::from_json))
            .collect();
        table.rows.push(row);
    }

    debug!("Read JSON: {} columns × {} rows", table.headers.len(), table.rows.len());
    Ok(table)
}

fn read_json_lines(text: &str) -> Result<Vec<Map<String, Value>>, ConvertError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let value: Value = serde_json::from_str(line)
                .map_err(|e| ConvertError::unreadable(FileKind::Json, format!("line {}: {e}", i + 1)))?;
            into_record(value)
        })
        .collect()
}

fn into_record(value: Value) -> Result<Map<String, Value>, ConvertError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ConvertError::unreadable(
            FileKind::Json,
            format!("records must be objects, got {}", json_type(&other)),
        )),
    }
}

/// A top-level object is column-oriented when every value is an object or
/// array; otherwise it is a single record.
fn object_records(map: Map<String, Value>) -> Vec<Map<String, Value>> {
    let columnar = !map.is_empty() && map.values().all(|v| v.is_object() || v.is_array());
    if !columnar {
        return vec![map];
    }

    let mut index: Vec<String> = Vec::new();
    for column in map.values() {
        match column {
            Value::Object(cells) => {
                for key in cells.keys() {
                    if !index.contains(key) {
                        index.push(key.clone());
                    }
                }
            }
            Value::Array(cells) => {
                for i in index.len()..cells.len() {
                    index.push(i.to_string());
                }
            }
            _ => {}
        }
    }

    index
        .iter()
        .enumerate()
        .map(|(pos, key)| {
            map.iter()
                .map(|(name, column)| {
                    let cell = match column {
                        Value::Object(cells) => cells.get(key).cloned(),
                        Value::Array(cells) => cells.get(pos).cloned(),
                        _ => None,
                    };
                    (name.clone(), cell.unwrap_or(Value::Null))
                })
                .collect()
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One JSON object per line, keys in header order, newline-terminated.
pub fn write_json_lines(table: &Table) -> Vec<u8> {
    let mut out = String::new();
    for row in &table.rows {
        let record: Map<String, Value> = table
            .headers
            .iter()
            .cloned()
            .zip(row.iter().map(Cell::to_json))
            .collect();
        out.push_str(&Value::Object(record).to_string());
        out.push('\n');
    }
    out.into_bytes()
}
