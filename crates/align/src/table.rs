use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use crate::config::ColumnMapping;
use crate::error::AlignError;
use crate::model::{GroupKey, MergeOutput, MergedRow, ReceiptRow, ReceiptTable};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a transcription from CSV text. Every header is kept in
/// `ReceiptTable::columns` so validation can reject extra columns.
pub fn load_csv_table(
    name: &str,
    csv_data: &str,
    columns: &ColumnMapping,
) -> Result<ReceiptTable, AlignError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(name, &e))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    check_header(name, &headers)?;

    let idx = |column: &str| -> Result<usize, AlignError> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| AlignError::ColumnMismatch {
                table: name.into(),
                expected: columns.required(),
                found: headers.clone(),
            })
    };
    let subject_idx = idx(&columns.subject)?;
    let session_idx = idx(&columns.session)?;
    let receipt_idx = idx(&columns.receipt)?;
    let item_idx = idx(&columns.item)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed(name, &e))?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        rows.push(ReceiptRow {
            key: GroupKey {
                subject: field(subject_idx),
                session: field(session_idx),
                receipt: field(receipt_idx),
            },
            item: field(item_idx),
        });
    }

    Ok(ReceiptTable::new(name, headers, rows))
}

/// Load a transcription from a CSV file; the table is named after the file stem.
pub fn load_csv_file(path: &Path, columns: &ColumnMapping) -> Result<ReceiptTable, AlignError> {
    let data = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    load_csv_table(&name, &data, columns)
}

fn malformed(table: &str, err: &csv::Error) -> AlignError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths { .. } => AlignError::MalformedTable {
            table: table.into(),
            reason: err.to_string(),
        },
        _ => AlignError::Csv(err.to_string()),
    }
}

fn check_header(table: &str, columns: &[String]) -> Result<(), AlignError> {
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(AlignError::MalformedTable {
            table: table.into(),
            reason: "no header row".into(),
        });
    }
    for (i, col) in columns.iter().enumerate() {
        if columns[i + 1..].contains(col) {
            return Err(AlignError::MalformedTable {
                table: table.into(),
                reason: format!("duplicate column '{col}'"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Fail fast unless there are exactly two proper tables with the configured
/// columns and the same universe of group keys.
pub fn validate_tables(tables: &[ReceiptTable], columns: &ColumnMapping) -> Result<(), AlignError> {
    let [left, right] = tables else {
        return Err(AlignError::TableCount(tables.len()));
    };

    let required: BTreeSet<&str> = columns.required_set();
    for table in [left, right] {
        check_header(&table.name, &table.columns)?;
        let found: BTreeSet<&str> = table.columns.iter().map(String::as_str).collect();
        if found != required {
            return Err(AlignError::ColumnMismatch {
                table: table.name.clone(),
                expected: columns.required(),
                found: table.columns.clone(),
            });
        }
    }

    let fields: [(&str, fn(&GroupKey) -> &str); 3] = [
        (columns.subject.as_str(), |k| k.subject.as_str()),
        (columns.session.as_str(), |k| k.session.as_str()),
        (columns.receipt.as_str(), |k| k.receipt.as_str()),
    ];
    for (field, get) in fields {
        let left_values: BTreeSet<&str> = left.rows.iter().map(|r| get(&r.key)).collect();
        let right_values: BTreeSet<&str> = right.rows.iter().map(|r| get(&r.key)).collect();
        if left_values != right_values {
            return Err(AlignError::KeyMismatch {
                field: field.to_string(),
                only_left: left_values.difference(&right_values).map(|v| v.to_string()).collect(),
                only_right: right_values.difference(&left_values).map(|v| v.to_string()).collect(),
            });
        }
    }

    let left_keys: HashSet<&GroupKey> = left.rows.iter().map(|r| &r.key).collect();
    let right_keys: HashSet<&GroupKey> = right.rows.iter().map(|r| &r.key).collect();
    for (rows, other, present_in) in [
        (&left.rows, &right_keys, &left.name),
        (&right.rows, &left_keys, &right.name),
    ] {
        if let Some(row) = rows.iter().find(|r| !other.contains(&r.key)) {
            return Err(AlignError::GroupMismatch {
                key: row.key.to_string(),
                present_in: present_in.clone(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Partitioning
// ---------------------------------------------------------------------------

/// Rows of one table split by group key.
#[derive(Debug, Default)]
pub struct Partition {
    /// Keys in first-encounter order.
    pub keys: Vec<GroupKey>,
    groups: HashMap<GroupKey, Vec<ReceiptRow>>,
}

impl Partition {
    pub fn of(table: &ReceiptTable) -> Self {
        let mut partition = Self::default();
        for row in &table.rows {
            match partition.groups.get_mut(&row.key) {
                Some(rows) => rows.push(row.clone()),
                None => {
                    partition.keys.push(row.key.clone());
                    partition.groups.insert(row.key.clone(), vec![row.clone()]);
                }
            }
        }
        partition
    }

    /// Rows of `key` in table order; empty when the key is absent.
    pub fn rows(&self, key: &GroupKey) -> &[ReceiptRow] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write merged rows as CSV: key columns, the merged item, its distance.
pub fn write_merged_csv<W: Write>(
    rows: &[MergedRow],
    columns: &ColumnMapping,
    writer: W,
) -> Result<(), AlignError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        columns.subject.as_str(),
        columns.session.as_str(),
        columns.receipt.as_str(),
        columns.item.as_str(),
        "Distance",
    ])?;
    for row in rows {
        let distance = row.distance.to_string();
        out.write_record([
            row.key.subject.as_str(),
            row.key.session.as_str(),
            row.key.receipt.as_str(),
            row.item.as_str(),
            distance.as_str(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

/// Write the full merge result (meta, summary, rows, review queue) as pretty JSON.
pub fn write_merge_json<W: Write>(output: &MergeOutput, writer: W) -> Result<(), AlignError> {
    serde_json::to_writer_pretty(writer, output).map_err(std::io::Error::from)?;
    Ok(())
}
