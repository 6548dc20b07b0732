//! `COPY ... FROM stdin` support for DuckDB.
//!
//! DuckDB cannot read COPY data from the client, so the data lines are parsed
//! here (PostgreSQL text format) and loaded as batched INSERT statements:
//! - Tab-separated values
//! - `\N` as NULL
//! - Backslash escapes (`\t`, `\n`, `\\`, octal)

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum rows per generated INSERT statement
pub const MAX_ROWS_PER_INSERT: usize = 100;

/// Table and column list named by a `COPY ... FROM stdin` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTarget {
    pub schema: Option<String>,
    pub table: String,
    /// Empty when the statement has no column list
    pub columns: Vec<String>,
    /// False when the statement asks for CSV or binary data
    pub text_format: bool,
}

impl CopyTarget {
    /// Quoted, optionally schema-qualified table name
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }

    /// `INSERT INTO "t" ("a", "b") VALUES`
    fn insert_prefix(&self) -> String {
        if self.columns.is_empty() {
            format!("INSERT INTO {} VALUES\n", self.qualified_name())
        } else {
            let cols: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES\n",
                self.qualified_name(),
                cols.join(", ")
            )
        }
    }
}

/// Parse `COPY [ONLY] [schema.]table [(columns)] FROM stdin ...`.
///
/// Returns `None` for any other statement, including COPY from a file.
/// The PostgreSQL default schema `public` maps to DuckDB's default schema.
pub fn parse_copy_target(stmt: &str) -> Option<CopyTarget> {
    static RE_COPY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r#"(?is)^\s*COPY\s+(?:ONLY\s+)?(?:"?(\w+)"?\.)?"?(\w+)"?\s*(?:\(([^)]*)\))?\s+FROM\s+stdin\b(.*)$"#,
        )
        .unwrap()
    });
    static RE_NON_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(CSV|BINARY)\b").unwrap());

    let caps = RE_COPY.captures(stmt)?;

    let schema = caps
        .get(1)
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.eq_ignore_ascii_case("public"));
    let table = caps.get(2)?.as_str().to_string();
    let columns = caps
        .get(3)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|c| c.trim().trim_matches('"').to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let options = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

    Some(CopyTarget {
        schema,
        table,
        columns,
        text_format: !RE_NON_TEXT.is_match(options),
    })
}

/// A value from a COPY data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyValue {
    Null,
    Text(String),
}

/// Parse one data line (line ending already stripped) into values.
pub fn parse_data_line(line: &str) -> Vec<CopyValue> {
    line.split('\t').map(parse_value).collect()
}

fn parse_value(value: &str) -> CopyValue {
    if value == "\\N" {
        return CopyValue::Null;
    }
    CopyValue::Text(decode_escapes(value))
}

/// Decode PostgreSQL COPY text-format escape sequences
fn decode_escapes(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let Some(&next) = chars.peek() else {
            result.push('\\');
            break;
        };
        let decoded = match next {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '\\' => '\\',
            'b' => '\x08',
            'f' => '\x0C',
            'v' => '\x0B',
            '0'..='7' => {
                let mut octal = 0u32;
                let mut digits = 0;
                while digits < 3 {
                    match chars.peek() {
                        Some(&d @ '0'..='7') => {
                            octal = octal * 8 + d.to_digit(8).unwrap_or(0);
                            chars.next();
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                result.push(char::from_u32(octal & 0xFF).unwrap_or('\u{FFFD}'));
                continue;
            }
            other => other,
        };
        chars.next();
        result.push(decoded);
    }

    result
}

/// A column of the table a COPY loads into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
}

/// Columns receiving the data, in data-line order.
///
/// Without a column list every table column receives data. Names match
/// case-insensitively, as DuckDB resolves them.
pub fn resolve_columns(
    target: &CopyTarget,
    table_columns: Vec<TargetColumn>,
) -> Result<Vec<TargetColumn>, String> {
    if target.columns.is_empty() {
        return Ok(table_columns);
    }
    target
        .columns
        .iter()
        .map(|name| {
            table_columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| {
                    format!(
                        "column \"{}\" of relation \"{}\" does not exist",
                        name, target.table
                    )
                })
        })
        .collect()
}

/// Checks a parsed row can be answered without the database: column count
/// and NOT NULL columns.
pub fn check_row(columns: &[TargetColumn], row: &[CopyValue]) -> Result<(), String> {
    if row.len() > columns.len() {
        return Err(format!(
            "extra data after last expected column (expected {}, got {})",
            columns.len(),
            row.len()
        ));
    }
    if row.len() < columns.len() {
        return Err(format!(
            "missing data for column \"{}\"",
            columns[row.len()].name
        ));
    }
    for (column, value) in columns.iter().zip(row) {
        if column.not_null && *value == CopyValue::Null {
            return Err(format!(
                "null value in column \"{}\" violates not-null constraint",
                column.name
            ));
        }
    }
    Ok(())
}

/// `SELECT CAST(... AS type), ...` over one row; fails where the INSERT of
/// that row would fail a conversion.
pub fn build_row_check(columns: &[TargetColumn], row: &[CopyValue]) -> String {
    let casts: Vec<String> = columns
        .iter()
        .zip(row)
        .map(|(column, value)| format!("CAST({} AS {})", literal(value), column.data_type))
        .collect();
    format!("SELECT {};", casts.join(", "))
}

fn literal(value: &CopyValue) -> String {
    match value {
        CopyValue::Null => "NULL".to_string(),
        CopyValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

/// Build one INSERT for `rows`.
pub fn build_insert(target: &CopyTarget, rows: &[Vec<CopyValue>]) -> String {
    let mut insert = target.insert_prefix();

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            insert.push_str(",\n");
        }
        insert.push('(');
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                insert.push_str(", ");
            }
            insert.push_str(&literal(value));
        }
        insert.push(')');
    }

    insert.push(';');
    insert
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
