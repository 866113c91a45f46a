/// CSV ingestion for persona and query fan-out tables.
///
/// Tables arrive either as uploaded files or as text produced by a language model,
/// which usually wraps the CSV in a fenced ```csv block. Required columns are checked
/// up front and reported together; extra columns are ignored.
use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::AppError;
use crate::model::{PersonaRecord, QueryIntentRecord};

pub const PERSONA_COLUMNS: [&str; 6] = [
    "persona_name",
    "summary",
    "goals",
    "pain_points",
    "keywords",
    "preferred_formats",
];

pub const QUERY_FAN_OUT_COLUMNS: [&str; 4] = ["query", "type", "user_intent", "reasoning"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PersonaRow {
    persona_name: Option<String>,
    summary: Option<String>,
    goals: Option<String>,
    pain_points: Option<String>,
    keywords: Option<String>,
    preferred_formats: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryIntentRow {
    query: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    user_intent: Option<String>,
    reasoning: Option<String>,
}

/// Pull the CSV payload out of a model reply.
///
/// Returns the body of the first fenced ```csv block, or the whole reply trimmed when
/// there is none.
pub fn extract_csv_block(text: &str) -> &str {
    let fence = Regex::new(r"(?s)```csv[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("valid regex");
    match fence.captures(text).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str(),
        None => text.trim(),
    }
}

/// Parse a persona table. Blank optional cells become empty strings.
pub fn parse_personas(text: &str) -> Result<Vec<PersonaRecord>, AppError> {
    let rows: Vec<(u64, PersonaRow)> = read_rows(text, "persona", &PERSONA_COLUMNS)?;

    rows.into_iter()
        .map(|(line, row)| {
            let name = row.persona_name.unwrap_or_default();
            if name.is_empty() {
                return Err(AppError::Parse {
                    line,
                    message: "persona_name must not be empty".to_string(),
                });
            }
            Ok(PersonaRecord {
                name,
                summary: row.summary.unwrap_or_default(),
                goals: row.goals.unwrap_or_default(),
                pain_points: row.pain_points.unwrap_or_default(),
                keywords: row.keywords.unwrap_or_default(),
                preferred_formats: row.preferred_formats.unwrap_or_default(),
            })
        })
        .collect()
}

/// Parse a query fan-out table.
pub fn parse_query_intents(text: &str) -> Result<Vec<QueryIntentRecord>, AppError> {
    let rows: Vec<(u64, QueryIntentRow)> =
        read_rows(text, "query fan-out", &QUERY_FAN_OUT_COLUMNS)?;

    Ok(rows
        .into_iter()
        .map(|(_, row)| QueryIntentRecord {
            query: row.query.unwrap_or_default(),
            kind: row.kind.unwrap_or_default(),
            user_intent: row.user_intent.unwrap_or_default(),
            reasoning: row.reasoning.unwrap_or_default(),
        })
        .collect())
}

/// Read every data row with its source line number.
fn read_rows<T: DeserializeOwned>(
    text: &str,
    kind: &'static str,
    required: &[&str],
) -> Result<Vec<(u64, T)>, AppError> {
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(AppError::MissingInput(format!("{kind} CSV is empty")));
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: StringRecord = reader.headers().map_err(csv_error)?.clone();
    let missing: Vec<String> = required
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::MissingColumns {
            kind,
            columns: missing,
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: T = record.deserialize(Some(&headers)).map_err(csv_error)?;
        rows.push((line, row));
    }

    if rows.is_empty() {
        return Err(AppError::MissingInput(format!("{kind} CSV has no rows")));
    }
    Ok(rows)
}

fn csv_error(err: csv::Error) -> AppError {
    AppError::Parse {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        message: err.to_string(),
    }
}
