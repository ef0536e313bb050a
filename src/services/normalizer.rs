//! Record normalization - raw tabular rows to typed attendees
//!
//! Rows without a usable email are dropped with a warning; they never abort the
//! batch on their own.

use crate::domain::types::{non_blank, Attendee, ColumnMapping, Record};
use crate::infra::error::ImportError;
use tracing::debug;

/// Attendees that survived normalization plus per-row warnings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    pub attendees: Vec<Attendee>,
    pub warnings: Vec<String>,
}

/// Normalize records in input order
pub fn normalize_records(
    records: &[Record],
    mapping: &ColumnMapping,
) -> Result<NormalizedBatch, ImportError> {
    let email_column = mapping.email_column().ok_or(ImportError::MissingEmailMapping)?;
    if records.is_empty() {
        return Err(ImportError::EmptyInput);
    }

    let mut batch = NormalizedBatch::default();
    for (i, record) in records.iter().enumerate() {
        match normalize_record(record, email_column, mapping) {
            Some(attendee) => batch.attendees.push(attendee),
            None => {
                debug!(row = %(i + 1), "row_rejected_invalid_email");
                batch.warnings.push(format!("Row {}: missing or invalid email", i + 1));
            }
        }
    }

    if batch.attendees.is_empty() {
        return Err(ImportError::NoValidAttendees { rejected: batch.warnings.len() });
    }

    Ok(batch)
}

fn normalize_record(record: &Record, email_column: &str, mapping: &ColumnMapping) -> Option<Attendee> {
    let email = field(record, Some(email_column))?;
    if !is_valid_email(email) {
        return None;
    }

    let name = match mapping.name.as_deref() {
        Some(column) => field(record, Some(column)).map(str::to_string),
        None => combine_name(
            field(record, mapping.first_name.as_deref()),
            field(record, mapping.last_name.as_deref()),
        ),
    };

    Some(Attendee {
        email: email.to_string(),
        name,
        phone: owned(record, mapping.phone.as_deref()),
        registration_date: owned(record, mapping.registration_date.as_deref()),
        attendance_date: owned(record, mapping.attendance_date.as_deref()),
        ticket_type: owned(record, mapping.ticket_type.as_deref()),
        status: owned(record, mapping.status.as_deref()),
        has_joined_event: field(record, mapping.has_joined_event.as_deref()).map(is_truthy),
    })
}

/// Look up a mapped column. Exact header first, then a trimmed case-insensitive
/// match so stray whitespace in exported headers still resolves.
fn field<'a>(record: &'a Record, column: Option<&str>) -> Option<&'a str> {
    let column = non_blank(column)?;
    let raw = match record.get(column) {
        Some(v) => v,
        None => record
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(column))
            .map(|(_, v)| v)?,
    };
    non_blank(Some(raw.as_str()))
}

fn owned(record: &Record, column: Option<&str>) -> Option<String> {
    field(record, column).map(str::to_string)
}

fn combine_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    match (first, last) {
        (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
        (Some(f), None) => Some(f.to_string()),
        (None, Some(l)) => Some(l.to_string()),
        (None, None) => None,
    }
}

/// Truthy spreadsheet markers: true, yes, y, 1, x
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1" | "x")
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty() && !domain.starts_with('.'),
        None => false,
    }
}
