use crate::error::RecordError;

/// One packet observation: `mac,rssi,motion`.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub id: String,
    pub strength: f64,
    pub motion: f64,
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, RecordError> {
    let raw = raw.trim();
    let value: f64 = raw.parse().map_err(|_| RecordError::InvalidNumber {
        field,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(RecordError::NonFinite { field });
    }
    Ok(value)
}

/// Parse a CSV record. Fields past the third are ignored and the identifier
/// is compared case-insensitively, so it is lower-cased here.
pub fn parse_record(line: &str, ignore_prefix: &str) -> Result<Observation, RecordError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(RecordError::Blank);
    }
    if !ignore_prefix.is_empty() && line.starts_with(ignore_prefix) {
        return Err(RecordError::Ignored);
    }

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 3 {
        return Err(RecordError::MissingFields(fields.len()));
    }

    let id = fields[0].trim().to_lowercase();
    let strength = parse_number("signal strength", fields[1])?;
    let motion = parse_number("motion", fields[2])?;
    Ok(Observation { id, strength, motion })
}
