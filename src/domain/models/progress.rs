//! Progress readings and the parsers that produce them from probe output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::ParseError;

/// Precision a data source reports its sync percent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPrecision {
    /// Fraction discarded (`cardano-cli query tip`).
    Integer,
    /// Fraction kept (db-sync SQL progress).
    Float,
}

impl SyncPrecision {
    /// Normalize a raw percent to this precision.
    pub fn normalize(self, percent: f64) -> f64 {
        match self {
            Self::Integer => percent.trunc(),
            Self::Float => percent,
        }
    }
}

/// One normalized observation of a chain follower's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReading {
    pub epoch: Option<u64>,
    pub block: u64,
    pub hash: String,
    pub slot: u64,
    /// Always lowercase.
    pub era: String,
    /// `None` until the source reports a percent.
    pub sync_percent: Option<f64>,
}

impl ProgressReading {
    /// Parse a `query tip` JSON document.
    ///
    /// `epoch`, `block` and `slot` accept numbers or numeric strings. A missing
    /// `syncProgress` yields `sync_percent = None`; a present one is normalized
    /// to `precision`.
    pub fn from_tip_json(raw: &str, precision: SyncPrecision) -> Result<Self, ParseError> {
        let doc: Value =
            serde_json::from_str(raw.trim()).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        let obj = doc
            .as_object()
            .ok_or_else(|| ParseError::InvalidJson("expected a JSON object".to_string()))?;

        let epoch = match obj.get("epoch") {
            None | Some(Value::Null) => None,
            Some(value) => Some(coerce_u64("epoch", value)?),
        };
        let block = coerce_u64("block", obj.get("block").ok_or(ParseError::MissingField("block"))?)?;
        let slot = coerce_u64("slot", obj.get("slot").ok_or(ParseError::MissingField("slot"))?)?;
        let hash = obj
            .get("hash")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingField("hash"))?
            .to_string();
        let era = obj
            .get("era")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingField("era"))?
            .to_lowercase();
        let sync_percent = match obj.get("syncProgress") {
            None => None,
            Some(value) => Some(precision.normalize(coerce_percent("syncProgress", value)?)),
        };

        Ok(Self {
            epoch,
            block,
            hash,
            slot,
            era,
            sync_percent,
        })
    }

    /// Build a reading from a db-sync tip row and its progress value.
    pub fn from_db_sync(tip: DbSyncTip, percent: f64) -> Self {
        Self {
            epoch: tip.epoch,
            block: tip.block,
            hash: tip.hash,
            slot: tip.slot,
            era: String::new(),
            sync_percent: Some(SyncPrecision::Float.normalize(percent)),
        }
    }
}

/// Outcome of a single poll attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    Ok(ProgressReading),
    TransientFailure(String),
}

impl PollResult {
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Latest block row written by db-sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSyncTip {
    pub epoch: Option<u64>,
    pub block: u64,
    pub hash: String,
    pub slot: u64,
}

/// Parse `sync_percent | epoch_no | block_no | hash | slot_no` from the
/// db-sync progress query (`psql -qt` output).
pub fn parse_db_sync_row(raw: &str) -> Result<(f64, DbSyncTip), ParseError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| ParseError::UnexpectedRow(raw.to_string()))?;
    let cols: Vec<&str> = line.split('|').map(str::trim).collect();
    let [percent, epoch, block, hash, slot] = cols.as_slice() else {
        return Err(ParseError::UnexpectedRow(line.to_string()));
    };

    let percent = percent.parse::<f64>().map_err(|_| ParseError::NotANumber {
        field: "sync_percent",
        value: (*percent).to_string(),
    })?;
    let percent = check_percent("sync_percent", percent)?;

    let epoch = if epoch.is_empty() {
        None
    } else {
        Some(parse_u64_str("epoch_no", epoch)?)
    };

    let tip = DbSyncTip {
        epoch,
        block: parse_u64_str("block_no", block)?,
        hash: (*hash).to_string(),
        slot: if slot.is_empty() { 0 } else { parse_u64_str("slot_no", slot)? },
    };
    Ok((percent, tip))
}

/// Split `--version` output into (version text, git revision).
///
/// `cardano-cli` prints `git rev <sha>`, `cardano-db-sync` prints
/// `git revision <sha>`; the caller passes the marker.
pub fn parse_version_output(
    output: &str,
    marker: &'static str,
) -> Result<(String, String), ParseError> {
    let output = output.trim();
    let (version, revision) =
        output
            .split_once(marker)
            .ok_or_else(|| ParseError::MissingVersionMarker {
                marker,
                output: output.to_string(),
            })?;
    Ok((version.trim().to_string(), revision.trim().to_string()))
}

fn coerce_u64(field: &'static str, value: &Value) -> Result<u64, ParseError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64))
            .ok_or_else(|| ParseError::NotANumber {
                field,
                value: n.to_string(),
            }),
        Value::String(s) => parse_u64_str(field, s.trim()),
        other => Err(ParseError::NotANumber {
            field,
            value: other.to_string(),
        }),
    }
}

fn coerce_percent(field: &'static str, value: &Value) -> Result<f64, ParseError> {
    let percent = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ParseError::NotANumber {
        field,
        value: value.to_string(),
    })?;
    check_percent(field, percent)
}

fn check_percent(field: &'static str, percent: f64) -> Result<f64, ParseError> {
    if percent.is_nan() || percent < 0.0 {
        return Err(ParseError::NotANumber {
            field,
            value: percent.to_string(),
        });
    }
    Ok(percent.min(100.0))
}

fn parse_u64_str(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value
        .parse::<u64>()
        .or_else(|_| {
            value
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
                .ok_or(())
        })
        .map_err(|()| ParseError::NotANumber {
            field,
            value: value.to_string(),
        })
}
