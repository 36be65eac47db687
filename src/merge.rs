//! Deterministic sort-merge reconciliation of two datasets.
//!
//! Given an existing dataset and an incoming one sharing the same schema,
//! [`merge`] produces a single deduplicated dataset in ascending key order.
//! On a key collision the incoming row wins (last-writer-wins at row
//! granularity). Both inputs are sorted by key and combined with a linear
//! two-pointer pass: O(n log n + m log m), one well-defined tie-break, no
//! dependence on map iteration order.
//!
//! Ascending key order is also the file's canonical on-disk row order after
//! a merge, which keeps successive merges idempotent and diff-friendly.
//!
//! Pure: no I/O anywhere in this module.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::dataset::{Dataset, EffectiveKey, Row};

/// Which input dataset a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Existing,
    Incoming,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("schema mismatch: existing columns {existing:?}, incoming columns {incoming:?}")]
    SchemaMismatch {
        existing: Vec<String>,
        incoming: Vec<String>,
    },
    #[error("duplicate value {value:?} for key {key:?} in the {side} dataset")]
    DuplicateKey {
        key: String,
        value: String,
        side: Side,
    },
    #[error("empty value for key {key:?} in the {side} dataset")]
    EmptyKey { key: String, side: Side },
}

/// Merge behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Column to identify rows by. When absent (or not in the schema), rows
    /// are compared by whole-row identity instead.
    pub primary_key: Option<String>,
    /// Drop duplicate-key rows from the incoming dataset before validating,
    /// keeping the first occurrence. For sources known to repeat rows.
    pub dedupe_incoming: bool,
}

/// Merge `incoming` into `existing` by primary key.
///
/// Fails with [`MergeError::SchemaMismatch`] when the two sorted field-name
/// sets differ, and with [`MergeError::DuplicateKey`] when either side
/// contains two rows with the same key value. An empty key value is refused
/// because it silently collapses rows during the merge.
pub fn merge(
    existing: Dataset,
    incoming: Dataset,
    options: &MergeOptions,
) -> Result<Dataset, MergeError> {
    if existing.schema() != incoming.schema() {
        return Err(MergeError::SchemaMismatch {
            existing: existing.schema().field_names().to_vec(),
            incoming: incoming.schema().field_names().to_vec(),
        });
    }

    let key = EffectiveKey::resolve(options.primary_key.as_deref(), existing.schema());
    let schema = existing.schema().clone();

    let existing = keyed_rows(existing, &key);
    let mut incoming = keyed_rows(incoming, &key);

    if options.dedupe_incoming {
        let before = incoming.len();
        let mut seen = HashSet::new();
        incoming.retain(|(k, _)| seen.insert(k.clone()));
        if incoming.len() < before {
            debug!(
                dropped = before - incoming.len(),
                key = key.name(),
                "deduplicated incoming rows"
            );
        }
    }

    validate_keys(&existing, &key, Side::Existing)?;
    validate_keys(&incoming, &key, Side::Incoming)?;

    let existing = sorted_by_key(existing);
    let incoming = sorted_by_key(incoming);

    // Linear two-pointer merge over the two key-sorted sequences.
    let mut merged: Vec<Row> = Vec::with_capacity(existing.len() + incoming.len());
    let mut existing = existing.into_iter().peekable();
    let mut incoming = incoming.into_iter().peekable();
    loop {
        let take_incoming = match (existing.peek(), incoming.peek()) {
            (None, None) => break,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (Some((old_key, _)), Some((new_key, _))) => match new_key.cmp(old_key) {
                std::cmp::Ordering::Equal => {
                    // New overrides old: drop the existing row.
                    existing.next();
                    true
                }
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
            },
        };
        let next = if take_incoming {
            incoming.next()
        } else {
            existing.next()
        };
        if let Some((_, row)) = next {
            merged.push(row);
        }
    }

    Ok(Dataset::from_validated(schema, merged))
}

fn keyed_rows(dataset: Dataset, key: &EffectiveKey) -> Vec<(String, Row)> {
    dataset
        .into_rows()
        .into_iter()
        .map(|row| (key.key_of(&row), row))
        .collect()
}

fn validate_keys(
    rows: &[(String, Row)],
    key: &EffectiveKey,
    side: Side,
) -> Result<(), MergeError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for (value, _) in rows {
        if value.is_empty() {
            return Err(MergeError::EmptyKey {
                key: key.name().to_string(),
                side,
            });
        }
        if !seen.insert(value.as_str()) {
            return Err(MergeError::DuplicateKey {
                key: key.name().to_string(),
                value: value.clone(),
                side,
            });
        }
    }
    Ok(())
}

fn sorted_by_key(mut rows: Vec<(String, Row)>) -> Vec<(String, Row)> {
    rows.sort_by(|(a, _), (b, _)| a.cmp(b));
    rows
}
