// src/domain/changes.rs

use crate::domain::snapshot::Snapshot;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The fields whose change makes a listing "updated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Price,
    Floor,
    ImageCount,
    Area,
}

impl TrackedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Price => "price",
            TrackedField::Floor => "floor",
            TrackedField::ImageCount => "image_count",
            TrackedField::Area => "area",
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackedField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(TrackedField::Price),
            "floor" => Ok(TrackedField::Floor),
            "image_count" => Ok(TrackedField::ImageCount),
            "area" => Ok(TrackedField::Area),
            other => Err(format!("unknown tracked field '{other}'")),
        }
    }
}

/// A single field-level delta between two snapshots of the same listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub field: TrackedField,
    pub old_value: String,
    pub new_value: String,
}

/// What the tracker decided about one listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    New,
    Unchanged,
    Changed(Vec<ChangeRecord>),
}

/// Compares the tracked fields of a stored snapshot with a fresh one.
///
/// Output order is always price, floor, image count, area. Floor and area are
/// only reported when the new value is positive: the feed omits them on some
/// re-fetches, and an omission is not a change.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    macro_rules! compare {
        ($field:ident, $kind:expr, $reportable:expr) => {
            if old.$field != new.$field && $reportable {
                changes.push(ChangeRecord {
                    field: $kind,
                    old_value: old.$field.to_string(),
                    new_value: new.$field.to_string(),
                });
            }
        };
    }

    compare!(price, TrackedField::Price, true);
    compare!(floor, TrackedField::Floor, new.floor > 0);
    compare!(image_count, TrackedField::ImageCount, true);
    compare!(area, TrackedField::Area, new.area > 0.0);

    changes
}
