//! Identifier and coordinate types shared across the lineage crates.

use crate::error::LineageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Lab artifact node in the lineage graph
    AssetId
);
define_id!(
    /// Biological sample
    SampleId
);
define_id!(
    /// Study that owns samples, asset groups and requests
    StudyId
);
define_id!(
    /// Sequencing index tag
    TagId
);
define_id!(
    /// Ordered collection of tags
    TagGroupId
);
define_id!(
    /// Study-scoped working set of assets
    AssetGroupId
);
define_id!(
    /// Unit of lab work
    RequestId
);
define_id!(
    /// Requests submitted (and pooled) together
    SubmissionId
);
define_id!(
    /// Batch of requests processed on one plate
    BatchId
);
define_id!(
    /// Acting user, used for audit attribution
    UserId
);
define_id!(
    /// Audit record
    AuditId
);

/// Plate coordinate such as `A1` or `H12`.
///
/// Ordering is column-major (A1, B1, ... H1, A2, ...), which is the order
/// tags are laid out across a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWellPosition")]
pub struct WellPosition {
    column: u16,
    row: u8,
}

#[derive(Deserialize)]
struct RawWellPosition {
    column: u16,
    row: u8,
}

impl TryFrom<RawWellPosition> for WellPosition {
    type Error = LineageError;

    fn try_from(raw: RawWellPosition) -> Result<Self, Self::Error> {
        Self::new(raw.row, raw.column)
    }
}

impl WellPosition {
    /// Rows run `A` to `Z`
    pub const ROWS: u8 = 26;

    /// Build a position from a 0-based row (`A` = 0) and a 1-based column
    ///
    /// # Errors
    /// `InvalidWellPosition` when the row is past `Z` or the column is 0
    pub fn new(row: u8, column: u16) -> Result<Self, LineageError> {
        if row >= Self::ROWS || column == 0 {
            return Err(LineageError::InvalidWellPosition(format!(
                "row {row}, column {column}"
            )));
        }
        Ok(Self { column, row })
    }

    /// 0-based row
    #[inline]
    #[must_use]
    pub fn row(&self) -> u8 {
        self.row
    }

    /// 1-based column
    #[inline]
    #[must_use]
    pub fn column(&self) -> u16 {
        self.column
    }

    /// Row letter (`A`..`Z`)
    #[must_use]
    pub fn row_letter(&self) -> char {
        char::from(b'A' + self.row)
    }
}

impl fmt::Display for WellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.column)
    }
}

impl FromStr for WellPosition {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LineageError::InvalidWellPosition(s.to_string());
        let mut chars = s.trim().chars();
        let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(invalid());
        }
        let column: u16 = chars.as_str().parse().map_err(|_| invalid())?;
        let row = u8::try_from(u32::from(letter) - u32::from('A')).map_err(|_| invalid())?;
        Self::new(row, column).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_position_parses_and_prints() {
        let pos: WellPosition = "h12".parse().unwrap();
        assert_eq!(pos, WellPosition::new(7, 12).unwrap());
        assert_eq!(pos.to_string(), "H12");
    }

    #[test]
    fn well_position_rejects_garbage() {
        assert!("".parse::<WellPosition>().is_err());
        assert!("A0".parse::<WellPosition>().is_err());
        assert!("1A".parse::<WellPosition>().is_err());
        assert!("Ax".parse::<WellPosition>().is_err());
    }

    #[test]
    fn rows_past_z_are_rejected() {
        assert!(WellPosition::new(25, 1).is_ok());
        assert!(matches!(
            WellPosition::new(26, 1),
            Err(LineageError::InvalidWellPosition(_))
        ));
        assert!(WellPosition::new(200, 1).is_err());
        assert!(WellPosition::new(0, 0).is_err());

        let decoded: WellPosition = serde_json::from_str(r#"{"column":3,"row":1}"#).unwrap();
        assert_eq!(decoded.to_string(), "B3");
        assert!(serde_json::from_str::<WellPosition>(r#"{"column":1,"row":191}"#).is_err());
    }

    #[test]
    fn well_positions_sort_column_major() {
        let mut wells: Vec<WellPosition> = ["A2", "B1", "A1", "H1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        wells.sort();
        let labels: Vec<String> = wells.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["A1", "B1", "H1", "A2"]);
    }

    #[test]
    fn ids_round_trip_through_display() {
        let id = AssetId::new();
        let parsed: AssetId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
