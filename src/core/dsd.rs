//! Dataset descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::dataset_name_from_dsd;

/// One entry of the product's DSD table: where a dataset lives and how its
/// records are sized.
///
/// A `Dsd` is an immutable snapshot. Two descriptors compare equal when they
/// describe the same table slot of the same open product; descriptors of
/// two products never compare equal, even for identical files.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dsd {
    /// Identity of the product the table was read from (0 when detached).
    #[serde(skip)]
    pub(crate) product: u64,
    /// Position in the DSD table.
    pub index: u32,
    pub ds_name: String,
    pub ds_type: char,
    pub filename: String,
    pub ds_offset: u64,
    pub ds_size: u64,
    pub num_dsr: u32,
    pub dsr_size: u32,
}

impl Dsd {
    /// Dataset name derived from `ds_name` (spaces replaced by `_`).
    pub fn dataset_name(&self) -> String {
        dataset_name_from_dsd(&self.ds_name)
    }

    /// True if the descriptor points at records stored in this file.
    pub fn has_data(&self) -> bool {
        self.ds_offset > 0 && self.num_dsr > 0 && self.dsr_size > 0
    }

    /// File offset of the record with the given index.
    #[inline]
    pub fn record_offset(&self, index: u32) -> u64 {
        self.ds_offset + index as u64 * self.dsr_size as u64
    }
}

impl fmt::Display for Dsd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epr.DSD(\"{}\")", self.ds_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dsd(index: u32) -> Dsd {
        Dsd {
            product: 1,
            index,
            ds_name: "MDS1 SQ ADS".into(),
            ds_type: 'A',
            filename: String::new(),
            ds_offset: 7346,
            ds_size: 170,
            num_dsr: 1,
            dsr_size: 170,
        }
    }

    #[test]
    fn test_dsd_geometry() {
        let d = dsd(0);
        assert!(d.has_data());
        assert_eq!(d.dataset_name(), "MDS1_SQ_ADS");
        assert_eq!(d.record_offset(2), 7346 + 340);
        assert_eq!(d.to_string(), "epr.DSD(\"MDS1 SQ ADS\")");
    }

    #[test]
    fn test_dsd_equality_by_slot() {
        assert_eq!(dsd(0), dsd(0));
        assert_ne!(dsd(1), dsd(2));

        let other = Dsd {
            product: 2,
            ..dsd(0)
        };
        assert_ne!(dsd(0), other);
    }
}
