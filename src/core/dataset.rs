//! Datasets: homogeneous sequences of records located by a DSD.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::util::{Error, Result};

use super::catalog::DatasetEntry;
use super::product::ProductInner;
use super::record::RecordOrigin;
use super::{Dsd, Record};

/// A dataset of an open product.
#[derive(Clone)]
pub struct Dataset {
    inner: Arc<ProductInner>,
    index: usize,
}

impl Dataset {
    pub(crate) fn new(inner: Arc<ProductInner>, index: usize) -> Self {
        Self { inner, index }
    }

    #[inline]
    fn entry(&self) -> &DatasetEntry {
        &self.inner.catalog.datasets[self.index]
    }

    fn open_entry(&self) -> Result<&DatasetEntry> {
        self.inner.check_open()?;
        Ok(self.entry())
    }

    pub fn get_name(&self) -> Result<&str> {
        Ok(&self.open_entry()?.name)
    }

    /// Name of the DSD the dataset is bound to.
    pub fn get_dsd_name(&self) -> Result<&str> {
        Ok(&self.open_entry()?.dsd.ds_name)
    }

    pub fn description(&self) -> Result<&str> {
        Ok(&self.open_entry()?.description)
    }

    pub fn get_num_records(&self) -> Result<u32> {
        Ok(self.open_entry()?.dsd.num_dsr)
    }

    pub fn get_dsd(&self) -> Result<Dsd> {
        Ok(self.open_entry()?.dsd.clone())
    }

    /// Size of one record in bytes.
    pub fn record_size(&self) -> Result<u32> {
        Ok(self.open_entry()?.info.tot_size)
    }

    /// Allocate an unassigned record with this dataset's layout.
    pub fn create_record(&self) -> Result<Record> {
        let entry = self.open_entry()?;
        Ok(Record::new(
            self.inner.clone(),
            RecordOrigin::Dataset(self.index),
            entry.info.clone(),
        ))
    }

    /// Read the record at `index` into a new record.
    pub fn read_record(&self, index: u32) -> Result<Record> {
        let mut record = self.create_record()?;
        self.read_record_into(index, &mut record)?;
        Ok(record)
    }

    /// Read the record at `index` into an existing record of this dataset.
    pub fn read_record_into(&self, index: u32, record: &mut Record) -> Result<()> {
        let entry = self.open_entry()?;
        if !Arc::ptr_eq(&record.product, &self.inner)
            || record.origin != RecordOrigin::Dataset(self.index)
            || !Arc::ptr_eq(&record.info, &entry.info)
        {
            return Err(Error::type_mismatch(
                format!("record of dataset {}", entry.name),
                format!("record of {}", record.dataset_name()),
            ));
        }
        let count = entry.dsd.num_dsr;
        if index >= count {
            return Err(Error::out_of_range("record", index, count));
        }

        let pos = entry.dsd.record_offset(index);
        trace!(dataset = %entry.name, index, pos, "read record");
        self.inner.with_streams(|s| s.read_into(pos, &mut record.buffer))?;
        record.index = Some(index);
        Ok(())
    }

    /// Read every record.
    pub fn records(&self) -> Result<Vec<Record>> {
        self.iter().collect()
    }

    /// Iterate over all records in index order.
    pub fn iter(&self) -> Records {
        match self.get_num_records() {
            Ok(count) => Records {
                dataset: self.clone(),
                next: 0,
                count,
                error: None,
            },
            Err(e) => Records {
                dataset: self.clone(),
                next: 0,
                count: 0,
                error: Some(e),
            },
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = Result<Record>;
    type IntoIter = Records;

    fn into_iter(self) -> Records {
        self.iter()
    }
}

/// Iterator over the records of a dataset.
pub struct Records {
    dataset: Dataset,
    next: u32,
    count: u32,
    error: Option<Error>,
}

impl Iterator for Records {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.error.take() {
            self.count = 0;
            return Some(Err(e));
        }
        if self.next >= self.count {
            return None;
        }
        let result = self.dataset.read_record(self.next);
        self.next += 1;
        if result.is_err() {
            self.count = 0;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.count.saturating_sub(self.next) as usize + self.error.is_some() as usize;
        (n, Some(n))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = self.entry();
        write!(f, "epr.Dataset({}) {} records", entry.name, entry.dsd.num_dsr)
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
