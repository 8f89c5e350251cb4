//! Product: the root of the object model.
//!
//! A product owns the open file, the parsed headers and the dataset and band
//! tables. [`Dataset`], [`Band`] and [`Record`] hold a shared handle to the
//! product state and check its open flag on every access, so closing the
//! product invalidates everything derived from it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::format::{
    Dddb, HeaderBlock, OpenMode, ProductHeader, ProductStreams, PRODUCT_TYPE_LEN,
};
use crate::util::{Error, Result};

use super::catalog::Catalog;
use super::record::RecordOrigin;
use super::{Band, BitmaskEvaluator, Dataset, Dsd, FlagExpressionEvaluator, Raster, Record};

/// MERIS IODD version of products written by software 5.x and later.
const MERIS_IODD_LATEST: u32 = 7;
/// MERIS IODD version of products written by software 4.x and earlier.
const MERIS_IODD_LEGACY: u32 = 6;

/// Identity handed to the next opened product.
static NEXT_PRODUCT: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Shared State
// ============================================================================

/// Product state shared by every derived object.
pub(crate) struct ProductInner {
    pub file_path: PathBuf,
    pub mode: OpenMode,
    pub tot_size: u64,
    pub id_string: String,
    pub product_type: String,
    pub meris_iodd_version: u32,
    pub header: ProductHeader,
    pub catalog: Catalog,
    /// `None` once the product is closed
    streams: Mutex<Option<ProductStreams>>,
}

impl ProductInner {
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.streams.lock().is_none()
    }

    #[inline]
    pub fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Run `f` on the open streams.
    pub fn with_streams<T>(&self, f: impl FnOnce(&mut ProductStreams) -> Result<T>) -> Result<T> {
        let mut guard = self.streams.lock();
        let streams = guard.as_mut().ok_or(Error::Closed)?;
        f(streams)
    }

    /// Release the file. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        let Some(mut streams) = self.streams.lock().take() else {
            return false;
        };
        if let Err(e) = streams.flush() {
            warn!(path = %self.file_path.display(), error = %e, "flush on close failed");
        }
        debug!(path = %self.file_path.display(), "closed product");
        true
    }

    pub fn header_block(&self, origin: RecordOrigin) -> Option<&HeaderBlock> {
        match origin {
            RecordOrigin::Mph => Some(&self.header.mph),
            RecordOrigin::Sph => Some(&self.header.sph),
            RecordOrigin::Dataset(_) => None,
        }
    }
}

/// MERIS IODD version from the MPH `SOFTWARE_VER` (`"MERIS/4.10"`).
fn detect_meris_iodd(product_type: &str, mph: &HeaderBlock) -> u32 {
    if !product_type.starts_with("MER_") {
        return 0;
    }
    let major = mph
        .get_str("SOFTWARE_VER")
        .and_then(|v| v.strip_prefix("MERIS/"))
        .and_then(|v| v.split('.').next())
        .and_then(|m| m.trim().parse::<u32>().ok());
    match major {
        Some(m) if m < 5 => MERIS_IODD_LEGACY,
        _ => MERIS_IODD_LATEST,
    }
}

// ============================================================================
// Open Options
// ============================================================================

/// Options for opening a product.
#[derive(Clone)]
pub struct OpenOptions {
    mode: OpenMode,
    use_mmap: bool,
    dddb: Option<Arc<Dddb>>,
    evaluator: Option<Arc<dyn BitmaskEvaluator>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenOptions {
    /// Read-only, memory-mapped, DDDB from `$ENVISAT_DDDB` or the built-in one.
    pub fn new() -> Self {
        Self {
            mode: OpenMode::ReadOnly,
            use_mmap: true,
            dddb: None,
            evaluator: None,
        }
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Memory-map read-only products (ignored without the `mmap` feature).
    pub fn use_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Use this data description database instead of `$ENVISAT_DDDB`.
    pub fn dddb(mut self, dddb: impl Into<Arc<Dddb>>) -> Self {
        self.dddb = Some(dddb.into());
        self
    }

    /// Replace the bitmask expression evaluator.
    pub fn evaluator(mut self, evaluator: Arc<dyn BitmaskEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Open a product file.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Product> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid("empty product path"));
        }

        let mut streams = ProductStreams::open(path, self.mode, self.use_mmap)?;
        let mut header = ProductHeader::read(&mut streams)?;
        let product = NEXT_PRODUCT.fetch_add(1, Ordering::Relaxed);
        for dsd in &mut header.dsds {
            dsd.product = product;
        }
        let id_string = header.id_string();
        let product_type: String = id_string.chars().take(PRODUCT_TYPE_LEN).collect();

        let fallback;
        let dddb = match &self.dddb {
            Some(d) => d.as_ref(),
            None => {
                fallback = match Dddb::from_env()? {
                    Some(d) => Arc::new(d),
                    None => Dddb::builtin()?,
                };
                fallback.as_ref()
            }
        };
        let spec = dddb.find(&product_type);
        if let Some(spec) = spec {
            spec.validate()?;
        } else {
            debug!(%product_type, "no DDDB entry, using generic layout");
        }

        let catalog = Catalog::build(&header, spec, &mut streams)?;
        let meris_iodd_version = detect_meris_iodd(&product_type, &header.mph);

        debug!(
            path = %path.display(),
            mode = self.mode.as_str(),
            mapped = streams.is_mapped(),
            id = %id_string,
            "opened product"
        );

        let inner = ProductInner {
            file_path: path.to_path_buf(),
            mode: self.mode,
            tot_size: streams.size(),
            id_string,
            product_type,
            meris_iodd_version,
            header,
            catalog,
            streams: Mutex::new(Some(streams)),
        };
        let evaluator = self
            .evaluator
            .clone()
            .unwrap_or_else(|| Arc::new(FlagExpressionEvaluator));

        Ok(Product {
            inner: Arc::new(inner),
            evaluator,
        })
    }
}

// ============================================================================
// Product
// ============================================================================

/// An open ENVISAT product file.
///
/// Dropping the product closes it.
pub struct Product {
    inner: Arc<ProductInner>,
    evaluator: Arc<dyn BitmaskEvaluator>,
}

impl Product {
    /// Open a product read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    /// Open a product with a mode string (`"rb"`, `"rb+"`, `"r+b"`).
    pub fn open_with_mode(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        OpenOptions::new().mode(OpenMode::parse(mode)?).open(path)
    }

    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    pub fn mode(&self) -> OpenMode {
        self.inner.mode
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Release the file. Calling it again does nothing.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Commit in-place field writes to storage. Does nothing on read-only or
    /// closed products.
    pub fn flush(&self) -> Result<()> {
        match self.inner.with_streams(|s| s.flush()) {
            Err(Error::Closed) => Ok(()),
            other => other,
        }
    }

    // === Metadata ===

    /// File size in bytes.
    pub fn tot_size(&self) -> Result<u64> {
        self.inner.check_open()?;
        Ok(self.inner.tot_size)
    }

    /// Product id: the first 48 characters of the MPH `PRODUCT` value.
    pub fn id_string(&self) -> Result<&str> {
        self.inner.check_open()?;
        Ok(&self.inner.id_string)
    }

    /// Product type: the first 10 characters of the id.
    pub fn product_type(&self) -> Result<&str> {
        self.inner.check_open()?;
        Ok(&self.inner.product_type)
    }

    /// MERIS IODD version, 0 for other instruments.
    pub fn meris_iodd_version(&self) -> Result<u32> {
        self.inner.check_open()?;
        Ok(self.inner.meris_iodd_version)
    }

    pub fn get_scene_width(&self) -> Result<u32> {
        self.inner.check_open()?;
        Ok(self.inner.catalog.scene_width)
    }

    pub fn get_scene_height(&self) -> Result<u32> {
        self.inner.check_open()?;
        Ok(self.inner.catalog.scene_height)
    }

    pub fn get_num_datasets(&self) -> Result<usize> {
        self.inner.check_open()?;
        Ok(self.inner.catalog.datasets.len())
    }

    pub fn get_num_dsds(&self) -> Result<usize> {
        self.inner.check_open()?;
        Ok(self.inner.header.dsds.len())
    }

    pub fn get_num_bands(&self) -> Result<usize> {
        self.inner.check_open()?;
        Ok(self.inner.catalog.bands.len())
    }

    pub fn get_dataset_names(&self) -> Result<Vec<&str>> {
        self.inner.check_open()?;
        Ok(self.inner.catalog.datasets.iter().map(|d| d.name.as_str()).collect())
    }

    pub fn get_band_names(&self) -> Result<Vec<&str>> {
        self.inner.check_open()?;
        Ok(self.inner.catalog.bands.iter().map(|b| b.name.as_str()).collect())
    }

    // === Lookups ===

    pub fn get_dataset(&self, name: &str) -> Result<Dataset> {
        self.inner.check_open()?;
        if name.is_empty() {
            return Err(Error::invalid("empty dataset name"));
        }
        self.inner
            .catalog
            .dataset_index(name)
            .map(|i| Dataset::new(self.inner.clone(), i))
            .ok_or_else(|| Error::not_found("dataset", name))
    }

    pub fn get_dataset_at(&self, index: usize) -> Result<Dataset> {
        self.inner.check_open()?;
        let count = self.inner.catalog.datasets.len();
        if index >= count {
            return Err(Error::out_of_range("dataset", index as u64, count as u64));
        }
        Ok(Dataset::new(self.inner.clone(), index))
    }

    pub fn get_band(&self, name: &str) -> Result<Band> {
        self.inner.check_open()?;
        if name.is_empty() {
            return Err(Error::invalid("empty band name"));
        }
        self.inner
            .catalog
            .band_index(name)
            .map(|i| Band::new(self.inner.clone(), i))
            .ok_or_else(|| Error::not_found("band", name))
    }

    pub fn get_band_at(&self, index: usize) -> Result<Band> {
        self.inner.check_open()?;
        let count = self.inner.catalog.bands.len();
        if index >= count {
            return Err(Error::out_of_range("band", index as u64, count as u64));
        }
        Ok(Band::new(self.inner.clone(), index))
    }

    pub fn get_dsd_at(&self, index: usize) -> Result<Dsd> {
        self.inner.check_open()?;
        let dsds = &self.inner.header.dsds;
        dsds.get(index)
            .cloned()
            .ok_or_else(|| Error::out_of_range("DSD", index as u64, dsds.len() as u64))
    }

    /// All DSDs in table order.
    pub fn get_dsds(&self) -> Result<Vec<Dsd>> {
        self.inner.check_open()?;
        Ok(self.inner.header.dsds.clone())
    }

    pub fn datasets(&self) -> Result<Vec<Dataset>> {
        self.inner.check_open()?;
        Ok((0..self.inner.catalog.datasets.len())
            .map(|i| Dataset::new(self.inner.clone(), i))
            .collect())
    }

    pub fn bands(&self) -> Result<Vec<Band>> {
        self.inner.check_open()?;
        Ok((0..self.inner.catalog.bands.len())
            .map(|i| Band::new(self.inner.clone(), i))
            .collect())
    }

    /// Main Product Header as a record.
    pub fn get_mph(&self) -> Result<Record> {
        self.inner.check_open()?;
        Ok(Record::from_header(self.inner.clone(), RecordOrigin::Mph))
    }

    /// Specific Product Header as a record.
    pub fn get_sph(&self) -> Result<Record> {
        self.inner.check_open()?;
        Ok(Record::from_header(self.inner.clone(), RecordOrigin::Sph))
    }

    /// Evaluate a bitmask expression into a `uchar` raster.
    pub fn read_bitmask_raster(
        &self,
        expr: &str,
        x_off: u32,
        y_off: u32,
        raster: &mut Raster,
    ) -> Result<()> {
        self.inner.check_open()?;
        self.evaluator.evaluate(self, expr, x_off, y_off, raster)
    }
}

impl Drop for Product {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl fmt::Debug for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Product")
            .field("file_path", &self.inner.file_path)
            .field("mode", &self.inner.mode)
            .field("id_string", &self.inner.id_string)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let catalog = &self.inner.catalog;
        writeln!(
            f,
            "epr.Product({}) {} datasets, {} bands",
            self.inner.id_string,
            catalog.datasets.len(),
            catalog.bands.len()
        )?;
        writeln!(f)?;
        for i in 0..catalog.datasets.len() {
            writeln!(f, "{}", Dataset::new(self.inner.clone(), i))?;
        }
        writeln!(f)?;
        for i in 0..catalog.bands.len() {
            writeln!(f, "{}", Band::new(self.inner.clone(), i))?;
        }
        Ok(())
    }
}
