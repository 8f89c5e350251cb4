//! ENVISAT product file constants.

/// Size of the Main Product Header in bytes.
pub const MPH_SIZE: usize = 1247;

/// Nominal size of one DSD entry in bytes (the MPH `DSD_SIZE` value wins).
pub const DSD_SIZE: usize = 280;

/// Every product starts with this MPH keyword.
pub const PRODUCT_MAGIC: &[u8; 9] = b"PRODUCT=\"";

/// Number of characters of the product name used as the product id.
pub const PRODUCT_ID_LEN: usize = 48;

/// Number of characters of the product name naming the product type.
pub const PRODUCT_TYPE_LEN: usize = 10;

/// Separator between keyword and value in header lines.
pub const KEYWORD_SEPARATOR: u8 = b'=';

/// Header line terminator.
pub const LINE_TERMINATOR: u8 = b'\n';

/// DSD type of measurement datasets.
pub const DS_TYPE_MEASUREMENT: char = 'M';

/// DSD type of annotation datasets.
pub const DS_TYPE_ANNOTATION: char = 'A';

/// DSD type of global annotation datasets.
pub const DS_TYPE_GLOBAL: char = 'G';

/// DSD type of references to external files.
pub const DS_TYPE_REFERENCE: char = 'R';

/// Name of the single field of records with no DDDB layout.
pub const GENERIC_FIELD_NAME: &str = "raw";

/// Environment variable naming a DDDB JSON file.
pub const DDDB_ENV_VAR: &str = "ENVISAT_DDDB";

/// Turn a DSD name into a dataset name (`"MDS1 SQ ADS"` -> `"MDS1_SQ_ADS"`).
#[inline]
pub fn dataset_name_from_dsd(ds_name: &str) -> String {
    ds_name.trim().replace(' ', "_")
}

/// Check whether a buffer starts like an ENVISAT product.
#[inline]
pub fn has_product_magic(data: &[u8]) -> bool {
    data.len() >= PRODUCT_MAGIC.len() && &data[..PRODUCT_MAGIC.len()] == PRODUCT_MAGIC
}
