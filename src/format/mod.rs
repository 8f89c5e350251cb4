//! Low-level ENVISAT product format.
//!
//! All multi-byte values are big-endian. Header blocks are ASCII.
//!
//! ## File Structure
//!
//! ```text
//! +---------------------+
//! | MPH                 |  1247 bytes, KEYWORD=value lines
//! +---------------------+
//! | SPH                 |  SPH_SIZE - NUM_DSD * DSD_SIZE bytes
//! | DSD table           |  NUM_DSD entries of DSD_SIZE bytes
//! +---------------------+
//! | Dataset records     |  DS_OFFSET + i * DSR_SIZE
//! | ...                 |
//! +---------------------+
//! ```
//!
//! Record layouts come from the data description database ([`Dddb`]);
//! datasets of unknown product types get a single raw byte field.

mod constants;
mod streams;
mod layout;
mod header;
mod dddb;

pub use constants::*;
pub use streams::*;
pub use layout::*;
pub use header::*;
pub use dddb::*;
