//! Utility types shared by the format and object layers.
//!
//! - [`TypeId`] - on-disk primitive types and their sizes
//! - [`EprPod`] - typed big-endian element access
//! - [`Value`] / [`ElemArray`] / [`Mjd`] - decoded field contents
//! - [`Error`] / [`Result`] - error handling

mod types;
mod value;
mod error;

pub use types::*;
pub use value::{ElemArray, Mjd, Value};
pub(crate) use value::{decode_elem, decode_elems, decode_string, encode_elem};
pub use error::*;
