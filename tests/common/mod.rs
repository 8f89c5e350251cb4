//! Synthetic ENVISAT products for integration tests.
//!
//! The product has a 12 x 20 pixel scene and three datasets:
//!
//! - `Quality_ADS`: one record holding the scene width, a scale factor and
//!   calibration values of the remaining numeric types
//! - `MDS1`: one record per scene line with radiance, flag and interleaved fields
//! - `Tie_points`: a 4 x 6 latitude grid sampled every 4 pixels and lines
//!
//! plus an empty reference DSD and one blank DSD slot.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use envisat::prelude::*;

pub const PRODUCT_NAME: &str = "MER_RR__2PNPDE20030101_101010_000000982013_00065_04496_0000.N1";
pub const PRODUCT_ID: &str = "MER_RR__2PNPDE20030101_101010_000000982013_00065";

pub const SCENE_WIDTH: u32 = 12;
pub const SCENE_HEIGHT: u32 = 20;
pub const SCALE_FACTOR: f32 = 0.1;
pub const SCALE_OFFSET: f64 = -0.1;
pub const LINE_SHIFT: i32 = -5;
pub const GAIN: f64 = 2.5;
pub const BIAS: i8 = -3;

pub const MPH_SIZE: usize = 1247;
pub const DSD_SIZE: usize = 280;
pub const NUM_DSD: usize = 5;
const SPH_TEXT_SIZE: usize = 256;
pub const SPH_SIZE: usize = SPH_TEXT_SIZE + NUM_DSD * DSD_SIZE;

/// time(12) + uchar + spare(3) + uint + float + int + double + char
pub const QUALITY_DSR_SIZE: u32 = 12 + 1 + 3 + 4 + 4 + 4 + 8 + 1;
/// time(12) + uchar + spare + 12 ushort + 12 uchar + 24 short
pub const MDS_DSR_SIZE: u32 = 12 + 1 + 1 + 24 + 12 + 48;
pub const TIE_DSR_SIZE: u32 = 12 + 4 * 4;
pub const TIE_COLS: u32 = 4;
pub const TIE_ROWS: u32 = 6;

pub const QUALITY_OFFSET: u64 = (MPH_SIZE + SPH_SIZE) as u64;
pub const MDS_OFFSET: u64 = QUALITY_OFFSET + QUALITY_DSR_SIZE as u64;
pub const TIE_OFFSET: u64 = MDS_OFFSET + (MDS_DSR_SIZE * SCENE_HEIGHT) as u64;
pub const TOTAL_SIZE: u64 = TIE_OFFSET + (TIE_DSR_SIZE * TIE_ROWS) as u64;

/// Byte offset of the `radiance` field within an MDS1 record.
pub const RADIANCE_FIELD_OFFSET: u32 = 14;

pub const FLAG_LAND: u8 = 1;
pub const FLAG_CLOUD: u8 = 2;
pub const FLAG_ICE: u8 = 4;

/// Stored radiance count of scene pixel `(x, y)`.
pub fn radiance_raw(x: u32, y: u32) -> u16 {
    (y * 100 + x) as u16
}

/// Stored flag byte of scene pixel `(x, y)`.
pub fn l2_flags(x: u32, y: u32) -> u8 {
    let mut flags = 0;
    if x < 6 {
        flags |= FLAG_LAND;
    }
    if y % 2 == 0 {
        flags |= FLAG_CLOUD;
    }
    if x == y {
        flags |= FLAG_ICE;
    }
    flags
}

/// Stored latitude tie point of grid cell `(col, row)`.
pub fn tie_latitude(col: u32, row: u32) -> i32 {
    (row * 10 + col) as i32
}

// ============================================================================
// Header text
// ============================================================================

/// Header keyword replacements, as `(KEYWORD, raw value text)`.
pub type Overrides<'a> = &'a [(&'a str, &'a str)];

fn apply_overrides(lines: &mut [String], overrides: Overrides) {
    for line in lines.iter_mut() {
        for (key, value) in overrides {
            if line.split('=').next() == Some(*key) {
                *line = format!("{}={}", key, value);
            }
        }
    }
}

/// Join `lines` and pad with spaces to `size` bytes ending in a newline.
pub fn header_block(lines: &[String], size: usize) -> Vec<u8> {
    let mut text = lines.join("\n");
    text.push('\n');
    assert!(text.len() < size, "header text does not fit in {} bytes", size);
    let mut bytes = text.into_bytes();
    bytes.resize(size - 1, b' ');
    bytes.push(b'\n');
    bytes
}

fn mph(software_ver: &str, overrides: Overrides) -> Vec<u8> {
    let mut lines = [
        format!("PRODUCT=\"{}\"", PRODUCT_NAME),
        "PROC_STAGE=N".to_string(),
        "REF_DOC=\"PO-RS-MDA-GS-2009_4/C  \"".to_string(),
        format!("SOFTWARE_VER=\"{:<14}\"", software_ver),
        "ABS_ORBIT=+04496".to_string(),
        "DELTA_UT1=+.040900<s>".to_string(),
        format!("TOT_SIZE=+{:020}<bytes>", TOTAL_SIZE),
        format!("SPH_SIZE=+{:010}<bytes>", SPH_SIZE),
        format!("NUM_DSD=+{:010}", NUM_DSD),
        format!("DSD_SIZE=+{:010}<bytes>", DSD_SIZE),
        "NUM_DATA_SETS=+0000000003".to_string(),
    ];
    apply_overrides(&mut lines, overrides);
    header_block(&lines, MPH_SIZE)
}

fn sph_text(overrides: Overrides) -> Vec<u8> {
    let mut lines = [
        "SPH_DESCRIPTOR=\"MER_RR__2P SPECIFIC HEADER\"".to_string(),
        format!("LINE_LENGTH=+{:05}<samples>", SCENE_WIDTH),
        "LINES_PER_TIE_PT=+004".to_string(),
        "FIRST_FIRST_LAT=+0045000000<10-6degN>".to_string(),
    ];
    apply_overrides(&mut lines, overrides);
    header_block(&lines, SPH_TEXT_SIZE)
}

pub fn dsd_entry(name: &str, ds_type: char, offset: u64, num_dsr: u32, dsr_size: u32) -> Vec<u8> {
    let lines = [
        format!("DS_NAME=\"{:<28}\"", name),
        format!("DS_TYPE={}", ds_type),
        format!("FILENAME=\"{:<62}\"", ""),
        format!("DS_OFFSET=+{:020}<bytes>", offset),
        format!("DS_SIZE=+{:020}<bytes>", num_dsr as u64 * dsr_size as u64),
        format!("NUM_DSR=+{:010}", num_dsr),
        format!("DSR_SIZE=+{:010}<bytes>", dsr_size),
    ];
    header_block(&lines, DSD_SIZE)
}

fn sph(overrides: Overrides) -> Vec<u8> {
    let mut bytes = sph_text(overrides);
    bytes.extend(dsd_entry("Quality ADS", 'A', QUALITY_OFFSET, 1, QUALITY_DSR_SIZE));
    bytes.extend(dsd_entry("Radiance MDS", 'M', MDS_OFFSET, SCENE_HEIGHT, MDS_DSR_SIZE));
    bytes.extend(dsd_entry("Tie points ADS", 'A', TIE_OFFSET, TIE_ROWS, TIE_DSR_SIZE));
    bytes.extend(dsd_entry("Orbit file", 'R', 0, 0, 0));
    bytes.extend(vec![b' '; DSD_SIZE - 1]);
    bytes.push(b'\n');
    assert_eq!(bytes.len(), SPH_SIZE);
    bytes
}

// ============================================================================
// Dataset records
// ============================================================================

fn time(days: i32) -> Vec<u8> {
    let mut bytes = days.to_be_bytes().to_vec();
    bytes.extend(3600u32.to_be_bytes());
    bytes.extend(0u32.to_be_bytes());
    bytes
}

fn quality_record() -> Vec<u8> {
    let mut rec = time(1096);
    rec.push(0); // attach_flag
    rec.extend([0u8; 3]); // spare
    rec.extend(SCENE_WIDTH.to_be_bytes());
    rec.extend(SCALE_FACTOR.to_be_bytes());
    rec.extend(LINE_SHIFT.to_be_bytes());
    rec.extend(GAIN.to_be_bytes());
    rec.extend(BIAS.to_be_bytes());
    assert_eq!(rec.len(), QUALITY_DSR_SIZE as usize);
    rec
}

fn mds_record(y: u32) -> Vec<u8> {
    let mut rec = time(1096 + y as i32);
    rec.push((y % 3) as u8); // quality_flag
    rec.push(0); // spare
    for x in 0..SCENE_WIDTH {
        rec.extend(radiance_raw(x, y).to_be_bytes());
    }
    for x in 0..SCENE_WIDTH {
        rec.push(l2_flags(x, y));
    }
    for x in 0..SCENE_WIDTH {
        rec.extend((x as i16).to_be_bytes());
        rec.extend((-(y as i16)).to_be_bytes());
    }
    assert_eq!(rec.len(), MDS_DSR_SIZE as usize);
    rec
}

fn tie_record(row: u32) -> Vec<u8> {
    let mut rec = time(1096);
    for col in 0..TIE_COLS {
        rec.extend(tie_latitude(col, row).to_be_bytes());
    }
    rec
}

/// Full product file contents.
pub fn product_bytes(software_ver: &str) -> Vec<u8> {
    product_bytes_with(software_ver, &[])
}

/// Product file contents with some MPH/SPH keywords replaced. The data
/// layout is unchanged.
pub fn product_bytes_with(software_ver: &str, overrides: Overrides) -> Vec<u8> {
    let mut bytes = mph(software_ver, overrides);
    assert_eq!(bytes.len(), MPH_SIZE);
    bytes.extend(sph(overrides));
    bytes.extend(quality_record());
    for y in 0..SCENE_HEIGHT {
        bytes.extend(mds_record(y));
    }
    for row in 0..TIE_ROWS {
        bytes.extend(tie_record(row));
    }
    assert_eq!(bytes.len() as u64, TOTAL_SIZE);
    bytes
}

/// Write the test product into `dir` and return its path.
pub fn write_product(dir: &Path) -> PathBuf {
    write_product_with_version(dir, "MERIS/4.10")
}

pub fn write_product_with_version(dir: &Path, software_ver: &str) -> PathBuf {
    let path = dir.join(PRODUCT_NAME);
    std::fs::write(&path, product_bytes(software_ver)).expect("Failed to write product");
    path
}

pub fn write_product_with(dir: &Path, overrides: Overrides) -> PathBuf {
    let path = dir.join(PRODUCT_NAME);
    std::fs::write(&path, product_bytes_with("MERIS/4.10", overrides))
        .expect("Failed to write product");
    path
}

// ============================================================================
// DDDB
// ============================================================================

pub const DDDB_JSON: &str = r#"{
  "products": [{
    "product_type": "MER_RR__2P",
    "scene_width": "Quality_ADS.num_pixels",
    "scene_height": "MDS1",
    "records": {
      "Quality_rec": [
        {"name": "dsr_time", "type": "time", "unit": "MJD"},
        {"name": "attach_flag", "type": "uchar", "description": "Attachment flag"},
        {"name": "spare_1", "type": "spare", "count": 3},
        {"name": "num_pixels", "type": "uint"},
        {"name": "scale", "type": "float"},
        {"name": "line_shift", "type": "int"},
        {"name": "gain", "type": "double"},
        {"name": "bias", "type": "char"}
      ],
      "MDS1_rec": [
        {"name": "dsr_time", "type": "time", "unit": "MJD"},
        {"name": "quality_flag", "type": "uchar"},
        {"name": "spare_1", "type": "spare"},
        {"name": "radiance", "type": "ushort", "count": "LINE_LENGTH", "unit": "counts"},
        {"name": "l2_flags", "type": "uchar", "count": 12},
        {"name": "pair", "type": "short", "count": 24}
      ],
      "Tie_rec": [
        {"name": "dsr_time", "type": "time"},
        {"name": "latitude", "type": "int", "count": "*", "unit": "10-6deg"}
      ]
    },
    "datasets": [
      {"name": "Quality_ADS", "dsd_name": "Quality ADS", "record": "Quality_rec", "description": "Quality summary"},
      {"name": "MDS1", "dsd_name": "Radiance MDS", "record": "MDS1_rec", "description": "Radiances"},
      {"name": "Tie_points", "dsd_name": "Tie points ADS", "record": "Tie_rec"},
      {"name": "Missing_ADS", "record": "Tie_rec"}
    ],
    "bands": [
      {"name": "radiance", "dataset": "MDS1", "field": "radiance", "data_type": "float",
       "scaling_method": "LIN", "scaling_factor": "Quality_ADS.scale", "scaling_offset": -0.1,
       "unit": "mW/(m^2.sr.nm)", "description": "TOA radiance", "spectr_band_index": 0,
       "bm_expr": "not l2_flags.CLOUD"},
      {"name": "radiance_mirrored", "dataset": "MDS1", "field": "radiance", "data_type": "ushort",
       "lines_mirrored": true},
      {"name": "l2_flags", "dataset": "MDS1", "field": "l2_flags", "data_type": "uchar",
       "flag_coding": "l2_flags"},
      {"name": "pair_first", "dataset": "MDS1", "field": "pair", "sample_model": "1OF2", "data_type": "short"},
      {"name": "pair_second", "dataset": "MDS1", "field": "pair", "sample_model": "2OF2", "data_type": "short"},
      {"name": "latitude", "dataset": "Tie_points", "field": "latitude", "data_type": "float",
       "tie_points": {"subsampling_x": 4, "subsampling_y": 4}, "unit": "10-6deg"},
      {"name": "unbound", "dataset": "MDS1", "data_type": "float"},
      {"name": "broken", "dataset": "MDS1", "field": "nope", "data_type": "float"},
      {"name": "absent", "dataset": "Missing_ADS", "field": "latitude", "data_type": "float"}
    ],
    "flag_codings": {
      "l2_flags": [
        {"name": "LAND", "mask": 1, "description": "Land pixel"},
        {"name": "CLOUD", "mask": 2},
        {"name": "ICE", "mask": 4},
        {"name": "LAND_CLOUD", "mask": 3}
      ]
    }
  }]
}"#;

pub fn dddb() -> Dddb {
    Dddb::from_json_str(DDDB_JSON).expect("Failed to parse test DDDB")
}

pub fn open(path: &Path) -> Product {
    OpenOptions::new()
        .dddb(dddb())
        .open(path)
        .expect("Failed to open product")
}

pub fn open_rw(path: &Path) -> Product {
    OpenOptions::new()
        .mode(OpenMode::ReadWrite)
        .dddb(dddb())
        .open(path)
        .expect("Failed to open product read-write")
}

/// Open without any product description.
pub fn open_generic(path: &Path) -> Product {
    OpenOptions::new()
        .dddb(Dddb::empty())
        .open(path)
        .expect("Failed to open product")
}
