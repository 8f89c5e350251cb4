//! Integration tests for band rasters and bitmask expressions.

mod common;

use envisat::prelude::*;
use envisat::EprCode;

use common::*;
use tempfile::tempdir;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn scaled_radiance(x: u32, y: u32) -> f64 {
    radiance_raw(x, y) as f64 * SCALE_FACTOR as f64 + SCALE_OFFSET
}

#[test]
fn test_band_properties() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));

    let band = product.get_band("radiance").unwrap();
    assert_eq!(band.get_name().unwrap(), "radiance");
    assert_eq!(band.description().unwrap(), "TOA radiance");
    assert_eq!(band.spectr_band_index().unwrap(), 0);
    assert_eq!(band.dataset().unwrap().get_name().unwrap(), "MDS1");
    assert_eq!(band.field_index(), 3);
    assert_eq!(band.elem_index(), -1);
    assert_eq!(band.sample_model(), SampleModel::OneOfOne);
    assert_eq!(band.data_type(), TypeId::Float);
    assert_eq!(band.raw_type().unwrap(), TypeId::UShort);
    assert_eq!(band.scaling_method(), ScalingMethod::Linear);
    assert_eq!(band.scaling_factor(), SCALE_FACTOR as f64);
    assert_eq!(band.scaling_offset(), SCALE_OFFSET);
    assert_eq!(band.unit(), Some("mW/(m^2.sr.nm)"));
    assert_eq!(band.bm_expr(), Some("not l2_flags.CLOUD"));
    assert!(!band.lines_mirrored());
    assert!(band.get_flags().unwrap().is_none());
    assert_eq!(
        band.to_string(),
        format!("epr.Band(radiance) of epr.Product({})", PRODUCT_ID)
    );

    let flags = product.get_band("l2_flags").unwrap();
    let names: Vec<&str> = flags
        .get_flags()
        .unwrap()
        .expect("flag band has a flag coding")
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["LAND", "CLOUD", "ICE", "LAND_CLOUD"]);
    assert_eq!(flags.scaling_method(), ScalingMethod::None);
    assert_eq!(flags.spectr_band_index().unwrap(), -1);

    assert!(product.get_band("radiance_mirrored").unwrap().lines_mirrored());
    assert_eq!(
        product.get_band("pair_second").unwrap().sample_model(),
        SampleModel::TwoOfTwo
    );

    let unbound = product.get_band("unbound").unwrap();
    assert_eq!(unbound.field_index(), -1);
    assert_eq!(unbound.raw_type().unwrap(), TypeId::Unknown);

    assert!(matches!(product.get_band("broken").unwrap_err(), Error::NotFound { .. }));
    assert!(matches!(product.get_band("").unwrap_err(), Error::InvalidArgument(_)));
    assert_eq!(product.get_band_at(5).unwrap().get_name().unwrap(), "latitude");
    assert!(product.get_band_at(7).is_err());
}

#[test]
fn test_closed_band_defaults() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("radiance").unwrap();
    product.close();

    assert_eq!(band.field_index(), 0);
    assert_eq!(band.elem_index(), 0);
    assert_eq!(band.sample_model(), SampleModel::OneOfOne);
    assert_eq!(band.data_type(), TypeId::Unknown);
    assert_eq!(band.scaling_method(), ScalingMethod::Linear);
    assert_eq!(band.scaling_offset(), 0.0);
    assert_eq!(band.scaling_factor(), 0.0);
    assert!(!band.lines_mirrored());
    assert_eq!(band.unit(), None);
    assert_eq!(band.bm_expr(), None);

    assert!(matches!(band.get_name().unwrap_err(), Error::Closed));
    assert!(band.description().is_err());
    assert!(band.spectr_band_index().is_err());
    assert!(band.dataset().is_err());
    assert!(band.get_flags().is_err());
    assert!(band.raw_descriptor().is_err());
    assert!(band.create_scene_raster().is_err());
}

#[test]
fn test_read_scene() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("radiance").unwrap();

    let raster = band.read_raster(0, 0, None).unwrap();
    assert_eq!(raster.data_type(), TypeId::Float);
    assert_eq!(raster.get_width(), SCENE_WIDTH);
    assert_eq!(raster.get_height(), SCENE_HEIGHT);
    assert_eq!(raster.get_elem_size(), 4);
    assert_eq!(raster.to_string(), "epr.Raster float (20L x 12P)");

    for y in 0..SCENE_HEIGHT {
        for x in 0..SCENE_WIDTH {
            assert_close(raster.get_pixel_f64(x, y).unwrap(), scaled_radiance(x, y));
        }
    }
    assert!(matches!(raster.get_pixel(12, 0).unwrap_err(), Error::OutOfRange { .. }));

    let tail = band.read_raster(2, 3, None).unwrap();
    assert_eq!((tail.get_width(), tail.get_height()), (10, 17));
    assert_close(tail.get_pixel_f64(0, 0).unwrap(), scaled_radiance(2, 3));
    assert!(band.read_raster(12, 0, None).is_err());
}

#[test]
fn test_read_sub_block() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("radiance").unwrap();

    let mut raster = band.create_compatible_raster(10, 10, 1, 1).unwrap();
    band.read_raster_into(2, 5, &mut raster).unwrap();
    for j in 0..10 {
        for i in 0..10 {
            assert_close(raster.get_pixel_f64(i, j).unwrap(), scaled_radiance(2 + i, 5 + j));
        }
    }

    // Region past the scene edge
    let err = band.read_raster_into(3, 0, &mut raster).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    let err = band.read_raster_into(0, 11, &mut raster).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // Larger than the scene
    assert!(band.create_compatible_raster(13, 1, 1, 1).is_err());
    assert!(band.create_compatible_raster(0, 1, 1, 1).is_err());
    assert!(band.create_compatible_raster(1, 1, 0, 1).is_err());
}

#[test]
fn test_read_decimated() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("radiance").unwrap();

    let mut raster = band.create_compatible_raster(SCENE_WIDTH, SCENE_HEIGHT, 3, 4).unwrap();
    assert_eq!((raster.get_width(), raster.get_height()), (4, 5));
    band.read_raster_into(0, 0, &mut raster).unwrap();
    for j in 0..5 {
        for i in 0..4 {
            assert_close(raster.get_pixel_f64(i, j).unwrap(), scaled_radiance(3 * i, 4 * j));
        }
    }

    let data = band.read_as_array(7, 9, 5, 11, 2, 2).unwrap();
    assert_eq!(data.dim(), (5, 4));
    let array = data.as_array::<f32>().expect("float raster");
    assert_close(array[[4, 3]] as f64, scaled_radiance(5 + 6, 11 + 8));
}

#[test]
fn test_raster_type_mismatch() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("radiance").unwrap();

    let mut raster = create_raster(TypeId::UShort, 4, 4, 1, 1).unwrap();
    let err = band.read_raster_into(0, 0, &mut raster).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let unbound = product.get_band("unbound").unwrap();
    let mut raster = unbound.create_compatible_raster(4, 4, 1, 1).unwrap();
    let err = unbound.read_raster_into(0, 0, &mut raster).unwrap_err();
    assert_eq!(err.code(), Some(EprCode::InvalidBand.code()));
}

#[test]
fn test_mirrored_lines() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("radiance_mirrored").unwrap();

    let raster = band.read_raster(0, 0, None).unwrap();
    assert_eq!(raster.data_type(), TypeId::UShort);
    for y in 0..SCENE_HEIGHT {
        for x in 0..SCENE_WIDTH {
            assert_eq!(
                raster.get_pixel(x, y).unwrap(),
                Value::UInt(radiance_raw(SCENE_WIDTH - 1 - x, y) as u64)
            );
        }
    }

    let mut part = band.create_compatible_raster(4, 2, 1, 1).unwrap();
    band.read_raster_into(2, 1, &mut part).unwrap();
    assert_eq!(part.get_pixel(0, 0).unwrap(), Value::UInt(radiance_raw(9, 1) as u64));
    assert_eq!(part.get_pixel(3, 1).unwrap(), Value::UInt(radiance_raw(6, 2) as u64));
}

#[test]
fn test_interleaved_bands() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));

    let first = product.get_band("pair_first").unwrap().read_raster(0, 0, None).unwrap();
    let second = product.get_band("pair_second").unwrap().read_raster(0, 0, None).unwrap();
    for (x, y) in [(0, 0), (5, 3), (11, 19)] {
        assert_eq!(first.get_pixel(x, y).unwrap(), Value::Int(x as i64));
        assert_eq!(second.get_pixel(x, y).unwrap(), Value::Int(-(y as i64)));
    }
}

#[test]
fn test_tie_point_band() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("latitude").unwrap();

    let raster = band.read_raster(0, 0, None).unwrap();
    assert_eq!((raster.get_width(), raster.get_height()), (SCENE_WIDTH, SCENE_HEIGHT));
    for y in 0..SCENE_HEIGHT {
        for x in 0..SCENE_WIDTH {
            // The grid is linear in both directions
            let expected = 2.5 * y as f64 + 0.25 * x as f64;
            assert_close(raster.get_pixel_f64(x, y).unwrap(), expected);
        }
    }
    assert_close(raster.get_pixel_f64(8, 4).unwrap(), tie_latitude(2, 1) as f64);
}

#[test]
fn test_raw_descriptor() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));

    let desc = product.get_band("radiance").unwrap().raw_descriptor().unwrap();
    assert_eq!(desc.offset, MDS_OFFSET + RADIANCE_FIELD_OFFSET as u64);
    assert_eq!(desc.line_offset, MDS_DSR_SIZE as u64);
    assert_eq!(desc.pixel_offset, 2);
    assert_eq!(desc.data_type, TypeId::UShort);

    let pair_offset = MDS_OFFSET + 50;
    let first = product.get_band("pair_first").unwrap().raw_descriptor().unwrap();
    assert_eq!((first.offset, first.pixel_offset), (pair_offset, 4));
    let second = product.get_band("pair_second").unwrap().raw_descriptor().unwrap();
    assert_eq!((second.offset, second.pixel_offset), (pair_offset + 2, 4));

    let err = product.get_band("unbound").unwrap().raw_descriptor().unwrap_err();
    assert_eq!(err.code(), Some(EprCode::InvalidBand.code()));
}

#[test]
fn test_raster_views_share_pixels() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let band = product.get_band("l2_flags").unwrap();

    let mut raster = band.create_scene_raster().unwrap();
    let view = raster.data();
    assert!(view.ptr_eq(&raster.data()));
    assert_eq!(view.read().get_f64(0, 0), Some(0.0));

    band.read_raster_into(0, 0, &mut raster).unwrap();
    assert_eq!(view.read().get_f64(0, 0), Some(l2_flags(0, 0) as f64));

    let bytes = raster.to_ne_bytes();
    assert_eq!(bytes.len(), (SCENE_WIDTH * SCENE_HEIGHT) as usize);
    assert_eq!(bytes[SCENE_WIDTH as usize + 1], l2_flags(1, 1));

    let mut out = Vec::new();
    raster.write_raw(&mut out).unwrap();
    assert_eq!(out, bytes);
}

#[test]
fn test_bitmask_expression() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));

    let mut mask = create_bitmask_raster(SCENE_WIDTH, SCENE_HEIGHT, 1, 1).unwrap();
    product
        .read_bitmask_raster("l2_flags.LAND and not l2_flags.CLOUD", 0, 0, &mut mask)
        .unwrap();
    for y in 0..SCENE_HEIGHT {
        for x in 0..SCENE_WIDTH {
            let flags = l2_flags(x, y);
            let expected = flags & FLAG_LAND != 0 && flags & FLAG_CLOUD == 0;
            assert_eq!(mask.get_pixel(x, y).unwrap(), Value::UInt(expected as u64), "({}, {})", x, y);
        }
    }

    // A multi-bit flag needs all of its bits
    product.read_bitmask_raster("l2_flags.LAND_CLOUD", 0, 0, &mut mask).unwrap();
    assert_eq!(mask.get_pixel(0, 0).unwrap(), Value::UInt(1));
    assert_eq!(mask.get_pixel(0, 1).unwrap(), Value::UInt(0));
    assert_eq!(mask.get_pixel(7, 0).unwrap(), Value::UInt(0));

    // Decimated mask with an offset
    let mut small = create_bitmask_raster(6, 10, 2, 2).unwrap();
    assert_eq!((small.get_width(), small.get_height()), (3, 5));
    product.read_bitmask_raster("l2_flags.ICE || l2_flags.LAND", 1, 1, &mut small).unwrap();
    for j in 0..5 {
        for i in 0..3 {
            let (x, y) = (1 + 2 * i, 1 + 2 * j);
            let flags = l2_flags(x, y);
            let expected = flags & (FLAG_ICE | FLAG_LAND) != 0;
            assert_eq!(small.get_pixel(i, j).unwrap(), Value::UInt(expected as u64));
        }
    }
}

#[test]
fn test_bitmask_errors() {
    let dir = tempdir().expect("Failed to create temp dir");
    let product = open(&write_product(dir.path()));
    let mut mask = create_bitmask_raster(4, 4, 1, 1).unwrap();

    let code = |expr: &str, raster: &mut Raster| {
        product
            .read_bitmask_raster(expr, 0, 0, raster)
            .unwrap_err()
            .code()
    };
    assert_eq!(code("l2_flags.NOPE", &mut mask), Some(EprCode::FlagNotFound.code()));
    assert_eq!(code("nope.LAND", &mut mask), Some(EprCode::FlagNotFound.code()));
    assert_eq!(code("radiance.LAND", &mut mask), Some(EprCode::FlagNotFound.code()));
    assert_eq!(code("l2_flags.LAND and", &mut mask), Some(EprCode::IllegalArg.code()));

    let mut float = create_raster(TypeId::Float, 4, 4, 1, 1).unwrap();
    assert_eq!(code("l2_flags.LAND", &mut float), Some(EprCode::IllegalDataType.code()));

    product.close();
    let err = product.read_bitmask_raster("l2_flags.LAND", 0, 0, &mut mask).unwrap_err();
    assert!(matches!(err, Error::Closed));
}
