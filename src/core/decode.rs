//! Band line decoding: field bytes to scaled raster pixels.

use tracing::trace;

use crate::format::FieldInfo;
use crate::util::{decode_elem, Error, Result, TypeId};

use super::catalog::BandEntry;
use super::product::ProductInner;
use super::{Raster, SampleModel};

/// Extracts one band's samples from the bytes of a field.
struct LineSampler {
    model: SampleModel,
    type_id: TypeId,
    /// First element of the band within the field
    base: u32,
    num_elems: u32,
}

impl LineSampler {
    fn new(entry: &BandEntry, field: &FieldInfo) -> Result<Self> {
        let type_id = field.type_id;
        let ok = match entry.sample_model {
            SampleModel::ThreeToInt | SampleModel::TwoToFloat => type_id.size() == 1,
            _ => type_id.is_numeric(),
        };
        if !ok {
            return Err(Error::type_mismatch(
                format!("numeric field for {} samples", entry.sample_model.name()),
                type_id.name(),
            ));
        }
        Ok(Self {
            model: entry.sample_model,
            type_id,
            base: entry.elem_index.max(0) as u32,
            num_elems: field.num_elems,
        })
    }

    /// Raw value of the sample at stored pixel `x`.
    #[inline]
    fn sample(&self, line: &[u8], x: u32) -> Result<f64> {
        let stride = self.model.stride();
        let first = match self.model {
            SampleModel::TwoOfTwo => self.base + x * stride + 1,
            _ => self.base + x * stride,
        };
        let span = match self.model {
            SampleModel::ThreeToInt => 3,
            SampleModel::TwoToFloat => 2,
            _ => 1,
        };
        if first + span > self.num_elems {
            return Err(Error::out_of_range("field element", first + span - 1, self.num_elems));
        }

        let size = self.type_id.size() as usize;
        let start = first as usize * size;
        let bytes = &line[start..];
        Ok(match self.model {
            SampleModel::ThreeToInt => {
                (u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2])) as f64
            }
            SampleModel::TwoToFloat => (u16::from(bytes[0]) << 8 | u16::from(bytes[1])) as f64,
            _ => decode_elem(self.type_id, bytes).as_f64().unwrap_or(0.0),
        })
    }

    /// Raw values of every sample of a line.
    fn samples(&self, line: &[u8]) -> Result<Vec<f64>> {
        let count = self.num_elems.saturating_sub(self.base) / self.model.stride();
        (0..count).map(|x| self.sample(line, x)).collect()
    }
}

/// Horizontal geometry shared by every raster line.
struct Columns {
    scene_width: u32,
    x_off: u32,
    step_x: u32,
    mirrored: bool,
}

impl Columns {
    /// Stored pixel index of raster column `i`.
    #[inline]
    fn source_x(&self, i: u32) -> u32 {
        let x = self.x_off + i * self.step_x;
        if self.mirrored {
            self.scene_width - 1 - x
        } else {
            x
        }
    }
}

/// Fill `raster` from the band's dataset. The region has been checked
/// against the scene bounds.
pub(crate) fn read_band_lines(
    inner: &ProductInner,
    entry: &BandEntry,
    x_off: u32,
    y_off: u32,
    raster: &Raster,
) -> Result<()> {
    let dataset = &inner.catalog.datasets[entry.dataset];
    let field = &dataset.info.fields[entry.field_index as usize];
    let sampler = LineSampler::new(entry, field)?;
    let columns = Columns {
        scene_width: inner.catalog.scene_width,
        x_off,
        step_x: raster.source_step_x(),
        mirrored: entry.lines_mirrored,
    };
    let scale = |raw: f64| {
        entry
            .scaling_method
            .apply(raw, entry.scaling_factor, entry.scaling_offset)
    };

    trace!(
        band = %entry.name,
        x_off,
        y_off,
        width = raster.get_width(),
        height = raster.get_height(),
        "read band raster"
    );

    let num_records = dataset.dsd.num_dsr;
    let field_pos = |record: u32| dataset.dsd.record_offset(record) + field.offset as u64;
    let mut line = vec![0u8; field.byte_size() as usize];
    let view = raster.data();
    let mut data = view.write();

    match entry.tie_points {
        None => {
            for j in 0..raster.get_height() {
                let y = y_off + j * raster.source_step_y();
                if y >= num_records {
                    return Err(Error::out_of_range("record", y, num_records));
                }
                inner.with_streams(|s| s.read_into(field_pos(y), &mut line))?;
                for i in 0..raster.get_width() {
                    let raw = sampler.sample(&line, columns.source_x(i))?;
                    data.set_f64(i as usize, j as usize, scale(raw));
                }
            }
        }
        Some(grid) => {
            if num_records == 0 {
                return Err(Error::out_of_range("record", 0u32, 0u32));
            }
            let step_y = grid
                .subsampling_y
                .unwrap_or_else(|| grid_spacing(inner.catalog.scene_height, num_records));
            let mut rows = TiePointRows::default();
            for j in 0..raster.get_height() {
                let y = y_off + j * raster.source_step_y();
                let (r0, r1, wy) = grid_position(y, step_y, num_records);
                let top = rows.fetch(r0, |r| {
                    inner.with_streams(|s| s.read_into(field_pos(r), &mut line))?;
                    sampler.samples(&line)
                })?;
                let bottom = rows.fetch(r1, |r| {
                    inner.with_streams(|s| s.read_into(field_pos(r), &mut line))?;
                    sampler.samples(&line)
                })?;
                if top.is_empty() {
                    return Err(Error::out_of_range("tie point", 0u32, 0u32));
                }
                let cols = top.len() as u32;
                let step_x = grid
                    .subsampling_x
                    .unwrap_or_else(|| grid_spacing(columns.scene_width, cols));
                for i in 0..raster.get_width() {
                    let x = columns.source_x(i);
                    let (c0, c1, wx) = grid_position(x, step_x, cols);
                    let (c0, c1) = (c0 as usize, c1 as usize);
                    let upper = top[c0] + wx * (top[c1] - top[c0]);
                    let lower = bottom[c0] + wx * (bottom[c1] - bottom[c0]);
                    let raw = upper + wy * (lower - upper);
                    data.set_f64(i as usize, j as usize, scale(raw));
                }
            }
        }
    }
    Ok(())
}

/// Neighbouring tie points of scene coordinate `pos` and the weight of the
/// second one. Positions past the last tie point clamp to it.
fn grid_position(pos: u32, subsampling: f64, count: u32) -> (u32, u32, f64) {
    let t = pos as f64 / subsampling;
    let last = count - 1;
    let i0 = (t.floor() as u32).min(last);
    if i0 == last {
        return (last, last, 0.0);
    }
    (i0, i0 + 1, t - i0 as f64)
}

/// Spacing of `count` tie points spread over `extent` scene pixels, first
/// and last point on the scene edges.
fn grid_spacing(extent: u32, count: u32) -> f64 {
    if count > 1 && extent > 1 {
        (extent - 1) as f64 / (count - 1) as f64
    } else {
        1.0
    }
}

/// The two most recently decoded tie-point rows.
#[derive(Default)]
struct TiePointRows {
    rows: Vec<(u32, std::rc::Rc<Vec<f64>>)>,
}

impl TiePointRows {
    fn fetch(
        &mut self,
        row: u32,
        read: impl FnOnce(u32) -> Result<Vec<f64>>,
    ) -> Result<std::rc::Rc<Vec<f64>>> {
        if let Some((_, values)) = self.rows.iter().find(|(r, _)| *r == row) {
            return Ok(values.clone());
        }
        let values = std::rc::Rc::new(read(row)?);
        if self.rows.len() == 2 {
            self.rows.remove(0);
        }
        self.rows.push((row, values.clone()));
        Ok(values)
    }
}
