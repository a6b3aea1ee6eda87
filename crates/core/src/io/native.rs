//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Reads the affine transform from ModelPixelScale + ModelTiepoint and the
//! EPSG code from the GeoKeyDirectory; writes the same tags back as
//! 32-bit float single-band images.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Skip the GeoKeyDirectory CRS entry even when the raster has one
    pub omit_crs: bool,
}

/// Read one band of a GeoTIFF file into a Raster.
///
/// `band` is zero-based and selects a sample from pixel-interleaved
/// multi-band images; `None` reads the first band.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file, band)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let samples: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    let cells = rows * cols;
    if cells == 0 || samples.len() % cells != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let bands = samples.len() / cells;
    let band = band.unwrap_or(0);
    if band >= bands {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("image has {} band(s)", bands),
        });
    }

    let data: Vec<T> = samples.into_iter().skip(band).step_by(bands).collect();
    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    if T::is_float() {
        raster.set_nodata(Some(T::default_nodata()));
    }

    Ok(raster)
}

fn cast_all<S: Copy + num_traits::NumCast, T: RasterElement>(buf: &[S]) -> Vec<T> {
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    parse_geokeys(&keys)
}

/// Pull the EPSG code out of a GeoKeyDirectory:
/// `[version, revision, minor, count, (key, location, count, value)*]`
fn parse_geokeys(keys: &[u16]) -> Option<CRS> {
    let count = *keys.get(3)? as usize;
    keys.get(4..4 + count * 4)?
        .chunks_exact(4)
        .find_map(|entry| match (entry[0], entry[1], entry[3]) {
            // 32767 is "user-defined", which carries no EPSG code
            (PROJECTED_CS_TYPE_KEY | GEOGRAPHIC_TYPE_KEY, 0, code) if code > 0 && code != 32767 => {
                Some(CRS::from_epsg(code as u32))
            }
            _ => None,
        })
}

/// GeoKeyDirectory for a raster: model type, pixel-is-area, and the EPSG code
/// when it fits in a short.
fn build_geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs.and_then(|c| c.epsg()).and_then(|e| u16::try_from(e).ok());
    let geographic = crs.map_or(false, |c| c.is_geographic());

    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE_KEY, 0, 1, 1],
    ];
    if let Some(code) = code {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

/// Write a Raster to a GeoTIFF file (32-bit float)
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(raster, file, options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let crs = if options.omit_crs { None } else { raster.crs() };
    let geokeys = build_geokeys(crs);
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}
