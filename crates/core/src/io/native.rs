//! GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Georeferencing is carried by ModelPixelScale + ModelTiepoint, the CRS by
//! the ProjectedCSType/GeographicType GeoKey and no-data by the GDAL_NODATA
//! ASCII tag. Float rasters are written as Gray32Float pages, class
//! rasters as 8-bit (or 32-bit) integer pages. Multi-band rasters get one
//! page per band with the band name in ImageDescription. On read, both one
//! page per band and chunky (pixel-interleaved) multi-sample images are
//! accepted.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BandStack, GeoTransform, Raster, RasterElement, SampleFormat};
use num_traits::{NumCast, Zero};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8, GrayI32, GrayI8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Written to the ImageDescription tag of the (first) page
    pub description: Option<String>,
}

impl GeoTiffOptions {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }
}

/// Georeferencing shared by every page of a file
struct GeoMetadata {
    transform: Option<GeoTransform>,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

/// A decoded file: bands as `f64` samples in row-major order
struct DecodedBands {
    rows: usize,
    cols: usize,
    bands: Vec<Vec<f64>>,
    names: Vec<Option<String>>,
    meta: GeoMetadata,
}

/// Read one band of a GeoTIFF file into a Raster
///
/// `band` is zero-based and defaults to the first band. Samples that cannot
/// be represented in `T`, or that equal the file's no-data value, become
/// `T::default_nodata()`.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoded = decode_bands(BufReader::new(file))?;

    let index = band.unwrap_or(0);
    if index >= decoded.bands.len() {
        return Err(Error::BandCount {
            expected: index + 1,
            actual: decoded.bands.len(),
        });
    }
    let samples = decoded.bands.swap_remove(index);
    to_raster(samples, decoded.rows, decoded.cols, &decoded.meta)
}

/// Read every band of a GeoTIFF file into a [`BandStack`]
///
/// Band names come from each page's ImageDescription when present,
/// otherwise `band_1`, `band_2`, ...
pub fn read_geotiff_bands<P: AsRef<Path>>(path: P) -> Result<BandStack> {
    let file = File::open(path.as_ref())?;
    let decoded = decode_bands(BufReader::new(file))?;

    let names = decoded
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| match name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => format!("band_{}", i + 1),
        })
        .collect();

    let bands = decoded
        .bands
        .into_iter()
        .map(|samples| to_raster(samples, decoded.rows, decoded.cols, &decoded.meta))
        .collect::<Result<Vec<Raster<f64>>>>()?;

    BandStack::with_names(bands, names)
}

fn to_raster<T: RasterElement>(
    samples: Vec<f64>,
    rows: usize,
    cols: usize,
    meta: &GeoMetadata,
) -> Result<Raster<T>> {
    let file_nodata = meta.nodata;
    let data: Vec<T> = samples
        .into_iter()
        .map(|v| {
            if v.is_nan() || file_nodata.is_some_and(|nd| v == nd) {
                T::default_nodata()
            } else {
                T::try_from_f64(v).unwrap_or_else(T::default_nodata)
            }
        })
        .collect();

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = meta.transform {
        raster.set_transform(transform);
    }
    raster.set_crs(meta.crs);
    raster.set_nodata(Some(T::default_nodata()));
    Ok(raster)
}

fn decode_bands<R: Read + Seek>(reader: R) -> Result<DecodedBands> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let meta = GeoMetadata {
        transform: read_geotransform(&mut decoder),
        crs: read_crs(&mut decoder),
        nodata: read_nodata(&mut decoder),
    };

    let mut bands = Vec::new();
    let mut names = Vec::new();
    loop {
        let (w, h) = decoder.dimensions()?;
        if (h as usize, w as usize) != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: h as usize,
                ac: w as usize,
            });
        }

        let name = decoder.get_tag_ascii_string(Tag::ImageDescription).ok();
        let buf = decoding_result_to_f64(decoder.read_image()?);

        let pixels = rows * cols;
        if buf.len() % pixels != 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let samples = buf.len() / pixels;

        if samples == 1 {
            bands.push(buf);
            names.push(name);
        } else {
            for s in 0..samples {
                bands.push(buf.iter().skip(s).step_by(samples).copied().collect());
                names.push(None);
            }
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    Ok(DecodedBands {
        rows,
        cols,
        bands,
        names,
        meta,
    })
}

fn decoding_result_to_f64(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(buf) => buf.into_iter().map(<f64 as From<_>>::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(<f64 as From<_>>::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(<f64 as From<_>>::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F16(buf) => buf.into_iter().map(|v| v.to_f64()).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(<f64 as From<_>>::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::I8(buf) => buf.into_iter().map(<f64 as From<_>>::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(<f64 as From<_>>::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(<f64 as From<_>>::from).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
    }
}

/// GeoTransform from ModelPixelScale + ModelTiepoint, if both are present
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKeyDirectory, projected key first
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Header is 4 shorts, then 4 shorts per key: id, location, count, value.
    // Location 0 means the value is stored inline.
    let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).collect();
    let lookup = |id: u16| {
        entries
            .iter()
            .find(|e| e[0] == id && e[1] == 0)
            .map(|e| e[3])
            .filter(|&v| v != 0 && v != 32767)
    };

    lookup(PROJECTED_CS_TYPE_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
        .map(|code| CRS::from_epsg(<u32 as From<_>>::from(code)))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::Unknown(GDAL_NODATA)).ok()?;
    text.trim_matches(char::from(0)).trim().parse::<f64>().ok()
}

/// Write a Raster to a single-page GeoTIFF file
///
/// Float rasters are stored as 32-bit float with NaN for missing cells.
/// Class rasters keep their integer type and store the declared no-data
/// sentinel in missing cells, so the GDAL_NODATA tag matches the pixels.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let options = options.unwrap_or_default();
    let page = Page::from_raster(raster, options.description);
    let file = File::create(path.as_ref())?;
    encode_pages(BufWriter::new(file), raster.transform(), raster.crs(), &[page])
}

/// Write every band of a [`BandStack`] as one page each, named by band
pub fn write_geotiff_bands<P: AsRef<Path>>(stack: &BandStack, path: P) -> Result<()> {
    let pages: Vec<Page> = stack
        .bands()
        .iter()
        .zip(stack.names())
        .map(|(band, name)| Page::from_raster(band, Some(name.clone())))
        .collect();

    let file = File::create(path.as_ref())?;
    encode_pages(BufWriter::new(file), stack.transform(), stack.crs(), &pages)
}

enum Samples {
    U8(Vec<u8>),
    I8(Vec<i8>),
    I32(Vec<i32>),
    F32(Vec<f32>),
}

struct Page {
    rows: usize,
    cols: usize,
    samples: Samples,
    nodata: Option<String>,
    description: Option<String>,
}

impl Page {
    fn from_raster<T: RasterElement>(raster: &Raster<T>, description: Option<String>) -> Self {
        let (rows, cols) = raster.shape();

        if T::SAMPLE_FORMAT == SampleFormat::F32 {
            let data = raster
                .data()
                .iter()
                .map(|&v| match v.as_f64() {
                    Some(f) if !raster.is_nodata(v) => f as f32,
                    _ => f32::NAN,
                })
                .collect();
            let nodata = raster
                .nodata()
                .and_then(RasterElement::as_f64)
                .filter(|v| !v.is_nan())
                .map_or_else(|| "nan".to_string(), |v| v.to_string());
            return Self {
                rows,
                cols,
                samples: Samples::F32(data),
                nodata: Some(nodata),
                description,
            };
        }

        // integer cells: missing cells carry the declared sentinel
        let sentinel = raster.nodata().unwrap_or_else(T::default_nodata);
        let cells: Vec<T> = raster
            .data()
            .iter()
            .map(|&v| if raster.is_nodata(v) { sentinel } else { v })
            .collect();
        let samples = match T::SAMPLE_FORMAT {
            SampleFormat::U8 => Samples::U8(cast_all(&cells)),
            SampleFormat::I8 => Samples::I8(cast_all(&cells)),
            _ => Samples::I32(cast_all(&cells)),
        };
        let nodata = raster.nodata().and_then(RasterElement::as_f64).map(|v| v.to_string());

        Self {
            rows,
            cols,
            samples,
            nodata,
            description,
        }
    }
}

/// Cast cells to their on-disk sample type; the format is chosen from the
/// cell type, so every value fits
fn cast_all<T: RasterElement, S: NumCast + Zero>(cells: &[T]) -> Vec<S> {
    cells
        .iter()
        .map(|&v| <S as NumCast>::from(v).unwrap_or_else(S::zero))
        .collect()
}

fn geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let geographic = crs.is_some_and(CRS::is_geographic);
    let model_type = if geographic { 2 } else { 1 };

    let mut keys: Vec<u16> = vec![
        1, 1, 0, 2, // version 1.1.0, 2 keys
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];

    if let Some(code) = crs.and_then(|c| u16::try_from(c.epsg()).ok()) {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}

/// Georeferencing tags repeated on every page
struct GeoTags {
    scale: [f64; 3],
    tiepoint: [f64; 6],
    keys: Vec<u16>,
}

fn encode_pages<W: Write + Seek>(
    writer: W,
    transform: &GeoTransform,
    crs: Option<&CRS>,
    pages: &[Page],
) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let tags = GeoTags {
        scale: [transform.pixel_width, transform.pixel_height.abs(), 0.0],
        tiepoint: [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0],
        keys: geokeys(crs),
    };

    for page in pages {
        match &page.samples {
            Samples::U8(data) => write_page::<_, Gray8>(&mut encoder, page, &tags, data)?,
            Samples::I8(data) => write_page::<_, GrayI8>(&mut encoder, page, &tags, data)?,
            Samples::I32(data) => write_page::<_, GrayI32>(&mut encoder, page, &tags, data)?,
            Samples::F32(data) => write_page::<_, Gray32Float>(&mut encoder, page, &tags, data)?,
        }
    }

    Ok(())
}

fn write_page<W, C>(encoder: &mut TiffEncoder<W>, page: &Page, tags: &GeoTags, data: &[C::Inner]) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(page.cols as u32, page.rows as u32)?;

    let dir = image.encoder();
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &tags.scale[..])?;
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tags.tiepoint[..])?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), tags.keys.as_slice())?;
    if let Some(nodata) = &page.nodata {
        dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;
    }
    if let Some(description) = &page.description {
        dir.write_tag(Tag::ImageDescription, description.as_str())?;
    }

    image.write_data(data)?;
    Ok(())
}
