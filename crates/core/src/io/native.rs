//! Native GeoTIFF block I/O (without GDAL dependency)
//!
//! Reading decodes one strip or tile at a time through the `tiff` crate.
//! Writing runs on a dedicated thread that owns the encoder and receives
//! finished row bands over a bounded channel, so at most a couple of blocks
//! are ever queued.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray8;
use tiff::encoder::compression::{Compression as TiffCompression, Lzw, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

use crate::error::{Error, Result};
use crate::io::chunks::{ChunkGrid, RawChunkReader};
use crate::io::{BlockReader, BlockWriter, Compression, RasterInfo, WriteOptions};
use crate::raster::{ColorTable, GeoTransform, IntoPixelBlock, PixelBlock, PixelType, Window};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const COLOR_MAP: u16 = 320;
const PHOTOMETRIC_PALETTE: u16 = 3;

/// GeoTIFF georeferencing tags, copied verbatim from source to output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoTiffTags {
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoint: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub key_directory: Option<Vec<u16>>,
    pub double_params: Option<Vec<f64>>,
    pub ascii_params: Option<String>,
}

impl GeoTiffTags {
    fn read<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Self> {
        let mut f64_tag = |code: u16| -> Result<Option<Vec<f64>>> {
            match decoder.find_tag(Tag::from_u16_exhaustive(code))? {
                Some(value) => Ok(Some(value.into_f64_vec()?)),
                None => Ok(None),
            }
        };
        let pixel_scale = f64_tag(MODEL_PIXEL_SCALE)?;
        let tiepoint = f64_tag(MODEL_TIEPOINT)?;
        let transformation = f64_tag(MODEL_TRANSFORMATION)?;
        let double_params = f64_tag(GEO_DOUBLE_PARAMS)?;

        let key_directory = decoder.find_tag_unsigned_vec::<u16>(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))?;
        let ascii_params = match decoder.find_tag(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS))? {
            Some(value) => Some(value.into_string()?),
            None => None,
        };

        Ok(Self {
            pixel_scale,
            tiepoint,
            transformation,
            key_directory,
            double_params,
            ascii_params,
        })
    }

    /// Tags describing a plain north-up transform.
    pub fn from_geo_transform(gt: &GeoTransform) -> Self {
        Self {
            pixel_scale: Some(vec![gt.pixel_width, gt.pixel_height.abs(), 0.0]),
            tiepoint: Some(vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0]),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn geo_transform(&self) -> Option<GeoTransform> {
        if let Some(m) = &self.transformation {
            return GeoTransform::from_model_transformation(m);
        }
        match (&self.pixel_scale, &self.tiepoint) {
            (Some(scale), Some(tiepoint)) => GeoTransform::from_tiepoint(scale, tiepoint),
            _ => None,
        }
    }
}

/// Element types that can be pulled out of a decoded TIFF chunk.
trait FromDecoded: IntoPixelBlock {
    fn samples(result: &DecodingResult) -> Option<&[Self]>;
}

macro_rules! impl_from_decoded {
    ($t:ty, $variant:ident) => {
        impl FromDecoded for $t {
            fn samples(result: &DecodingResult) -> Option<&[Self]> {
                match result {
                    DecodingResult::$variant(buf) => Some(buf.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_decoded!(u8, U8);
impl_from_decoded!(i8, I8);
impl_from_decoded!(u16, U16);
impl_from_decoded!(i16, I16);
impl_from_decoded!(u32, U32);
impl_from_decoded!(i32, I32);
impl_from_decoded!(i64, I64);

/// Reads windows of a (Geo)TIFF band one strip or tile at a time.
pub struct TiffBlockReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    info: RasterInfo,
    samples_per_pixel: usize,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    /// Set for palette images, which the `tiff` decoder cannot expand
    raw: Option<RawChunkReader>,
    cached: Option<(u32, DecodingResult)>,
}

impl std::fmt::Debug for TiffBlockReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiffBlockReader")
            .field("path", &self.path)
            .field("info", &self.info)
            .finish()
    }
}

impl TiffBlockReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let samples_per_pixel = decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
            .unwrap_or(1) as usize;
        let planar = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
            .unwrap_or(1);
        if planar != 1 && samples_per_pixel > 1 {
            return Err(Error::UnsupportedFormat(format!(
                "{}: band-sequential (planar) TIFF layout",
                path.display()
            )));
        }

        let bits = decoder
            .find_tag_unsigned_vec::<u16>(Tag::BitsPerSample)?
            .and_then(|v| v.first().copied())
            .unwrap_or(1);
        let format = decoder
            .find_tag_unsigned_vec::<u16>(Tag::SampleFormat)?
            .and_then(|v| v.first().copied())
            .unwrap_or(1);
        let pixel_type = PixelType::from_tiff(bits, format).ok_or_else(|| {
            Error::UnsupportedPixelType(format!("{bits}-bit samples (sample format {format})"))
        })?;

        let (chunk_width, chunk_height, tiled) = match (
            decoder.find_tag_unsigned::<u32>(Tag::TileWidth)?,
            decoder.find_tag_unsigned::<u32>(Tag::TileLength)?,
        ) {
            (Some(w), Some(h)) => (w as usize, h as usize, true),
            _ => {
                let rows = decoder
                    .find_tag_unsigned::<u32>(Tag::RowsPerStrip)?
                    .map(|r| r as usize)
                    .unwrap_or(height);
                (width, rows.clamp(1, height.max(1)), false)
            }
        };
        if chunk_width == 0 || chunk_height == 0 {
            return Err(Error::Tiff(format!("{}: zero-sized strip or tile", path.display())));
        }

        let photometric = decoder
            .find_tag_unsigned::<u16>(Tag::PhotometricInterpretation)?
            .unwrap_or(1);
        let raw = if photometric == PHOTOMETRIC_PALETTE {
            if pixel_type != PixelType::U8 || samples_per_pixel != 1 {
                return Err(Error::UnsupportedPixelType(format!(
                    "{bits}-bit palette image with {samples_per_pixel} samples"
                )));
            }
            let grid = ChunkGrid {
                width,
                height,
                chunk_width,
                chunk_height,
                tiled,
            };
            Some(RawChunkReader::open(path, &mut decoder, grid)?)
        } else {
            None
        };

        let geotiff_tags = GeoTiffTags::read(&mut decoder)?;
        let info = RasterInfo {
            width,
            height,
            band_count: samples_per_pixel,
            pixel_type,
            natural_block_rows: chunk_height,
            geo_transform: geotiff_tags.geo_transform(),
            geotiff_tags,
            projection: None,
        };

        tracing::debug!(
            path = %path.display(),
            width,
            height,
            bands = samples_per_pixel,
            pixel_type = %pixel_type,
            chunk_width,
            chunk_height,
            palette = raw.is_some(),
            "opened TIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            info,
            samples_per_pixel,
            chunk_width,
            chunk_height,
            chunks_across: width.div_ceil(chunk_width),
            raw,
            cached: None,
        })
    }

    fn load_chunk(&mut self, index: u32) -> Result<&DecodingResult> {
        let hit = matches!(&self.cached, Some((cached, _)) if *cached == index);
        if !hit {
            self.cached = None;
            let data = match self.raw.as_mut() {
                Some(raw) => raw.read_chunk(index)?,
                None => self.decoder.read_chunk(index)?,
            };
            self.cached = Some((index, data));
        }
        match &self.cached {
            Some((_, data)) => Ok(data),
            None => Err(Error::Tiff(format!("chunk {index} unavailable"))),
        }
    }

    fn read_typed<T: FromDecoded>(&mut self, band: usize, window: &Window) -> Result<PixelBlock> {
        let spp = self.samples_per_pixel;
        let (width, height) = (self.info.width, self.info.height);
        let (cw, ch) = (self.chunk_width, self.chunk_height);
        let mut out = vec![T::zero(); window.len()];

        let first_chunk_row = window.row_offset / ch;
        let last_chunk_row = (window.row_end() - 1) / ch;
        let first_chunk_col = window.col_offset / cw;
        let last_chunk_col = (window.col_end() - 1) / cw;

        for chunk_row in first_chunk_row..=last_chunk_row {
            for chunk_col in first_chunk_col..=last_chunk_col {
                let index = (chunk_row * self.chunks_across + chunk_col) as u32;
                let chunk_top = chunk_row * ch;
                let chunk_left = chunk_col * cw;
                let data_width = cw.min(width - chunk_left);
                let data_height = ch.min(height - chunk_top);

                let data = self.load_chunk(index)?;
                let samples = T::samples(data).ok_or_else(|| {
                    Error::Tiff(format!("chunk {index} decoded to an unexpected sample type"))
                })?;
                if samples.len() < data_width * data_height * spp {
                    return Err(Error::Tiff(format!(
                        "chunk {index} holds {} samples, expected {}",
                        samples.len(),
                        data_width * data_height * spp
                    )));
                }

                let row_start = window.row_offset.max(chunk_top);
                let row_end = window.row_end().min(chunk_top + data_height);
                let col_start = window.col_offset.max(chunk_left);
                let col_end = window.col_end().min(chunk_left + data_width);

                for row in row_start..row_end {
                    let src_row = (row - chunk_top) * data_width;
                    let dst_row = (row - window.row_offset) * window.cols;
                    for col in col_start..col_end {
                        let src = (src_row + col - chunk_left) * spp + (band - 1);
                        out[dst_row + col - window.col_offset] = samples[src];
                    }
                }
            }
        }

        PixelBlock::from_vec(out, window)
    }
}

impl BlockReader for TiffBlockReader {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&mut self, band: usize, window: &Window) -> Result<PixelBlock> {
        if band == 0 || band > self.samples_per_pixel {
            return Err(Error::InvalidParameter {
                name: "band",
                value: band.to_string(),
                reason: format!("{} has {} band(s)", self.path.display(), self.samples_per_pixel),
            });
        }
        if window.is_empty() || !window.fits(self.info.height, self.info.width) {
            return Err(Error::InvalidParameter {
                name: "window",
                value: format!("{window:?}"),
                reason: format!("outside {}x{} raster", self.info.width, self.info.height),
            });
        }

        match self.info.pixel_type {
            PixelType::U8 => self.read_typed::<u8>(band, window),
            PixelType::I8 => self.read_typed::<i8>(band, window),
            PixelType::U16 => self.read_typed::<u16>(band, window),
            PixelType::I16 => self.read_typed::<i16>(band, window),
            PixelType::U32 => self.read_typed::<u32>(band, window),
            PixelType::I32 => self.read_typed::<i32>(band, window),
            PixelType::I64 => self.read_typed::<i64>(band, window),
            other => Err(Error::UnsupportedPixelType(format!(
                "{other} band in {}",
                self.path.display()
            ))),
        }
    }
}

enum Command {
    Rows(Vec<u8>),
    Finish(Option<Vec<u16>>),
}

/// Writes an 8-bit GeoTIFF from a dedicated encoder thread.
pub struct TiffBlockWriter {
    path: PathBuf,
    width: usize,
    height: usize,
    next_row: usize,
    sender: Option<Sender<Command>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TiffBlockWriter {
    pub fn create(path: &Path, template: &RasterInfo, options: &WriteOptions) -> Result<Self> {
        let (width, height) = (template.width, template.height);
        if width == 0 || height == 0 {
            return Err(Error::InvalidParameter {
                name: "dimensions",
                value: format!("{width}x{height}"),
                reason: "TIFF images need at least one pixel".to_string(),
            });
        }

        let rows_per_strip = options.block_rows.clamp(1, height);
        let tags = if template.geotiff_tags.is_empty() {
            template
                .geo_transform
                .map(|gt| GeoTiffTags::from_geo_transform(&gt))
                .unwrap_or_default()
        } else {
            template.geotiff_tags.clone()
        };

        let file = File::create(path)?;
        let (sender, receiver) = bounded::<Command>(2);
        let compression = options.compression;
        let handle = std::thread::Builder::new()
            .name("geoclass-tiff-writer".to_string())
            .spawn(move || {
                let layout = StripLayout {
                    width,
                    height,
                    rows_per_strip,
                };
                match compression {
                    Compression::None => encode(file, layout, &tags, Uncompressed, receiver),
                    Compression::Lzw => encode(file, layout, &tags, Lzw, receiver),
                }
            })?;

        tracing::debug!(path = %path.display(), width, height, rows_per_strip, ?compression, "created TIFF writer");

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            next_row: 0,
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Stop the encoder thread and surface whatever error it ended with.
    fn join(&mut self) -> Result<()> {
        self.sender = None;
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| Error::PartialWrite {
                path: self.path.clone(),
                reason: "TIFF writer thread panicked".to_string(),
            })?,
            None => Ok(()),
        }
    }

    fn send(&mut self, command: Command) -> Result<()> {
        let delivered = match &self.sender {
            Some(sender) => sender.send(command).is_ok(),
            None => false,
        };
        if delivered {
            return Ok(());
        }
        // The encoder thread only hangs up after an error.
        self.join()?;
        Err(Error::PartialWrite {
            path: self.path.clone(),
            reason: "TIFF writer stopped early".to_string(),
        })
    }
}

impl BlockWriter for TiffBlockWriter {
    fn write_block(&mut self, window: &Window, data: &Array2<u8>) -> Result<()> {
        if window.row_offset != self.next_row || window.col_offset != 0 || window.cols != self.width {
            return Err(Error::PartialWrite {
                path: self.path.clone(),
                reason: format!("block {window:?} out of order, expected row {}", self.next_row),
            });
        }
        if data.dim() != window.shape() || window.row_end() > self.height {
            return Err(Error::PartialWrite {
                path: self.path.clone(),
                reason: format!("block of shape {:?} does not match {window:?}", data.dim()),
            });
        }

        self.send(Command::Rows(data.iter().copied().collect()))?;
        self.next_row = window.row_end();
        Ok(())
    }

    fn finish(mut self: Box<Self>, colors: Option<&ColorTable>) -> Result<()> {
        if self.next_row != self.height {
            return Err(Error::PartialWrite {
                path: self.path.clone(),
                reason: format!("only {} of {} rows written", self.next_row, self.height),
            });
        }
        self.send(Command::Finish(colors.map(ColorTable::to_tiff_colormap)))?;
        self.join()
    }
}

impl Drop for TiffBlockWriter {
    fn drop(&mut self) {
        // An unfinished writer still closes its file before the caller cleans up.
        if let Err(e) = self.join() {
            tracing::debug!(path = %self.path.display(), error = %e, "TIFF writer abandoned");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StripLayout {
    width: usize,
    height: usize,
    rows_per_strip: usize,
}

fn encode<D: TiffCompression>(
    file: File,
    layout: StripLayout,
    tags: &GeoTiffTags,
    compression: D,
    receiver: Receiver<Command>,
) -> Result<()> {
    let mut encoder = TiffEncoder::new(file)?;
    let mut image = encoder.new_image_with_compression::<Gray8, D>(
        layout.width as u32,
        layout.height as u32,
        compression,
    )?;
    image.rows_per_strip(layout.rows_per_strip as u32)?;

    if let Some(scale) = &tags.pixel_scale {
        image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), scale.as_slice())?;
    }
    if let Some(tiepoint) = &tags.tiepoint {
        image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), tiepoint.as_slice())?;
    }
    if let Some(matrix) = &tags.transformation {
        image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION), matrix.as_slice())?;
    }
    if let Some(keys) = &tags.key_directory {
        image.encoder().write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), keys.as_slice())?;
    }
    if let Some(params) = &tags.double_params {
        image.encoder().write_tag(Tag::from_u16_exhaustive(GEO_DOUBLE_PARAMS), params.as_slice())?;
    }
    if let Some(ascii) = &tags.ascii_params {
        image.encoder().write_tag(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS), ascii.as_str())?;
    }

    let strip_len = layout.rows_per_strip * layout.width;
    let mut pending: Vec<u8> = Vec::with_capacity(strip_len);

    for command in receiver.iter() {
        match command {
            Command::Rows(rows) => {
                pending.extend_from_slice(&rows);
                while pending.len() >= strip_len {
                    image.write_strip(&pending[..strip_len])?;
                    pending.drain(..strip_len);
                }
            }
            Command::Finish(colormap) => {
                if !pending.is_empty() {
                    image.write_strip(&pending)?;
                }
                if let Some(colormap) = colormap {
                    image
                        .encoder()
                        .write_tag(Tag::PhotometricInterpretation, PHOTOMETRIC_PALETTE)?;
                    image.encoder().write_tag(Tag::from_u16_exhaustive(COLOR_MAP), colormap.as_slice())?;
                }
                image.finish()?;
                return Ok(());
            }
        }
    }

    Err(Error::Other("TIFF writer closed before the last block".to_string()))
}
