//! Raw strip/tile decoding for 8-bit palette GeoTIFFs.
//!
//! The `tiff` decoder refuses `RGBPalette` images, which is exactly what
//! reclassified outputs are. Their samples are plain class codes, so the
//! chunks are read and decompressed here directly.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::{Error, Result};

/// TIFF compression codes.
pub mod compression {
    pub const NONE: u16 = 1;
    pub const LZW: u16 = 5;
    pub const DEFLATE: u16 = 8;
    pub const ADOBE_DEFLATE: u16 = 32946;
}

const PREDICTOR_NONE: u16 = 1;
const PREDICTOR_HORIZONTAL: u16 = 2;

/// Decompress one chunk's bytes.
pub fn decompress_chunk(data: &[u8], compression_code: u16, expected_len: usize) -> Result<Vec<u8>> {
    match compression_code {
        compression::NONE => Ok(data.to_vec()),
        compression::LZW => {
            let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            decoder
                .decode(data)
                .map_err(|e| Error::Tiff(format!("LZW: {e}")))
        }
        compression::DEFLATE | compression::ADOBE_DEFLATE => {
            // zlib-wrapped in practice; some writers emit raw deflate
            let mut out = Vec::with_capacity(expected_len);
            if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
                return Ok(out);
            }
            out.clear();
            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| Error::Tiff(format!("DEFLATE: {e}")))?;
            Ok(out)
        }
        other => Err(Error::UnsupportedFormat(format!("TIFF compression {other}"))),
    }
}

/// Chunk geometry of the image being read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkGrid {
    pub width: usize,
    pub height: usize,
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub tiled: bool,
}

impl ChunkGrid {
    fn across(&self) -> usize {
        self.width.div_ceil(self.chunk_width)
    }

    /// Width and height of the pixels `index` actually covers.
    pub fn data_dims(&self, index: usize) -> (usize, usize) {
        let top = (index / self.across()) * self.chunk_height;
        let left = (index % self.across()) * self.chunk_width;
        (
            self.chunk_width.min(self.width.saturating_sub(left)),
            self.chunk_height.min(self.height.saturating_sub(top)),
        )
    }
}

/// Reads 8-bit single-sample chunks straight from the file.
#[derive(Debug)]
pub(crate) struct RawChunkReader {
    file: BufReader<File>,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    compression: u16,
    predictor: u16,
    grid: ChunkGrid,
}

impl RawChunkReader {
    pub fn open<R: Read + Seek>(path: &Path, decoder: &mut Decoder<R>, grid: ChunkGrid) -> Result<Self> {
        let (offsets_tag, counts_tag) = if grid.tiled {
            (Tag::TileOffsets, Tag::TileByteCounts)
        } else {
            (Tag::StripOffsets, Tag::StripByteCounts)
        };
        let offsets = decoder.get_tag_u64_vec(offsets_tag)?;
        let byte_counts = decoder.get_tag_u64_vec(counts_tag)?;
        if offsets.len() != byte_counts.len() {
            return Err(Error::Tiff(format!(
                "{}: {} chunk offsets but {} byte counts",
                path.display(),
                offsets.len(),
                byte_counts.len()
            )));
        }
        let compression = decoder
            .find_tag_unsigned::<u16>(Tag::Compression)?
            .unwrap_or(compression::NONE);
        let predictor = decoder
            .find_tag_unsigned::<u16>(Tag::Predictor)?
            .unwrap_or(PREDICTOR_NONE);
        if predictor != PREDICTOR_NONE && predictor != PREDICTOR_HORIZONTAL {
            return Err(Error::UnsupportedFormat(format!(
                "{}: predictor {predictor} on a palette image",
                path.display()
            )));
        }

        Ok(Self {
            file: BufReader::new(File::open(path)?),
            offsets,
            byte_counts,
            compression,
            predictor,
            grid,
        })
    }

    /// Decode chunk `index`, cropped to the pixels it covers.
    pub fn read_chunk(&mut self, index: u32) -> Result<DecodingResult> {
        let i = index as usize;
        let (Some(&offset), Some(&count)) = (self.offsets.get(i), self.byte_counts.get(i)) else {
            return Err(Error::Tiff(format!("chunk {index} out of range")));
        };
        let (data_width, data_height) = self.grid.data_dims(i);
        // tiles are stored padded, strips at the image width
        let (stride, rows) = if self.grid.tiled {
            (self.grid.chunk_width, self.grid.chunk_height)
        } else {
            (self.grid.width, data_height)
        };

        let mut compressed = vec![0u8; count as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut compressed)?;
        let mut raw = decompress_chunk(&compressed, self.compression, stride * rows)?;
        if raw.len() < stride * (data_height.max(1) - 1) + data_width {
            return Err(Error::Tiff(format!(
                "chunk {index} decoded to {} bytes, expected {}",
                raw.len(),
                stride * rows
            )));
        }

        if self.predictor == PREDICTOR_HORIZONTAL {
            for row in raw.chunks_mut(stride) {
                for col in 1..row.len() {
                    row[col] = row[col].wrapping_add(row[col - 1]);
                }
            }
        }

        let mut out = Vec::with_capacity(data_width * data_height);
        for row in 0..data_height {
            let start = row * stride;
            out.extend_from_slice(&raw[start..start + data_width]);
        }
        Ok(DecodingResult::U8(out))
    }
}
