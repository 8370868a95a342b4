//! Windowed remap of one raster band into a palette GeoTIFF
//!
//! The band is read block by block, remapped through a [`LookupTable`] and
//! streamed into a temporary sibling of the destination, which is renamed into
//! place only after the color table is attached and the file is closed.
//! Peak memory is one batch of blocks (one block per worker), independent of
//! the raster's size.

use std::fmt;
use std::path::Path;

use geoclass_colormap::CategoricalPalette;
use geoclass_core::io::{create_raster, open_raster, BlockReader, BlockWriter, RasterInfo};
use geoclass_core::raster::{PixelBlock, Window};
use geoclass_core::{ClassTable, Error, Inverse, ReclassifyError, Result, Stage};
use geoclass_parallel::{choose_block_rows, BatchRunner, BlockPlan};
use ndarray::Array2;

use crate::cancel::CancelToken;
use crate::commit::TempOutput;
use crate::config::EngineConfig;
use crate::histogram::ValueHistogram;
use crate::lookup::LookupTable;

/// Progress of one windowed transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformState {
    Opened,
    Reading,
    Writing { block: usize },
    Coloring,
    Committing,
    Done,
    Failed { during: Box<TransformState> },
}

impl fmt::Display for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformState::Opened => f.write_str("opened"),
            TransformState::Reading => f.write_str("reading"),
            TransformState::Writing { block } => write!(f, "writing block {block}"),
            TransformState::Coloring => f.write_str("coloring"),
            TransformState::Committing => f.write_str("committing"),
            TransformState::Done => f.write_str("done"),
            TransformState::Failed { during } => write!(f, "failed while {during}"),
        }
    }
}

/// What a completed transform did.
#[derive(Debug, Clone)]
pub struct RasterReport {
    pub width: usize,
    pub height: usize,
    pub block_rows: usize,
    pub blocks: usize,
    /// Largest number of pixels held by any single block buffer
    pub peak_block_pixels: usize,
    /// Occurrences of each source value
    pub histogram: ValueHistogram,
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Block-by-block remap of a single raster band.
pub struct WindowedRasterTransform<'a> {
    config: &'a EngineConfig,
    cancel: CancelToken,
    progress: Option<ProgressFn<'a>>,
    state: TransformState,
}

impl fmt::Debug for WindowedRasterTransform<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowedRasterTransform")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

impl<'a> WindowedRasterTransform<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            progress: None,
            state: TransformState::Opened,
        }
    }

    /// Check `token` between blocks and abandon the output once it is set.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Call `progress(blocks_done, blocks_total)` after every written block.
    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    /// Remap 1-based `band` of `source` into `destination`.
    ///
    /// Validation failures (pixel type, code range, band index) are reported
    /// before anything is created on disk.
    pub fn run(
        &mut self,
        source: &Path,
        band: usize,
        inverse: &Inverse,
        class_table: &ClassTable,
        destination: &Path,
    ) -> std::result::Result<RasterReport, ReclassifyError> {
        self.state = TransformState::Opened;
        let source_id = source.display().to_string();

        let result = self.execute(source, band, inverse, class_table, destination);
        match result {
            Ok(report) => {
                self.state = TransformState::Done;
                Ok(report)
            }
            Err(error) => {
                let during = std::mem::replace(&mut self.state, TransformState::Opened);
                let mut err = ReclassifyError::new(source_id, Stage::Transform, error);
                if err.is_validation() {
                    err.stage = Stage::Validate;
                } else if during == TransformState::Committing {
                    err.stage = Stage::Commit;
                }
                tracing::warn!(source = %err.source_id, state = %during, error = %err.error, "raster transform failed");
                self.state = TransformState::Failed {
                    during: Box::new(during),
                };
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        source: &Path,
        band: usize,
        inverse: &Inverse,
        class_table: &ClassTable,
        destination: &Path,
    ) -> Result<RasterReport> {
        let mut reader = open_raster(source)?;
        let info = reader.info().clone();
        check_band(&info, band)?;

        let lookup = LookupTable::for_raster(inverse, info.pixel_type)?;
        let colors = CategoricalPalette::from_class_table(class_table).color_table()?;

        let block_rows = choose_block_rows(info.natural_block_rows, info.height, self.config.block_rows);
        let plan = BlockPlan::new(info.height, info.width, block_rows);
        let total = plan.block_count();
        tracing::info!(
            source = %source.display(),
            band,
            width = info.width,
            height = info.height,
            pixel_type = %info.pixel_type,
            block_rows,
            blocks = total,
            "reclassifying raster"
        );

        let temp = TempOutput::reserve(destination)?;
        let mut writer = create_raster(temp.path(), &info, &self.config.write_options(block_rows))?;

        let runner = BatchRunner::new(self.config.processing);
        let mut windows = plan.windows();
        let mut histogram = ValueHistogram::new();
        let mut peak_block_pixels = 0;
        let mut done = 0;

        loop {
            self.state = TransformState::Reading;
            let batch = read_batch(reader.as_mut(), band, &mut windows, runner.batch_size(), &self.cancel)?;
            if batch.is_empty() {
                break;
            }
            peak_block_pixels = batch.iter().map(|(_, b)| b.len()).fold(peak_block_pixels, usize::max);

            let remapped: Vec<(Window, Array2<u8>, ValueHistogram)> = runner.try_map(batch, |(window, block)| {
                let out = lookup.remap(&block);
                Ok::<_, Error>((window, out, ValueHistogram::of_block(&block)))
            })?;

            for (window, out, counts) in remapped {
                self.state = TransformState::Writing { block: done };
                writer.write_block(&window, &out)?;
                histogram.merge(counts);
                done += 1;
                tracing::debug!(block = done, total, row = window.row_offset, "block written");
                if let Some(progress) = self.progress.as_mut() {
                    progress(done, total);
                }
            }
        }

        self.cancel.check()?;
        self.state = TransformState::Coloring;
        finish(writer, &colors)?;

        self.state = TransformState::Committing;
        temp.commit()?;

        Ok(RasterReport {
            width: info.width,
            height: info.height,
            block_rows,
            blocks: done,
            peak_block_pixels,
            histogram,
        })
    }
}

fn finish(writer: Box<dyn BlockWriter>, colors: &geoclass_core::raster::ColorTable) -> Result<()> {
    let colors = (!colors.is_empty()).then_some(colors);
    writer.finish(colors)
}

fn check_band(info: &RasterInfo, band: usize) -> Result<()> {
    if band == 0 || band > info.band_count {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("raster has {} band(s)", info.band_count),
        });
    }
    Ok(())
}

/// Read up to `count` blocks, checking for cancellation before each one.
fn read_batch(
    reader: &mut dyn BlockReader,
    band: usize,
    windows: &mut impl Iterator<Item = Window>,
    count: usize,
    cancel: &CancelToken,
) -> Result<Vec<(Window, PixelBlock)>> {
    let mut batch = Vec::with_capacity(count);
    for window in windows.take(count) {
        cancel.check()?;
        let block = reader.read_window(band, &window)?;
        batch.push((window, block));
    }
    Ok(batch)
}

/// Running histogram of one band, accumulated block by block.
pub fn band_histogram(
    source: &Path,
    band: usize,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<ValueHistogram> {
    let mut reader = open_raster(source)?;
    let info = reader.info().clone();
    check_band(&info, band)?;
    if !info.pixel_type.is_categorical() {
        return Err(Error::UnsupportedPixelType(format!(
            "{} bands hold continuous values and cannot be enumerated",
            info.pixel_type
        )));
    }

    let block_rows = choose_block_rows(info.natural_block_rows, info.height, config.block_rows);
    let plan = BlockPlan::new(info.height, info.width, block_rows);
    let runner = BatchRunner::new(config.processing);
    let mut windows = plan.windows();
    let mut histogram = ValueHistogram::new();

    loop {
        let batch = read_batch(reader.as_mut(), band, &mut windows, runner.batch_size(), cancel)?;
        if batch.is_empty() {
            break;
        }
        let counts = runner.try_map(batch, |(_, block)| Ok::<_, Error>(ValueHistogram::of_block(&block)))?;
        for c in counts {
            histogram.merge(c);
        }
    }
    tracing::debug!(source = %source.display(), band, values = histogram.len(), "band histogram");
    Ok(histogram)
}
