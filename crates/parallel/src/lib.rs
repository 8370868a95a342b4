//! # GeoClass Parallel
//!
//! Block planning and processing strategies for windowed raster passes.
//!
//! This crate provides:
//! - Row-band block plans aligned to the storage's natural block height
//! - Sequential or Rayon-backed batch mapping with error propagation

pub mod blocks;
pub mod strategy;

pub use blocks::{choose_block_rows, BlockIter, BlockPlan, MIN_BLOCK_ROWS};
pub use strategy::{BatchRunner, ProcessingMode};
