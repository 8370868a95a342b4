//! Sparse categorical color table attached to 8-bit output bands

use std::collections::BTreeMap;

/// Palette index → RGBA. Indices without an entry keep the format's default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorTable {
    entries: BTreeMap<u8, [u8; 4]>,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u8, rgba: [u8; 4]) {
        self.entries.insert(index, rgba);
    }

    pub fn get(&self, index: u8) -> Option<[u8; 4]> {
        self.entries.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, [u8; 4])> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    /// TIFF `ColorMap` layout: 256 reds, then 256 greens, then 256 blues,
    /// each scaled to 16 bits. Missing indices are black.
    pub fn to_tiff_colormap(&self) -> Vec<u16> {
        let mut map = vec![0u16; 3 * 256];
        for (index, [r, g, b, _]) in self.iter() {
            let i = index as usize;
            map[i] = u16::from(r) * 257;
            map[256 + i] = u16::from(g) * 257;
            map[512 + i] = u16::from(b) * 257;
        }
        map
    }
}

impl FromIterator<(u8, [u8; 4])> for ColorTable {
    fn from_iter<I: IntoIterator<Item = (u8, [u8; 4])>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
