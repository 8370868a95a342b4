//! Destination class table
//!
//! The table is read from a headerless delimited file with one class per row:
//! `code,name,color`. The color column is optional and defaults to black.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// RGB color with components in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or the short `#RGB` form. The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let invalid = || Error::InvalidClassTable(format!("{:?} is not a hex color", hex));

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        match digits.len() {
            6 => {
                let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
                Ok(Self::new(
                    channel(0).map_err(|_| invalid())?,
                    channel(2).map_err(|_| invalid())?,
                    channel(4).map_err(|_| invalid())?,
                ))
            }
            3 => {
                let channel = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).map(|v| v * 17);
                Ok(Self::new(
                    channel(0).map_err(|_| invalid())?,
                    channel(1).map_err(|_| invalid())?,
                    channel(2).map_err(|_| invalid())?,
                ))
            }
            _ => Err(invalid()),
        }
    }

    /// `#RRGGBB`, upper case.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// One destination class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub code: i64,
    pub name: String,
    pub color: Rgb,
}

impl ClassEntry {
    pub fn new(code: i64, name: impl Into<String>, color: Rgb) -> Self {
        Self {
            code,
            name: name.into(),
            color,
        }
    }
}

/// Ordered destination classes, keyed by unique code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ClassTable {
    entries: Vec<ClassEntry>,
}

impl ClassTable {
    /// Build a table, rejecting duplicate codes.
    pub fn new(entries: Vec<ClassEntry>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert(entry.code) {
                return Err(Error::InvalidClassTable(format!(
                    "class code {} appears more than once",
                    entry.code
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if !(2..=3).contains(&fields.len()) {
                return Err(Error::InvalidClassTable(format!(
                    "line {}: expected 2 or 3 columns, found {}",
                    lineno + 1,
                    fields.len()
                )));
            }
            let code = fields[0].parse::<i64>().map_err(|_| {
                Error::InvalidClassTable(format!(
                    "line {}: class code {:?} is not an integer",
                    lineno + 1,
                    fields[0]
                ))
            })?;
            let color = match fields.get(2) {
                Some(hex) if !hex.is_empty() => Rgb::from_hex(hex)?,
                _ => Rgb::BLACK,
            };
            entries.push(ClassEntry::new(code, fields[1], color));
        }
        Self::new(entries)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = fs::File::create(path.as_ref())?;
        self.to_writer(&mut file)?;
        file.flush()?;
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        for entry in &self.entries {
            if entry.name.contains([',', '\n']) {
                return Err(Error::InvalidClassTable(format!(
                    "class name {:?} cannot be stored in the delimited format",
                    entry.name
                )));
            }
            writeln!(writer, "{},{},{}", entry.code, entry.name, entry.color.to_hex())?;
        }
        Ok(())
    }

    /// Error unless the table can drive an export.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::EmptyClassTable);
        }
        Ok(())
    }

    pub fn get(&self, code: i64) -> Option<&ClassEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[ClassEntry] {
        &self.entries
    }

    pub fn codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|e| e.code)
    }

    pub fn max_code(&self) -> Option<i64> {
        self.codes().max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for ClassTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes())
    }
}
