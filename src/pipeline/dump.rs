//! Debug dumps of intermediate buffers.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba32FImage, RgbaImage};

use crate::util::Result;

pub const ATLAS_STEM: &str = "ism";
pub const IRRADIANCE_FILE: &str = "irradiance.exr";

/// Writes each named buffer at most once per process.
pub struct Dumper {
    dir: PathBuf,
    written: HashSet<String>,
}

impl Dumper {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_written(&self, file_name: &str) -> bool {
        self.written.contains(file_name)
    }

    /// Write `<stem>.png` unless it was already written.
    pub fn dump_png(&mut self, stem: &str, image: &RgbaImage) -> Result<()> {
        let name = format!("{}.png", stem);
        if self.is_written(&name) {
            return Ok(());
        }
        let path = self.prepare(&name)?;
        image.save(&path)?;
        log::info!("Dumped {}", path.display());
        self.written.insert(name);
        Ok(())
    }

    pub fn dump_irradiance(&mut self, image: &Rgba32FImage) -> Result<()> {
        if self.is_written(IRRADIANCE_FILE) {
            return Ok(());
        }
        let path = self.prepare(IRRADIANCE_FILE)?;
        image.save(&path)?;
        log::info!("Dumped {}", path.display());
        self.written.insert(IRRADIANCE_FILE.to_string());
        Ok(())
    }

    fn prepare(&self, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(name))
    }
}
