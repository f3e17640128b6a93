use std::path::{Path, PathBuf};

use ags_formats::game::{FontInfo, GameSetup};

use crate::error::GameInitError;

/// Font rasterization lives outside the engine core; it is only asked to
/// make a slot available at a given point size.
pub trait FontLoader {
    fn load_font(&mut self, slot: usize, size: u32) -> bool;
}

impl<F> FontLoader for F
where
    F: FnMut(usize, u32) -> bool,
{
    fn load_font(&mut self, slot: usize, size: u32) -> bool {
        self(slot, size)
    }
}

/// Point size to request for `font`. Sizes are doubled for high resolution
/// games unless the game opted out of font scaling.
pub fn font_load_size(font: &FontInfo, game: &GameSetup) -> u32 {
    let mut size = font.authored_size();
    if size == 0 {
        size = 8;
    }
    if !game.options.no_scale_fonts && game.is_hires() {
        size *= 2;
    }
    size
}

/// Loads every declared font slot. Any failure is fatal.
pub fn load_fonts(game: &GameSetup, loader: &mut dyn FontLoader) -> Result<(), GameInitError> {
    for (slot, font) in game.fonts.iter().enumerate() {
        let size = font_load_size(font, game);
        if !loader.load_font(slot, size) {
            return Err(GameInitError::FontLoadFailed { slot });
        }
        log::debug!("font {slot} loaded at size {size}");
    }
    Ok(())
}

/// Looks for `agsfnt{N}.ttf`, then `agsfnt{N}.wfn`, in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryFontLoader {
    dir: PathBuf,
    loaded: Vec<(usize, u32, PathBuf)>,
}

impl DirectoryFontLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `(slot, size, file)` for each font loaded so far.
    pub fn loaded(&self) -> &[(usize, u32, PathBuf)] {
        &self.loaded
    }

    fn find(&self, slot: usize) -> Option<PathBuf> {
        ["ttf", "wfn"]
            .iter()
            .map(|ext| self.dir.join(format!("agsfnt{slot}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl FontLoader for DirectoryFontLoader {
    fn load_font(&mut self, slot: usize, size: u32) -> bool {
        match self.find(slot) {
            Some(path) => {
                self.loaded.push((slot, size, path));
                true
            }
            None => {
                log::warn!("no font file for slot {slot} in {}", self.dir.display());
                false
            }
        }
    }
}
