//! On-disk series persistence.
//!
//! Each symbol gets its own directory under the store root, holding a single `candles.json`:
//!
//! ```text
//! data/
//! ├── BTCUSDT/candles.json
//! └── ETHUSDT/candles.json
//! ```

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    engine::Series,
    errors::{Error, Result},
};

const FILE_NAME: &str = "candles.json";

/// Directory of persisted series, one per symbol.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    /// Creates a store rooted at `root`. Nothing is created on disk until a save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `symbol`'s series.
    pub fn path(&self, symbol: &str) -> PathBuf {
        self.root.join(symbol).join(FILE_NAME)
    }

    /// Writes `series`, replacing whatever was stored for its symbol.
    pub fn save(&self, series: &Series) -> Result<PathBuf> {
        let path = self.path(series.symbol());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        // write next to the target, then move it in place
        let partial = path.with_extension("json.partial");
        let mut writer = BufWriter::new(File::create(&partial)?);
        serde_json::to_writer(&mut writer, series)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&partial, &path)?;

        info!(symbol = series.symbol(), rows = series.len(), path = %path.display(), "series saved");
        Ok(path)
    }

    /// Reads the series stored for `symbol`.
    pub fn load(&self, symbol: &str) -> Result<Series> {
        let path = self.path(symbol);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::SeriesNotFound(symbol.to_string())),
            Err(e) => return Err(e.into()),
        };

        let series: Series = serde_json::from_reader(BufReader::new(file))?;
        // re-check ordering, the file may have been edited by hand
        Series::new(series.symbol(), series.candles().cloned().collect())
    }

    /// Symbols with a stored series, sorted.
    pub fn symbols(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.path().join(FILE_NAME).is_file() {
                symbols.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}
