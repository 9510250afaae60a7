use std::{
    collections::VecDeque,
    fs, io,
    path::{Path, PathBuf},
};

use log::warn;
use machine_learning::encoding::Example;

use crate::Result;

/// A pending set of recorded moves. Taking an example removes it from the set.
pub trait ExampleSource: Send {
    /// Returns whether there's at least one example left.
    fn has_more(&mut self) -> Result<bool>;

    /// Takes the next example out of the source.
    ///
    /// # Returns
    /// The example, `None` if the source ran dry, or an error if it couldn't be read.
    fn take_one(&mut self) -> Result<Option<Example>>;
}

/// An in memory `ExampleSource`, examples are taken in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    pending: VecDeque<Example>,
}

impl MemorySource {
    pub fn new<I: IntoIterator<Item = Example>>(examples: I) -> Self {
        Self {
            pending: examples.into_iter().collect(),
        }
    }
}

impl ExampleSource for MemorySource {
    fn has_more(&mut self) -> Result<bool> {
        Ok(!self.pending.is_empty())
    }

    fn take_one(&mut self) -> Result<Option<Example>> {
        Ok(self.pending.pop_front())
    }
}

/// An `ExampleSource` backed by a spool directory holding one json encoded example per
/// `*.json` file. Files are taken in name order and deleted once read.
#[derive(Debug, Clone)]
pub struct SpoolSource {
    dir: PathBuf,
}

impl SpoolSource {
    /// Opens a spool directory, creating it if it doesn't exist.
    ///
    /// # Arguments
    /// * `dir` - The spool directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists the pending example files in the order they'll be taken.
    fn pending(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

impl ExampleSource for SpoolSource {
    fn has_more(&mut self) -> Result<bool> {
        Ok(!self.pending()?.is_empty())
    }

    fn take_one(&mut self) -> Result<Option<Example>> {
        for path in self.pending()? {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                // taken by someone else in between
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            fs::remove_file(&path)?;

            match serde_json::from_str(&raw) {
                Ok(example) => return Ok(Some(example)),
                Err(e) => warn!(path:? = path; "dropping unreadable example: {e}"),
            }
        }

        Ok(None)
    }
}
