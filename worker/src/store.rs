use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use machine_learning::arch::Sequential;

use crate::Result;

/// Where the model lives between activations.
pub trait ModelStore: Send {
    /// Loads the stored model.
    ///
    /// # Returns
    /// The model, `None` if nothing was stored yet, or an error if the stored model is
    /// unreadable.
    fn load(&self) -> Result<Option<Sequential>>;

    /// Stores a model, replacing the previous one atomically.
    fn save(&self, model: &Sequential) -> Result<()>;
}

/// A `ModelStore` keeping the model's json blob in a single file.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sibling file a model is written to before replacing the stored one.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("model"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Option<Sequential>> {
        let blob = match fs::read_to_string(&self.path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(Sequential::from_blob(&blob)?))
    }

    fn save(&self, model: &Sequential) -> Result<()> {
        let blob = model.to_blob()?;
        let tmp = self.tmp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&tmp)?;
        file.write_all(blob.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
