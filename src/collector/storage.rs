use chrono::{DateTime, TimeZone};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum StoreError {
    /// Name is empty after sanitising or carries an unsupported extension
    #[error("file type not allowed: '{0}'")]
    InvalidName(String),
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Reduce an uploaded name to a safe single path component
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    cleaned
        .trim_start_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

/// Splits `name` into base and lowercase extension when the extension is allowed
fn split_allowed(name: &str) -> Option<(&str, String)> {
    let (base, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!base.is_empty() && ALLOWED_EXTENSIONS.contains(&ext.as_str())).then_some((base, ext))
}

/// Day-bucketed photo storage under one root directory
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` as `<root>/<day>/<BASE>/<BASE>_<stamp>.<ext>`, never
    /// overwriting an earlier upload of the same name.
    pub fn store<Tz: TimeZone>(
        &self,
        photo_name: &str,
        data: &[u8],
        now: &DateTime<Tz>,
    ) -> Result<PathBuf, StoreError>
    where
        Tz::Offset: fmt::Display,
    {
        let sanitized = sanitize_file_name(photo_name);
        let (base, ext) =
            split_allowed(&sanitized).ok_or_else(|| StoreError::InvalidName(photo_name.into()))?;

        let folder = self
            .root
            .join(now.format("%Y-%m-%d").to_string())
            .join(base);
        fs::create_dir_all(&folder)?;

        let stem = format!("{}_{}", base.to_uppercase(), now.format("%Y%m%d_%H%M"));
        let mut counter = 0u32;
        loop {
            let file_name = match counter {
                0 => format!("{}.{}", stem, ext),
                n => format!("{} ({}).{}", stem, n, ext),
            };
            let path = folder.join(file_name);

            // Claim the name atomically
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(data)?;
                    file.sync_all()?;
                    debug!("Stored {} bytes at {}", data.len(), path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
