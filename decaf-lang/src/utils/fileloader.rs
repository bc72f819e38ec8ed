use std::{env, fmt, path::PathBuf};

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    FileNotFound(std::io::Error, PathBuf),
    UtfConversionError(std::string::FromUtf8Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IoError{:?}", e),
            Error::FileNotFound(e, p) => write!(f, "File {} not found: {:?}", p.display(), e),
            Error::UtfConversionError(e) => write!(f, "Failed to convert into UTF{:?}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}
impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::UtfConversionError(e)
    }
}

/// Resolves `relpath` against the directory of `current_file_or_dir` (or the directory itself).
pub fn get_canonical_path(current_file_or_dir: &str, relpath: &str) -> Result<PathBuf, Error> {
    let parent_dir = get_parent_dir(current_file_or_dir)?;
    let abspath = parent_dir.join(relpath);
    abspath
        .canonicalize()
        .map_err(|e| Error::FileNotFound(e, abspath))
}

fn get_parent_dir(current_file: &str) -> Result<PathBuf, Error> {
    let current_filepath = std::path::Path::new(current_file);
    if current_filepath.is_dir() {
        Ok(current_filepath.into())
    } else {
        let cwd = env::current_dir()?;
        Ok(current_filepath
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| cwd, PathBuf::from))
    }
}

pub fn load(canonical_path: &str) -> Result<String, Error> {
    let content = std::fs::read(canonical_path)
        .map_err(|e| Error::FileNotFound(e, PathBuf::from(canonical_path)))?;
    let content_r = String::from_utf8(content)?;
    Ok(content_r)
}
