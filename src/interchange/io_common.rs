use std::fs;
use std::path::Path;

use log::debug;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

use crate::interchange::*;

/// The file name of a path, used to describe the source of an import.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| path.to_string())
}

pub fn read_document<T: DeserializeOwned>(path: &str) -> InterchangeResult<T> {
    debug!("read_document: reading {}", path);
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    parse_document(contents.as_str(), path)
}

pub fn parse_document<T: DeserializeOwned>(contents: &str, path: &str) -> InterchangeResult<T> {
    serde_json::from_str(contents).context(ParsingJsonSnafu { path })
}
