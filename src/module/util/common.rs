//! Common utilities

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::module::error::Result;

/// Create a directory (and its parents) if it doesn't exist yet.
pub fn create_directory(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Read a JSON file. Object keys keep their file order.
pub fn read_json(fname: impl AsRef<Path>) -> Result<Value> {
    let file = File::open(fname)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Write `content` as JSON indented by four spaces. Non-ASCII text is written as is.
pub fn write_json<T: Serialize + ?Sized>(content: &T, fname: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(fname)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    content.serialize(&mut ser)?;
    writer.flush()?;
    Ok(())
}
