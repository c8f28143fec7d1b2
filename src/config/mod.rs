//! The `container.txt` configuration loader (spec.md §6).
mod model;
mod parser;

pub use model::{ContainerConfig, FmuIo, SlaveSpec, TypeWiring, WireEntry};
pub use parser::parse_str;

use crate::error::Error;
use std::path::Path;

/// Parse a `container.txt` file from disk.
pub fn parse_file(path: &Path) -> Result<ContainerConfig, Error> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}
