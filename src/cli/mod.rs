pub mod inspect;
pub mod keygen;
pub mod render;
pub mod unseal;

pub use inspect::*;
pub use keygen::*;
pub use render::*;
pub use unseal::*;

use crate::error::Result;
use std::path::Path;

/// Write `text` to `output`, or return it for printing when no path is given.
pub fn write_output(output: Option<&Path>, text: String) -> Result<Option<String>> {
    match output {
        Some(path) => {
            std::fs::write(path, text.as_bytes())?;
            Ok(None)
        }
        None => Ok(Some(text)),
    }
}
