//! Version command.

use crate::error::ClientResult;

/// Returns the version line.
pub fn version_line() -> String {
    format!("calsync {}", env!("CARGO_PKG_VERSION"))
}

/// Print the version.
pub fn run() -> ClientResult<()> {
    println!("{}", version_line());
    Ok(())
}
