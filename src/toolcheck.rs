//! Optional post-emission validation with an installed Ada toolchain.
//!
//! Runs the compiler in semantic-check-only mode over the generated unit
//! (plus the schema files already in the output directory). A missing
//! compiler is its own error variant so the CLI can tell "not installed"
//! apart from "rejected the output".

use std::io;
use std::path::Path;
use std::process::Command;

use crate::error::GenError;

pub const DEFAULT_TOOL: &str = "gcc";

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub success: bool,
    /// Combined compiler stdout/stderr, for the CLI to print verbatim.
    pub output: String,
}

/// Semantic-check the given Ada files in `dir`. `-gnatc` stops after
/// semantic analysis, so no object files land in the output directory.
pub fn compile_check(tool: &str, dir: &Path, files: &[String]) -> Result<CheckReport, GenError> {
    let mut cmd = Command::new(tool);
    cmd.current_dir(dir).arg("-c").arg("-gnatc");
    for f in files {
        cmd.arg(f);
    }
    match cmd.output() {
        Ok(out) => {
            let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&out.stderr));
            Ok(CheckReport { success: out.status.success(), output: text })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(GenError::ToolchainMissing { tool: tool.to_string() })
        }
        Err(e) => Err(GenError::Tool { detail: e.to_string() }),
    }
}

// ------------------------------- Tests ------------------------------------ //
