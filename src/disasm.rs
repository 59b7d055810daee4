use std::path::Path;
use std::process::Command;

use crate::AnalysisError;

/// Invoke the configured disassembler on one object file and return its
/// textual output. `-d` disassembles, `-r` interleaves the relocation
/// records that carry the call targets.
pub fn disassemble(objdump: &str, object: &Path) -> Result<String, AnalysisError> {
    let output = Command::new(objdump)
        .arg("-dr")
        .arg(object)
        .output()
        .map_err(|e| AnalysisError::DisassemblerError {
            tool: objdump.to_string(),
            message: format!("{}: {}", object.display(), e),
        })?;

    if !output.status.success() {
        return Err(AnalysisError::DisassemblerError {
            tool: objdump.to_string(),
            message: format!(
                "{} ({}): {}",
                object.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
