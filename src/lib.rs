//! Estimate worst-case stack usage of embedded programs from their
//! compiled object files.
//!
//! Requires objects built with `-fstack-usage`, so every `.o` has a
//! sibling `.su` file carrying per-function frame sizes. Each object is
//! disassembled (`objdump -dr`) to recover call sites from relocation
//! records; the whole-program call graph is then traced to compute, per
//! function:
//!
//! - **cost**: worst-case stack bytes from entry through the deepest
//!   callee chain
//! - **height**: longest call chain, in hops
//! - **recursive**: whether the function sits on a call cycle; its cost
//!   then covers a single level of recursion
//!
//! The peak usage of a whole program is estimated as the cost of `main`
//! plus the worst cost among the interrupt vectors.
//!
//! Calls through function pointers are invisible to the disassembly. To
//! declare them, define a never-called dummy function named after the
//! real function with a `__stack_check_dummy__` prefix, containing
//! direct calls to the possible targets:
//!
//! ```c
//! void __stack_check_dummy__dispatch(void) { handler_a(); handler_b(); }
//! ```
//!
//! The compiler optimizes the dummy out of the final link, but it
//! survives in the intermediate object file; its edges are attributed to
//! `dispatch` and the dummy itself never shows up in the report.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod consts;
pub mod disasm;
pub mod graph;
pub mod model;
pub mod parser;
pub mod report;
pub mod resolver;
pub mod trace;
pub mod writer;

pub use model::{AnalysisConfig, AnalysisResult, FuncId, RawTarget, TraceResult};
pub use parser::DisasmParser;
pub use report::Report;
pub use resolver::SymbolTables;
pub use writer::FileWriter;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),
    #[error("Disassembler `{tool}` failed: {message}")]
    DisassemblerError { tool: String, message: String },
    #[error("Missing frame-size records for {object}: {su_file} not found")]
    MissingFrameRecords { object: String, su_file: String },
    #[error("Failed to serialize to JSON: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One object file's textual inputs, after the external tool boundary.
#[derive(Debug, Clone)]
pub struct ObjectInput {
    /// Identity used to qualify every symbol from this file
    pub object: String,
    /// Output of `objdump -dr`
    pub disassembly: String,
    /// Contents of the sibling `.su` file, when one exists
    pub frame_records: Option<String>,
}

/// Run the full pipeline over object files on disk, invoking the
/// configured disassembler once per file.
pub fn analyze_files(
    paths: &[PathBuf],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        inputs.push(ObjectInput {
            object: path.display().to_string(),
            disassembly: disasm::disassemble(&config.objdump, path)?,
            frame_records: load_frame_records(path)?,
        });
    }
    analyze_inputs(&inputs, config)
}

/// Read the sibling `.su` file for objects whose extension mandates one.
/// A `.o` without records is fatal; other extensions have none to read.
pub fn load_frame_records(path: &Path) -> Result<Option<String>, AnalysisError> {
    if path.extension().and_then(|e| e.to_str()) != Some("o") {
        return Ok(None);
    }
    let su_path = path.with_extension("su");
    match std::fs::read_to_string(&su_path) {
        Ok(text) => Ok(Some(text)),
        Err(_) => Err(AnalysisError::MissingFrameRecords {
            object: path.display().to_string(),
            su_file: su_path.display().to_string(),
        }),
    }
}

/// Run the pipeline over already-fetched disassembly text. This is the
/// seam below the external tool boundary, used by the tests and by
/// callers that drive the disassembler themselves.
pub fn analyze_inputs(
    inputs: &[ObjectInput],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let disasm_parser = DisasmParser::new();
    let mut tables = SymbolTables::default();
    let mut raw = BTreeMap::new();
    let mut frame_sizes = BTreeMap::new();

    for input in inputs {
        let summary = disasm_parser.parse_object(&input.object, &input.disassembly, config);
        tables.register_object(&summary);
        if let Some(records) = &input.frame_records {
            frame_sizes.append(&mut disasm_parser.parse_frame_records(
                &input.object,
                records,
                config,
            ));
        }
        graph::merge_into(&mut raw, summary.calls);
    }

    let (mut resolved, unresolved) =
        resolver::resolve_graph(&tables, &raw, config.log_ambiguous);
    graph::add_interrupt_root(&mut resolved);

    log::info!(
        "{} functions, {} unresolved call targets",
        resolved.len(),
        unresolved.len()
    );

    let (results, has_caller) = trace::trace_graph(&resolved, &frame_sizes);
    let (global_names, ambiguous) = tables.into_parts();

    Ok(AnalysisResult {
        graph: resolved,
        frame_sizes,
        results,
        has_caller,
        global_names,
        ambiguous,
        unresolved,
    })
}
