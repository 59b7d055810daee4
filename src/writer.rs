use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::AnalysisResult;
use crate::report::Report;
use crate::AnalysisError;

/// Compact machine-readable summary of a run.
#[derive(Serialize, Deserialize)]
pub struct Manifest {
    pub objects: Vec<String>,
    pub main_cost: u64,
    pub interrupt_cost: u64,
    pub peak: u64,
    pub recursive: Vec<String>,
    pub ambiguous: Vec<String>,
    pub unresolved: Vec<String>,
}

pub struct FileWriter;

impl FileWriter {
    pub fn new() -> Self {
        Self
    }

    /// Writes the full report and a manifest to the output directory.
    pub fn write_results(
        &self,
        report: &Report,
        result: &AnalysisResult,
        base_path: &Path,
    ) -> Result<(), AnalysisError> {
        fs::create_dir_all(base_path)?;

        let report_json = serde_json::to_string_pretty(report)?;
        fs::write(base_path.join("report.json"), report_json)?;

        let manifest = self.build_manifest(report, result);
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        fs::write(base_path.join("manifest.json"), manifest_json)?;

        Ok(())
    }

    fn build_manifest(&self, report: &Report, result: &AnalysisResult) -> Manifest {
        let objects: Vec<String> = result
            .graph
            .keys()
            .filter(|id| !id.object.is_empty())
            .map(|id| id.object.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        Manifest {
            objects,
            main_cost: report.main_cost,
            interrupt_cost: report.interrupt_cost,
            peak: report.peak,
            recursive: result
                .results
                .iter()
                .filter(|(_, trace)| trace.recursive)
                .map(|(id, _)| id.to_string())
                .collect(),
            ambiguous: result.ambiguous.iter().cloned().collect(),
            unresolved: report.unresolved.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn writes_report_and_manifest() {
        let result = AnalysisResult {
            graph: BTreeMap::new(),
            frame_sizes: BTreeMap::new(),
            results: BTreeMap::new(),
            has_caller: Default::default(),
            global_names: Default::default(),
            ambiguous: Default::default(),
            unresolved: Default::default(),
        };
        let report = Report::from_result(&result);

        let dir = tempfile::tempdir().unwrap();
        FileWriter::new()
            .write_results(&report, &result, dir.path())
            .unwrap();

        let manifest: Manifest = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.peak, 0);
        assert!(dir.path().join("report.json").exists());
    }
}
