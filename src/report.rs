use serde::Serialize;

use crate::model::{AnalysisResult, FuncId};

/// One row of the cost table.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    /// `>` for a root with no known caller, `R` for a recursive
    /// function, blank otherwise
    pub tag: char,
    /// Bare name, qualified by object file only when ambiguous
    pub name: String,
    pub cost: u64,
    pub frame: u64,
    pub height: u64,
}

/// Presentation model for one run: the sorted cost table, the peak
/// estimate, and the unresolved call targets.
#[derive(Debug, Serialize)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    /// Cost of `main`, 0 when the program has none
    pub main_cost: u64,
    /// Cost of the synthetic interrupt root
    pub interrupt_cost: u64,
    /// `main` plus the worst-case interrupt context
    pub peak: u64,
    pub unresolved: Vec<String>,
}

impl Report {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let mut rows: Vec<ReportRow> = result
            .results
            .iter()
            .map(|(id, trace)| {
                let name = if result.ambiguous.contains(&id.name) {
                    id.to_string()
                } else {
                    id.name.clone()
                };
                // rootness wins the shared tag column
                let tag = if !result.has_caller.contains(id) {
                    '>'
                } else if trace.recursive {
                    'R'
                } else {
                    ' '
                };
                ReportRow {
                    tag,
                    name,
                    cost: trace.cost,
                    frame: result.frame_size(id),
                    height: trace.height,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.cost.cmp(&a.cost).then_with(|| a.name.cmp(&b.name)));

        let main_cost = result
            .global_names
            .get("main")
            .and_then(|id| result.results.get(id))
            .map(|trace| trace.cost)
            .unwrap_or(0);
        let interrupt_cost = result
            .results
            .get(&FuncId::interrupt_root())
            .map(|trace| trace.cost)
            .unwrap_or(0);

        Self {
            rows,
            main_cost,
            interrupt_cost,
            peak: main_cost + interrupt_cost,
            unresolved: result.unresolved.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Print the table, the peak estimate and the unresolved targets to
    /// stdout.
    pub fn print(&self) {
        println!("  {:<30} {:>8} {:>8} {:>8}", "Func", "Cost", "Frame", "Height");
        println!("{}", "-".repeat(72));
        for row in &self.rows {
            println!(
                "{} {:<30} {:>8} {:>8} {:>8}",
                row.tag, row.name, row.cost, row.frame, row.height
            );
        }
        println!();
        println!("Peak execution estimate (main + worst-case interrupt):");
        println!(
            "  main = {}, worst interrupt = {}, total = {}",
            self.main_cost, self.interrupt_cost, self.peak
        );
        println!();
        println!("The following call targets were not resolved:");
        for target in &self.unresolved {
            println!("  {}", target);
        }
    }
}
