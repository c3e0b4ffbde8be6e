//! Aggregated run results, the console summary and the JSON report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::AcceptanceResult;
use crate::runner::{StepResult, StepStatus, SuiteResult};

pub const REPORT_FILE: &str = "acceptance-report.json";

const RULE: &str = "============================================================";

/// Results of a whole run, suites in execution order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    suites: Vec<SuiteResult>,
}

/// On-disk form of a report, with the totals precomputed
#[derive(Serialize)]
struct ReportFile<'a> {
    started_at: &'a DateTime<Utc>,
    finished_at: &'a Option<DateTime<Utc>>,
    passed: usize,
    warnings: usize,
    failed: usize,
    exit_code: i32,
    suites: &'a [SuiteResult],
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            suites: Vec::new(),
        }
    }

    pub fn record(&mut self, suite: SuiteResult) {
        self.suites.push(suite);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn suites(&self) -> &[SuiteResult] {
        &self.suites
    }

    /// Every step of every suite, in execution order
    pub fn steps(&self) -> impl Iterator<Item = &StepResult> {
        self.suites.iter().flat_map(|suite| suite.steps().iter())
    }

    /// Steps that passed, warnings included
    pub fn total_passed(&self) -> usize {
        self.steps().filter(|s| !s.status.is_failure()).count()
    }

    pub fn total_warnings(&self) -> usize {
        self.steps()
            .filter(|s| s.status == StepStatus::PassedWithWarning)
            .count()
    }

    pub fn total_failed(&self) -> usize {
        self.steps().filter(|s| s.status.is_failure()).count()
    }

    pub fn screenshots(&self) -> Vec<&Path> {
        self.steps()
            .filter_map(|s| s.screenshot_path.as_deref())
            .collect()
    }

    /// 0 when nothing failed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.total_failed() == 0 {
            0
        } else {
            1
        }
    }

    /// Human-readable summary: passed, failed, screenshots, then observations
    pub fn summarize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "📊 ACCEPTANCE TEST SUMMARY");
        let _ = writeln!(out, "{}", RULE);

        let _ = writeln!(out);
        let _ = writeln!(out, "✅ Passed: {}", self.total_passed());
        for step in self.steps().filter(|s| !s.status.is_failure()) {
            match step.status {
                StepStatus::PassedWithWarning => {
                    let _ = writeln!(out, "   • ⚠️  {}", step.message);
                }
                _ => {
                    let _ = writeln!(out, "   • {}", step.message);
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "❌ Failed: {}", self.total_failed());
        for step in self.steps().filter(|s| s.status.is_failure()) {
            let _ = writeln!(out, "   • {}", step.message);
        }

        let screenshots = self.screenshots();
        let _ = writeln!(out);
        let _ = writeln!(out, "📸 Screenshots: {}", screenshots.len());
        for path in screenshots {
            let _ = writeln!(out, "   • {}", path.display());
        }

        let observed: Vec<(&str, &str)> = self
            .suites
            .iter()
            .flat_map(|suite| {
                suite.steps().iter().flat_map(move |step| {
                    step.observations
                        .iter()
                        .map(move |note| (suite.suite.as_str(), note.as_str()))
                })
            })
            .collect();
        if !observed.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "🔎 Observations: {}", observed.len());
            for (suite, note) in observed {
                let _ = writeln!(out, "   • [{}] {}", suite, note);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", RULE);
        out
    }

    /// Write the JSON report into `dir`, returning its path
    pub fn write_json(&self, dir: &Path) -> AcceptanceResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        let file = ReportFile {
            started_at: &self.started_at,
            finished_at: &self.finished_at,
            passed: self.total_passed(),
            warnings: self.total_warnings(),
            failed: self.total_failed(),
            exit_code: self.exit_code(),
            suites: &self.suites,
        };
        std::fs::write(&path, serde_json::to_string_pretty(&file)?)?;
        Ok(path)
    }
}
