//! Per-image status lines and the batch summary.

use std::path::PathBuf;
use std::process::ExitCode;

/// Diagnostics of one successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub iterations: usize,
    pub final_value: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done(RunSummary),
    Failed(String),
}

/// What happened to one input volume.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStatus {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Outcome,
}

impl ImageStatus {
    pub fn from_outcome(input: PathBuf, output: PathBuf, outcome: anyhow::Result<RunSummary>) -> Self {
        let outcome = match outcome {
            Ok(summary) => Outcome::Done(summary),
            Err(e) => Outcome::Failed(format!("{:#}", e)),
        };
        Self { input, output, outcome }
    }

    pub fn line(&self) -> String {
        match &self.outcome {
            Outcome::Done(summary) => format!(
                "[{}] {} -> {} ({} iterations, metric {:.6})",
                if summary.degraded { "degraded" } else { "ok" },
                self.input.display(),
                self.output.display(),
                summary.iterations,
                summary.final_value
            ),
            Outcome::Failed(reason) => format!("[failed] {}: {}", self.input.display(), reason),
        }
    }
}

/// Statuses of a whole batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    statuses: Vec<ImageStatus>,
}

impl BatchReport {
    pub fn new(statuses: Vec<ImageStatus>) -> Self {
        Self { statuses }
    }

    pub fn failed(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| matches!(s.outcome, Outcome::Failed(_)))
            .count()
    }

    pub fn degraded(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| matches!(&s.outcome, Outcome::Done(r) if r.degraded))
            .count()
    }

    pub fn summary(&self) -> String {
        let failed = self.failed();
        format!(
            "{} of {} volumes registered ({} degraded), {} failed",
            self.statuses.len() - failed,
            self.statuses.len(),
            self.degraded(),
            failed
        )
    }

    pub fn print(&self) {
        for status in &self.statuses {
            println!("{}", status.line());
        }
        println!("{}", self.summary());
    }

    /// Failure when any volume failed. Degraded results still count as success.
    pub fn exit_code(&self) -> ExitCode {
        if self.failed() > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(degraded: bool) -> anyhow::Result<RunSummary> {
        Ok(RunSummary {
            iterations: 10,
            final_value: 0.5,
            degraded,
        })
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport::new(vec![
            ImageStatus::from_outcome("a.nii".into(), "affine_a.nii".into(), done(false)),
            ImageStatus::from_outcome("b.nii".into(), "affine_b.nii".into(), done(true)),
            ImageStatus::from_outcome("c.nii".into(), "affine_c.nii".into(), Err(anyhow::anyhow!("missing"))),
        ]);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.degraded(), 1);
        assert_eq!(report.summary(), "2 of 3 volumes registered (1 degraded), 1 failed");
        assert_eq!(report.exit_code(), ExitCode::FAILURE);
    }

    #[test]
    fn test_status_lines() {
        let ok = ImageStatus::from_outcome("a.nii".into(), "affine_a.nii".into(), done(false));
        assert!(ok.line().starts_with("[ok] a.nii -> affine_a.nii"));
        let failed = ImageStatus::from_outcome("c.nii".into(), "x".into(), Err(anyhow::anyhow!("boom")));
        assert_eq!(failed.line(), "[failed] c.nii: boom");
    }
}
