//! Analysis orchestration.

use crate::config::{
    AnalysisConfig, CheckTask, GateTask, GridSource, OptimizeTask, ProjectTask, Task, TransformTask,
};
use crate::input::SpectralTable;
use anyhow::{Context, Result};
use lib_causal::{CausalityGate, ConstrainedOptimizer, GateOutcome, KkProjector, Projection};
use lib_dsp::{HilbertTransform, KramersKronig, Parity, TransformMethod};
use lib_types::{ConsistencyReport, FrequencyGrid, OptimizationResult};
use serde::Serialize;

/// Batch orchestrator.
pub struct Orchestrator {
    config: AnalysisConfig,
}

impl Orchestrator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Run every task in order, stopping at the first failure.
    pub fn run(&self) -> Result<Vec<TaskReport>> {
        tracing::info!(batch = %self.config.name, tasks = self.config.tasks.len(), "starting batch");

        let mut reports = Vec::with_capacity(self.config.tasks.len());
        for task in &self.config.tasks {
            let report = run_task(task).with_context(|| format!("Task '{}' failed", task.name()))?;
            reports.push(report);
        }

        tracing::info!(batch = %self.config.name, "batch complete");
        Ok(reports)
    }
}

/// Result of one task.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskReport {
    Transform {
        name: String,
        method: TransformMethod,
        parity: Parity,
        column: String,
        omega: Vec<f64>,
        input: Vec<f64>,
        output: Vec<f64>,
    },
    Check {
        name: String,
        method: TransformMethod,
        report: ConsistencyReport,
    },
    Project {
        name: String,
        method: TransformMethod,
        column: String,
        violation_before: f64,
        violation_after: f64,
        omega: Vec<f64>,
        projection: Projection,
    },
    Optimize {
        name: String,
        method: TransformMethod,
        theta: f64,
        theta_estimate: f64,
        omega: Vec<f64>,
        result: OptimizationResult,
    },
    Gate {
        name: String,
        method: TransformMethod,
        omega: Vec<f64>,
        outcome: GateOutcome,
    },
}

impl TaskReport {
    pub fn name(&self) -> &str {
        match self {
            TaskReport::Transform { name, .. }
            | TaskReport::Check { name, .. }
            | TaskReport::Project { name, .. }
            | TaskReport::Optimize { name, .. }
            | TaskReport::Gate { name, .. } => name,
        }
    }
}

/// Run a single task.
pub fn run_task(task: &Task) -> Result<TaskReport> {
    let name = task.name().to_string();
    tracing::info!(task = %name, "running task");

    match task {
        Task::Transform(t) => run_transform(name, t),
        Task::Check(t) => run_check(name, t),
        Task::Project(t) => run_project(name, t),
        Task::Optimize(t) => run_optimize(name, t),
        Task::Gate(t) => run_gate(name, t),
    }
}

fn run_transform(name: String, task: &TransformTask) -> Result<TaskReport> {
    let table = SpectralTable::load(&task.input)?;
    let grid = table.grid()?;
    let (column, values) = table.column_or_first(task.column.as_deref())?;

    let hilbert = HilbertTransform::with_config(&grid, task.method, &task.settings)
        .context("Failed to build Hilbert transform")?;
    let output = hilbert.apply(values, task.parity)?;

    Ok(TaskReport::Transform {
        name,
        method: task.method,
        parity: task.parity,
        column: column.to_string(),
        omega: grid.as_slice().to_vec(),
        input: values.to_vec(),
        output,
    })
}

fn run_check(name: String, task: &CheckTask) -> Result<TaskReport> {
    let table = SpectralTable::load(&task.input)?;
    let grid = table.grid()?;
    let sigma1 = table.spectral(&grid, &task.sigma1)?;
    let sigma2 = table.spectral(&grid, &task.sigma2)?;

    let kk = KramersKronig::with_config(&grid, task.method, &task.settings)
        .context("Failed to build KK relations")?;
    let report = kk.check_consistency(sigma1.as_slice(), sigma2.as_slice(), task.tol)?;

    tracing::info!(
        forward_error = report.forward_error,
        backward_error = report.backward_error,
        consistent = report.consistent,
        "consistency check"
    );

    Ok(TaskReport::Check {
        name,
        method: task.method,
        report,
    })
}

fn run_project(name: String, task: &ProjectTask) -> Result<TaskReport> {
    let table = SpectralTable::load(&task.input)?;
    let grid = table.grid()?;
    let (column, values) = table.column_or_first(task.column.as_deref())?;

    let projector = KkProjector::with_config(&grid, task.method, task.settings.clone())
        .context("Failed to build projector")?;
    let violation_before = projector.violation(values)?;
    let projection = projector.project(values)?;
    let violation_after = projector.violation(&projection.density)?;

    if !projection.converged {
        tracing::warn!(
            iterations = projection.iterations,
            last_update = projection.last_update,
            "projection stopped above its tolerance"
        );
    }

    Ok(TaskReport::Project {
        name,
        method: task.method,
        column: column.to_string(),
        violation_before,
        violation_after,
        omega: grid.as_slice().to_vec(),
        projection,
    })
}

fn run_optimize(name: String, task: &OptimizeTask) -> Result<TaskReport> {
    let grid = match &task.grid {
        GridSource::File { input } => SpectralTable::load(input)?.grid()?,
        GridSource::Linspace { omega_min, omega_max, points } => {
            FrequencyGrid::linspace(*omega_min, *omega_max, *points)
                .context("Invalid linspace grid")?
        }
    };

    let settings = &task.settings;
    let optimizer = ConstrainedOptimizer::from_config(&grid, settings)?;
    let result = optimizer.minimize(settings.max_iter, settings.tol)?;

    Ok(TaskReport::Optimize {
        name,
        method: settings.method,
        theta: settings.theta,
        theta_estimate: result.theta_estimate(),
        omega: grid.as_slice().to_vec(),
        result,
    })
}

fn run_gate(name: String, task: &GateTask) -> Result<TaskReport> {
    let table = SpectralTable::load(&task.input)?;
    let grid = table.grid()?;
    let sigma1 = table.spectral(&grid, &task.sigma1)?;
    let sigma2 = table.spectral(&grid, &task.sigma2)?;

    let gate = CausalityGate::new(&grid, task.settings.clone())?;
    if !sigma1.is_non_negative() {
        tracing::warn!(column = %task.sigma1, "sigma1 has negative or non-finite values");
    }
    let outcome = gate.run(sigma1.as_slice(), sigma2.as_slice())?;

    tracing::info!(status = %outcome.diagnostics.status, "gate verdict");

    Ok(TaskReport::Gate {
        name,
        method: task.settings.method,
        omega: grid.as_slice().to_vec(),
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use std::f64::consts::PI;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_drude_csv(file_name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(file_name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# Drude, gamma = 0.1").unwrap();
        writeln!(f, "omega,sigma1,sigma2").unwrap();
        let (gamma, amp) = (0.1, 1.0 / (4.0 * PI));
        for i in 0..600 {
            let w = 0.01 + (5.0 - 0.01) * i as f64 / 599.0;
            let d = w * w + gamma * gamma;
            writeln!(f, "{},{},{}", w, amp * gamma / d, -amp * w / d).unwrap();
        }
        path
    }

    #[test]
    fn test_batch_runs_every_task() {
        let csv = write_drude_csv("causal_kernel_orchestrator_batch.csv");
        let toml = format!(
            r#"
name = "batch"

[[tasks]]
type = "check"
input = {path:?}

[[tasks]]
type = "gate"
input = {path:?}

[[tasks]]
type = "project"
input = {path:?}
column = "sigma1"
"#,
            path = csv.display().to_string()
        );
        let config = parse_config(&toml, false).unwrap();
        let reports = Orchestrator::new(config).run().unwrap();
        assert_eq!(reports.len(), 3);

        match &reports[0] {
            TaskReport::Check { report, .. } => assert!(report.consistent, "{:?}", report),
            other => panic!("unexpected report {:?}", other),
        }
        match &reports[1] {
            TaskReport::Gate { outcome, .. } => assert!(outcome.diagnostics.status.is_pass()),
            other => panic!("unexpected report {:?}", other),
        }
        match &reports[2] {
            TaskReport::Project { violation_before, projection, .. } => {
                assert!(*violation_before < 0.03);
                assert_eq!(projection.density.len(), 600);
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_fails_task() {
        let csv = write_drude_csv("causal_kernel_orchestrator_column.csv");
        let task = Task::Check(CheckTask {
            name: None,
            input: csv,
            sigma1: "re".to_string(),
            sigma2: "sigma2".to_string(),
            method: TransformMethod::OddFft,
            tol: 0.12,
            settings: Default::default(),
        });
        assert!(run_task(&task).is_err());
    }
}
