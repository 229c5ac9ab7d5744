//! Batch analysis configuration loading and validation.

use anyhow::{Context, Result};
use lib_causal::{GateConfig, OptimizerConfig, ProjectorConfig};
use lib_dsp::{HilbertConfig, KkConfig, Parity, TransformMethod};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level batch configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Batch name/description.
    pub name: String,

    /// Tasks, run in order.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// One analysis step.
///
/// # Examples
///
/// ```toml
/// [[tasks]]
/// type = "gate"
/// name = "drude"
/// input = "drude.csv"
///
/// [tasks.settings]
/// method = "odd_fft"
/// use_subtracted = true
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Hilbert transform of one column.
    Transform(TransformTask),
    /// KK consistency of a σ1/σ2 pair.
    Check(CheckTask),
    /// Causal projection of a density.
    Project(ProjectTask),
    /// Constrained free-energy minimization.
    Optimize(OptimizeTask),
    /// Causality gate on a σ1/σ2 pair.
    Gate(GateTask),
}

impl Task {
    /// Task name, falling back to the task type.
    pub fn name(&self) -> &str {
        let (name, fallback) = match self {
            Task::Transform(t) => (&t.name, "transform"),
            Task::Check(t) => (&t.name, "check"),
            Task::Project(t) => (&t.name, "project"),
            Task::Optimize(t) => (&t.name, "optimize"),
            Task::Gate(t) => (&t.name, "gate"),
        };
        name.as_deref().unwrap_or(fallback)
    }

    /// Input CSV file, if the task reads one.
    pub fn input(&self) -> Option<&Path> {
        match self {
            Task::Transform(t) => Some(t.input.as_path()),
            Task::Check(t) => Some(t.input.as_path()),
            Task::Project(t) => Some(t.input.as_path()),
            Task::Optimize(t) => match &t.grid {
                GridSource::File { input } => Some(input.as_path()),
                GridSource::Linspace { .. } => None,
            },
            Task::Gate(t) => Some(t.input.as_path()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransformTask {
    #[serde(default)]
    pub name: Option<String>,
    pub input: PathBuf,
    /// Column to transform; the first data column if omitted.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub method: TransformMethod,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub settings: HilbertConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckTask {
    #[serde(default)]
    pub name: Option<String>,
    pub input: PathBuf,
    #[serde(default = "default_sigma1")]
    pub sigma1: String,
    #[serde(default = "default_sigma2")]
    pub sigma2: String,
    #[serde(default)]
    pub method: TransformMethod,
    #[serde(default = "default_kk_tol")]
    pub tol: f64,
    #[serde(default)]
    pub settings: KkConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectTask {
    #[serde(default)]
    pub name: Option<String>,
    pub input: PathBuf,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub method: TransformMethod,
    #[serde(default)]
    pub settings: ProjectorConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizeTask {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub grid: GridSource,
    pub settings: OptimizerConfig,
}

/// Where the optimizer's frequency grid comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSource {
    /// First column of a CSV file.
    File { input: PathBuf },
    /// Evenly spaced grid.
    Linspace {
        omega_min: f64,
        omega_max: f64,
        points: usize,
    },
}

impl Default for GridSource {
    fn default() -> Self {
        Self::Linspace {
            omega_min: 0.01,
            omega_max: 10.0,
            points: 512,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateTask {
    #[serde(default)]
    pub name: Option<String>,
    pub input: PathBuf,
    #[serde(default = "default_sigma1")]
    pub sigma1: String,
    #[serde(default = "default_sigma2")]
    pub sigma2: String,
    #[serde(default)]
    pub settings: GateConfig,
}

fn default_sigma1() -> String { "sigma1".to_string() }
fn default_sigma2() -> String { "sigma2".to_string() }
fn default_kk_tol() -> f64 { 0.12 }

/// Load configuration from a file.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config = parse_config(&content, path.extension().map_or(false, |e| e == "json"))?;

    // Relative input paths are resolved against the config file's directory
    if let Some(base) = path.parent() {
        resolve_inputs(&mut config, base);
    }

    validate_config(&config)?;

    Ok(config)
}

/// Parse TOML (default) or JSON configuration text.
pub fn parse_config(content: &str, json: bool) -> Result<AnalysisConfig> {
    if json {
        serde_json::from_str(content).context("Failed to parse config as JSON")
    } else {
        toml::from_str(content).context("Failed to parse config as TOML")
    }
}

fn resolve_inputs(config: &mut AnalysisConfig, base: &Path) {
    let resolve = |p: &mut PathBuf| {
        if p.is_relative() {
            *p = base.join(&*p);
        }
    };
    for task in &mut config.tasks {
        match task {
            Task::Transform(t) => resolve(&mut t.input),
            Task::Check(t) => resolve(&mut t.input),
            Task::Project(t) => resolve(&mut t.input),
            Task::Optimize(t) => {
                if let GridSource::File { input } = &mut t.grid {
                    resolve(input);
                }
            }
            Task::Gate(t) => resolve(&mut t.input),
        }
    }
}

/// Validate configuration.
pub fn validate_config(config: &AnalysisConfig) -> Result<()> {
    if config.tasks.is_empty() {
        anyhow::bail!("Configuration '{}' defines no tasks", config.name);
    }

    for task in &config.tasks {
        let name = task.name();

        if let Some(input) = task.input() {
            if !input.exists() {
                anyhow::bail!("Task '{}': input file not found: {:?}", name, input);
            }
        }

        let checked = match task {
            Task::Transform(t) => t.settings.validate().map_err(anyhow::Error::from),
            Task::Check(t) => {
                if !(t.tol > 0.0 && t.tol.is_finite()) {
                    anyhow::bail!("Task '{}': tol must be positive, got {}", name, t.tol);
                }
                t.settings.validate().map_err(anyhow::Error::from)
            }
            Task::Project(t) => t.settings.validate().map_err(anyhow::Error::from),
            Task::Optimize(t) => {
                if let GridSource::Linspace { omega_min, omega_max, points } = t.grid {
                    if !(omega_min > 0.0 && omega_max > omega_min) || points < 2 {
                        anyhow::bail!(
                            "Task '{}': linspace grid needs 0 < omega_min < omega_max and at least 2 points",
                            name
                        );
                    }
                }
                if !(t.settings.theta > 0.0 && t.settings.theta.is_finite()) {
                    anyhow::bail!("Task '{}': theta must be positive, got {}", name, t.settings.theta);
                }
                if t.settings.max_iter == 0 {
                    anyhow::bail!("Task '{}': max_iter must be at least 1", name);
                }
                t.settings.projector.validate().map_err(anyhow::Error::from)
            }
            Task::Gate(t) => {
                if !(t.settings.kk_tol > 0.0 && t.settings.kk_tol.is_finite()) {
                    anyhow::bail!("Task '{}': kk_tol must be positive, got {}", name, t.settings.kk_tol);
                }
                t.settings.projector.validate().map_err(anyhow::Error::from)
            }
        };
        checked.with_context(|| format!("Task '{}' has invalid settings", name))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &str = r#"
name = "drude study"

[[tasks]]
type = "check"
input = "drude.csv"
method = "kernel"
tol = 0.2

[[tasks]]
type = "gate"
name = "gated"
input = "drude.csv"

[tasks.settings]
use_subtracted = true
kk_tol = 0.1

[[tasks]]
type = "optimize"

[tasks.grid]
omega_min = 0.01
omega_max = 10.0
points = 256

[tasks.settings]
theta = 2.0
"#;

    #[test]
    fn test_parse_toml_batch() {
        let config = parse_config(BATCH, false).unwrap();
        assert_eq!(config.name, "drude study");
        assert_eq!(config.tasks.len(), 3);

        match &config.tasks[0] {
            Task::Check(t) => {
                assert_eq!(t.method, TransformMethod::Kernel);
                assert_eq!(t.sigma1, "sigma1");
                assert!((t.tol - 0.2).abs() < 1e-15);
            }
            other => panic!("unexpected task {:?}", other),
        }

        match &config.tasks[1] {
            Task::Gate(t) => {
                assert!(t.settings.use_subtracted);
                assert!(t.settings.enforce_projection);
                assert!((t.settings.kk_tol - 0.1).abs() < 1e-15);
            }
            other => panic!("unexpected task {:?}", other),
        }
        assert_eq!(config.tasks[1].name(), "gated");

        match &config.tasks[2] {
            Task::Optimize(t) => {
                assert_eq!(
                    t.grid,
                    GridSource::Linspace { omega_min: 0.01, omega_max: 10.0, points: 256 }
                );
                assert_eq!(t.settings.kernel, "canonical");
                assert_eq!(t.settings.max_iter, 80);
            }
            other => panic!("unexpected task {:?}", other),
        }
        assert_eq!(config.tasks[2].name(), "optimize");
        assert!(config.tasks[2].input().is_none());
    }

    #[test]
    fn test_parse_json_batch() {
        let json = r#"{
            "name": "json batch",
            "tasks": [
                {"type": "transform", "input": "a.csv", "parity": "even", "method": "odd_fft_uniform"},
                {"type": "optimize", "grid": {"input": "grid.csv"}, "settings": {"theta": 0.5}}
            ]
        }"#;
        let config = parse_config(json, true).unwrap();
        match &config.tasks[0] {
            Task::Transform(t) => {
                assert_eq!(t.parity, Parity::Even);
                assert_eq!(t.method, TransformMethod::OddFftUniform);
            }
            other => panic!("unexpected task {:?}", other),
        }
        assert_eq!(config.tasks[1].input(), Some(Path::new("grid.csv")));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let toml = "name = \"x\"\n[[tasks]]\ntype = \"check\"\ninput = \"a.csv\"\nmethod = \"wavelet\"\n";
        assert!(parse_config(toml, false).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_input_and_bad_theta() {
        let config = parse_config(BATCH, false).unwrap();
        // drude.csv does not exist relative to the test's working directory
        assert!(validate_config(&config).is_err());

        let mut optimize_only = config.clone();
        optimize_only.tasks.retain(|t| matches!(t, Task::Optimize(_)));
        assert!(validate_config(&optimize_only).is_ok());

        if let Task::Optimize(t) = &mut optimize_only.tasks[0] {
            t.settings.theta = 0.0;
        }
        assert!(validate_config(&optimize_only).is_err());

        let empty = AnalysisConfig { name: "empty".into(), tasks: vec![] };
        assert!(validate_config(&empty).is_err());
    }
}
