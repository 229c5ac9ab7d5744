//! Result output formatting and writing.

use crate::orchestrator::TaskReport;
use crate::OutputFormat;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Render a report in the requested format.
pub fn render(report: &TaskReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)? + "\n"),
        OutputFormat::Csv => render_csv(report),
    }
}

/// Write a report to stdout or to a file.
pub fn emit(report: &TaskReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = render(report, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            tracing::info!("Wrote {} report to {:?}", report.name(), path);
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Write batch reports to an output directory, one file per task, plus a
/// text summary.
pub fn write_reports(reports: &[TaskReport], output_dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(reports.len() + 1);
    for (i, report) in reports.iter().enumerate() {
        let path = output_dir.join(format!("{:02}_{}.{}", i + 1, report.name(), format.extension()));
        std::fs::write(&path, render(report, format)?)?;
        tracing::info!("Wrote {:?}", path);
        written.push(path);
    }

    let summary_path = output_dir.join("summary.txt");
    let mut summary = String::new();
    writeln!(summary, "Causal Kernel Batch Summary")?;
    writeln!(summary, "===========================")?;
    for report in reports {
        writeln!(summary)?;
        summary.push_str(&render_text(report)?);
    }
    std::fs::write(&summary_path, summary)?;
    tracing::info!("Wrote summary to {:?}", summary_path);
    written.push(summary_path);

    Ok(written)
}

fn render_text(report: &TaskReport) -> Result<String> {
    let mut s = String::new();
    match report {
        TaskReport::Transform { name, method, parity, column, omega, .. } => {
            writeln!(s, "[{}] Hilbert transform", name)?;
            writeln!(s, "  Column:  {}", column)?;
            writeln!(s, "  Method:  {}", method)?;
            writeln!(s, "  Parity:  {:?}", parity)?;
            writeln!(s, "  Points:  {}", omega.len())?;
        }
        TaskReport::Check { name, method, report } => {
            writeln!(s, "[{}] KK consistency ({})", name, method)?;
            writeln!(s, "  Forward error:  {:.6}", report.forward_error)?;
            writeln!(s, "  Backward error: {:.6}", report.backward_error)?;
            writeln!(s, "  Tolerance:      {}", report.tol)?;
            writeln!(s, "  Consistent:     {}", if report.consistent { "yes" } else { "no" })?;
        }
        TaskReport::Project { name, method, column, violation_before, violation_after, projection, .. } => {
            writeln!(s, "[{}] Causal projection of '{}' ({})", name, column, method)?;
            writeln!(s, "  Violation before: {:.6}", violation_before)?;
            writeln!(s, "  Violation after:  {:.6}", violation_after)?;
            writeln!(s, "  Iterations:       {}", projection.iterations)?;
            writeln!(s, "  Last update:      {:.3e}", projection.last_update)?;
            writeln!(s, "  Converged:        {}", projection.converged)?;
        }
        TaskReport::Optimize { name, method, theta, theta_estimate, result, .. } => {
            writeln!(s, "[{}] Constrained optimization ({})", name, method)?;
            writeln!(s, "  Theta:            {}", theta)?;
            writeln!(s, "  Theta estimate:   {:.6}", theta_estimate)?;
            writeln!(s, "  Free energy:      {:.6}", result.free_energy)?;
            writeln!(s, "  Mean energy:      {:.6}", result.mean_energy)?;
            writeln!(s, "  Entropy:          {:.6}", result.entropy)?;
            writeln!(s, "  Iterations:       {}", result.iterations)?;
            writeln!(s, "  Converged:        {}", result.converged)?;
            writeln!(s, "  Final violation:  {:.6}", result.final_violation)?;
        }
        TaskReport::Gate { name, method, outcome, .. } => {
            let d = &outcome.diagnostics;
            writeln!(s, "[{}] Causality gate ({})", name, method)?;
            writeln!(
                s,
                "  Before:           forward {:.6}, backward {:.6}",
                d.before.forward_error, d.before.backward_error
            )?;
            writeln!(
                s,
                "  After:            forward {:.6}, backward {:.6}",
                d.after.forward_error, d.after.backward_error
            )?;
            writeln!(s, "  Projected:        {} ({} iterations)", d.projected, d.projection_iterations)?;
            writeln!(s, "  f-sum area:       {:.6e}", d.f_sum_area)?;
            if d.subtracted {
                writeln!(s, "  UV offset:        {:.6e}", d.subtraction_coefficient)?;
            }
            if d.subtraction_recommended {
                writeln!(s, "  Note: tail carries >20% of the weight, subtraction recommended")?;
            }
            writeln!(s, "  KK_consistency:   {}", d.gates.kk_consistency)?;
            writeln!(s, "  f_sum_positive:   {}", d.gates.f_sum_positive)?;
            writeln!(s, "  Status:           {}", d.status)?;
        }
    }
    Ok(s)
}

fn render_csv(report: &TaskReport) -> Result<String> {
    let mut s = String::new();
    match report {
        TaskReport::Transform { column, omega, input, output, .. } => {
            writeln!(s, "omega,{},hilbert_{}", column, column)?;
            for ((w, x), h) in omega.iter().zip(input).zip(output) {
                writeln!(s, "{},{},{}", w, x, h)?;
            }
        }
        TaskReport::Check { report, .. } => {
            writeln!(s, "metric,value")?;
            writeln!(s, "forward_error,{}", report.forward_error)?;
            writeln!(s, "backward_error,{}", report.backward_error)?;
            writeln!(s, "tol,{}", report.tol)?;
            writeln!(s, "consistent,{}", report.consistent)?;
        }
        TaskReport::Project { omega, projection, .. } => {
            writeln!(s, "omega,density")?;
            for (w, p) in omega.iter().zip(&projection.density) {
                writeln!(s, "{},{}", w, p)?;
            }
        }
        TaskReport::Optimize { omega, result, .. } => {
            writeln!(s, "omega,density")?;
            for (w, p) in omega.iter().zip(&result.density) {
                writeln!(s, "{},{}", w, p)?;
            }
        }
        TaskReport::Gate { omega, outcome, .. } => {
            writeln!(s, "omega,sigma1,sigma2")?;
            for ((w, s1), s2) in omega.iter().zip(&outcome.sigma1).zip(&outcome.sigma2) {
                writeln!(s, "{},{},{}", w, s1, s2)?;
            }
        }
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_dsp::TransformMethod;
    use lib_types::ConsistencyReport;

    fn check_report() -> TaskReport {
        TaskReport::Check {
            name: "drude".to_string(),
            method: TransformMethod::OddFft,
            report: ConsistencyReport::new(0.02, 0.03, 0.12),
        }
    }

    #[test]
    fn test_render_formats() {
        let report = check_report();

        let text = render(&report, OutputFormat::Text).unwrap();
        assert!(text.contains("Consistent:     yes"));

        let json: serde_json::Value =
            serde_json::from_str(&render(&report, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["type"], "check");
        assert_eq!(json["method"], "odd_fft");
        assert_eq!(json["report"]["consistent"], true);

        let csv = render(&report, OutputFormat::Csv).unwrap();
        assert!(csv.starts_with("metric,value\n"));
        assert!(csv.contains("consistent,true"));
    }

    #[test]
    fn test_write_reports_creates_files() {
        let dir = std::env::temp_dir().join("causal_kernel_output_test");
        let written = write_reports(&[check_report()], &dir, OutputFormat::Csv).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("01_drude.csv"));
        assert!(written.iter().all(|p| p.exists()));
    }
}
