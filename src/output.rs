//! CLI output formatting.
//!
//! Each view has a `format_*` function returning lines (pure, testable) and
//! a `print_*` wrapper writing them to stdout.
//!
//! ## Plan
//!
//! ```text
//! default
//! 1  clean
//! 2  styles:fabricator, styles:toolkit, scripts, images, svgs, fonts
//! 3  sass-data
//! 4  assemble
//! ```
//!
//! ## Run
//!
//! ```text
//! ==> Stage 2: styles:fabricator, styles:toolkit, scripts, images, svgs, fonts
//!     ok    scripts (41 ms)
//!     FAIL  fonts (1 ms)
//! ```
//!
//! ## Report
//!
//! ```text
//! styles:toolkit     1 file
//!     error: src/assets/toolkit/styles/toolkit.scss: expected ";"
//! scripts            3 files
//!     hash 2c26b46b68ff
//!     modules 4 cached, 1 read
//! sftp               FAILED: Transfer failed: …
//!
//! Built 9 tasks in 0.84s (1 error, 0 warnings)
//! ```

use crate::graph::{Plan, Target, Task};
use crate::runner::{BuildReport, RunEvent, TaskOutcome};
use crate::tasks::Severity;
use std::time::Duration;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn task_list(tasks: &[Task]) -> String {
    tasks.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
}

/// Every runnable target name with a short description.
pub fn format_targets() -> Vec<String> {
    let mut lines = vec!["Tasks".to_string()];
    for task in Task::ALL {
        lines.push(format!("{}{}", indent(1), task.name()));
    }
    lines.push(String::new());
    lines.push("Composite targets".to_string());
    let width = Target::COMPOSITES.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, about) in Target::COMPOSITES {
        lines.push(format!("{}{name:<width$}  {about}", indent(1)));
    }
    lines
}

pub fn print_targets() {
    for line in format_targets() {
        println!("{line}");
    }
}

pub fn format_plan(target_name: &str, plan: &Plan) -> Vec<String> {
    let mut lines = vec![target_name.to_string()];
    if plan.is_empty() {
        lines.push(format!("{}(no build tasks)", indent(1)));
    }
    for (i, stage) in plan.stages.iter().enumerate() {
        lines.push(format!("{:<3}{}", i + 1, task_list(stage)));
    }
    lines
}

pub fn print_plan(target_name: &str, plan: &Plan) {
    for line in format_plan(target_name, plan) {
        println!("{line}");
    }
}

fn millis(d: Duration) -> u128 {
    d.as_millis()
}

/// Live progress line for a runner event.
pub fn format_run_event(event: &RunEvent) -> String {
    match event {
        RunEvent::StageStarted { index, tasks } => {
            format!("==> Stage {}: {}", index + 1, task_list(tasks))
        }
        RunEvent::TaskFinished { task, elapsed, ok } => {
            let status = if *ok { "ok  " } else { "FAIL" };
            format!("{}{status}  {task} ({} ms)", indent(1), millis(*elapsed))
        }
    }
}

fn outcome_lines(outcome: &TaskOutcome, width: usize) -> Vec<String> {
    let name = outcome.task.name();
    match &outcome.result {
        Err(e) => vec![format!("{name:<width$}  FAILED: {e}")],
        Ok(summary) => {
            let mut lines = vec![format!("{name:<width$}  {}", plural(summary.written.len(), "file"))];
            for diag in &summary.diagnostics {
                let label = match diag.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                lines.push(format!("{}{label}: {diag}", indent(1)));
            }
            for note in &summary.notes {
                lines.push(format!("{}{note}", indent(1)));
            }
            lines
        }
    }
}

/// Per-task summary followed by a totals line.
pub fn format_report(report: &BuildReport) -> Vec<String> {
    let width = report
        .outcomes()
        .map(|o| o.task.name().len())
        .max()
        .unwrap_or(0);
    let mut lines: Vec<String> = report
        .outcomes()
        .flat_map(|o| outcome_lines(o, width))
        .collect();

    let (mut errors, mut warnings) = (0, 0);
    for outcome in report.outcomes() {
        match &outcome.result {
            Ok(summary) => {
                errors += summary.errors().count();
                warnings += summary.warnings().count();
            }
            Err(_) => errors += 1,
        }
    }
    let tasks = report.outcomes().count();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Built {} in {:.2}s ({}, {})",
        plural(tasks, "task"),
        report.elapsed.as_secs_f64(),
        plural(errors, "error"),
        plural(warnings, "warning"),
    ));
    if let Some(task) = report.aborted {
        lines.push(format!("Stopped after '{task}' failed"));
    }
    lines
}

pub fn print_report(report: &BuildReport) {
    for line in format_report(report) {
        println!("{line}");
    }
}
