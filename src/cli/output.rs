//! Output formatting for command results
//!
//! Every command result can be printed as JSON, YAML or human-readable text.
//! JSON and YAML share the same serializable views, so scripts consuming
//! either see the same structure.
//!
//! # Example
//!
//! ```ignore
//! use buildrig::cli::output::{OutputFormat, OutputFormatter};
//!
//! let formatter = OutputFormatter::new(OutputFormat::Json);
//! println!("{}", formatter.format_report(&report)?);
//! ```

use anyhow::{Context, Result};
use serde::Serialize;

use crate::collect::RejectedCandidate;
use crate::options::{FormatMode, OptionSpec, OptionsDocument, TaskOptions};
use crate::pipeline::{PipelineReport, TaskResult};
use crate::requirement::UnsatisfiedRequirement;
use crate::task::{BuildTask, TaskSettings};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// A requirement as shown in listings
#[derive(Debug, Clone, Serialize)]
pub struct RequirementSummary {
    pub name: String,
    pub description: String,
}

/// Everything `list` shows about one task
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub kind: &'static str,
    #[serde(flatten)]
    pub settings: TaskSettings,
    pub requirements: Vec<RequirementSummary>,
    pub options: Vec<OptionSpec>,
}

impl From<&BuildTask> for TaskSummary {
    fn from(task: &BuildTask) -> Self {
        Self {
            kind: task.kind(),
            settings: task.settings.clone(),
            requirements: task
                .requirements
                .iter()
                .map(|r| RequirementSummary {
                    name: r.name().to_string(),
                    description: r.description(),
                })
                .collect(),
            options: task
                .options
                .as_ref()
                .map(|o| o.schema().specs().to_vec())
                .unwrap_or_default(),
        }
    }
}

/// Task listing of one context
#[derive(Debug, Clone, Serialize)]
pub struct TaskListing {
    pub context: String,
    pub tasks: Vec<TaskSummary>,
    pub rejected: Vec<RejectedCandidate>,
}

/// Requirement state of one task
#[derive(Debug, Clone, Serialize)]
pub struct TaskCheck {
    pub task: String,
    pub satisfied: bool,
    pub unsatisfied: Vec<UnsatisfiedRequirement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub context: String,
    pub tasks: Vec<TaskCheck>,
}

impl CheckReport {
    pub fn is_satisfied(&self) -> bool {
        self.tasks.iter().all(|t| t.satisfied)
    }
}

/// Resolved options of one task
#[derive(Debug, Clone, Serialize)]
pub struct OptionsView {
    pub command_line: String,
    pub changed: Vec<String>,
    #[serde(flatten)]
    pub document: OptionsDocument,
}

impl OptionsView {
    pub fn new(task: &str, options: &TaskOptions, mode: FormatMode) -> Self {
        Self {
            command_line: options.format(mode),
            changed: options.changed().into_iter().map(str::to_string).collect(),
            document: OptionsDocument::from_options(task, options),
        }
    }
}

/// Formats command results in the selected format
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_listing(&self, listing: &TaskListing) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.to_json(listing, "task listing"),
            OutputFormat::Yaml => self.to_yaml(listing, "task listing"),
            OutputFormat::Human => Ok(self.format_listing_human(listing)),
        }
    }

    pub fn format_check(&self, report: &CheckReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.to_json(report, "requirement report"),
            OutputFormat::Yaml => self.to_yaml(report, "requirement report"),
            OutputFormat::Human => Ok(self.format_check_human(report)),
        }
    }

    pub fn format_report(&self, report: &PipelineReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.to_json(report, "pipeline report"),
            OutputFormat::Yaml => self.to_yaml(report, "pipeline report"),
            OutputFormat::Human => Ok(self.format_report_human(report)),
        }
    }

    pub fn format_options(&self, view: &OptionsView) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.to_json(view, "options"),
            OutputFormat::Yaml => self.to_yaml(view, "options"),
            OutputFormat::Human => Ok(self.format_options_human(view)),
        }
    }

    fn to_json<T: Serialize>(&self, value: &T, what: &str) -> Result<String> {
        serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {} to JSON", what))
    }

    fn to_yaml<T: Serialize>(&self, value: &T, what: &str) -> Result<String> {
        serde_yaml::to_string(value).with_context(|| format!("Failed to serialize {} to YAML", what))
    }

    fn format_listing_human(&self, listing: &TaskListing) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} ({} task{})\n{}\n",
            listing.context,
            listing.tasks.len(),
            if listing.tasks.len() == 1 { "" } else { "s" },
            RULE
        ));

        if listing.tasks.is_empty() {
            output.push_str("No tasks found\n");
        }

        for task in &listing.tasks {
            let settings = &task.settings;
            output.push_str(&format!(
                "\n{}  ({}, order {})\n",
                settings.name, task.kind, settings.order
            ));
            if !settings.description.is_empty() {
                output.push_str(&format!("  {}\n", settings.description));
            }

            let mut flags = Vec::new();
            if settings.runs_in_background() {
                flags.push("background".to_string());
            }
            if settings.can_failure {
                flags.push("may fail".to_string());
            }
            if let Some(ref condition) = settings.active_condition {
                flags.push(format!("condition {}", condition));
            }
            if !flags.is_empty() {
                output.push_str(&format!("  [{}]\n", flags.join(", ")));
            }

            if !task.requirements.is_empty() {
                output.push_str("  Requires:\n");
                push_tree(
                    &mut output,
                    task.requirements
                        .iter()
                        .map(|r| format!("{}: {}", r.name, r.description)),
                );
            }

            if !task.options.is_empty() {
                output.push_str("  Options:\n");
                push_tree(&mut output, task.options.iter().map(describe_option));
            }
        }

        push_rejected(&mut output, &listing.rejected);
        output
    }

    fn format_check_human(&self, report: &CheckReport) -> String {
        let mut output = String::new();
        if report.is_satisfied() {
            output.push_str(&format!("\u{2713} {}: all requirements satisfied\n", report.context));
        } else {
            output.push_str(&format!("\u{26A0} {}: unsatisfied requirements\n", report.context));
        }
        output.push_str(RULE);
        output.push('\n');

        for task in &report.tasks {
            if task.satisfied {
                output.push_str(&format!("\u{2713} {}\n", task.task));
                continue;
            }
            output.push_str(&format!("\u{2717} {}\n", task.task));
            push_tree(
                &mut output,
                task.unsatisfied
                    .iter()
                    .map(|u| format!("{} ({}): {}", u.name, u.level, u.message)),
            );
        }
        output
    }

    fn format_report_human(&self, report: &PipelineReport) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Pipeline {} for {}: {}\n{}\n",
            report.id, report.context, report.status, RULE
        ));

        for outcome in &report.outcomes {
            let marker = match outcome.result {
                TaskResult::Succeeded => "\u{2713}",
                TaskResult::NotStarted => "-",
                _ if outcome.can_failure => "\u{26A0}",
                _ => "\u{2717}",
            };
            let mut line = format!("{} {}  {}", marker, outcome.task, outcome.result);
            if outcome.background {
                line.push_str("  (background)");
            }
            if outcome.result != TaskResult::NotStarted {
                line.push_str(&format!("  {}ms", outcome.duration_ms));
            }
            output.push_str(&line);
            output.push('\n');

            if let TaskResult::RequirementsUnsatisfied { ref unsatisfied } = outcome.result {
                push_tree(&mut output, unsatisfied.iter().map(|u| u.to_string()));
            }
        }

        push_rejected(&mut output, &report.rejected);
        output.push_str(&format!("\nFinished in {}ms\n", report.duration_ms));
        output
    }

    fn format_options_human(&self, view: &OptionsView) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}\n{}\n", view.document.task, RULE));
        for option in &view.document.options {
            let changed = if view.changed.iter().any(|c| c == &option.name) {
                " *"
            } else {
                ""
            };
            output.push_str(&format!(
                "{:<16} {}{}\n",
                option.display_name, option.value, changed
            ));
        }
        output.push_str(&format!("\nArguments: {}\n", view.command_line));
        output
    }
}

fn describe_option(spec: &OptionSpec) -> String {
    let mut line = format!("--{}=<{}>", spec.name, spec.kind);
    if spec.required {
        line.push_str("  (required)");
    } else {
        line.push_str(&format!("  (default {})", spec.default));
    }
    if !spec.description.is_empty() {
        line.push_str(&format!("  {}", spec.description));
    }
    line
}

fn push_tree(output: &mut String, items: impl Iterator<Item = String>) {
    let items: Vec<String> = items.collect();
    for (i, item) in items.iter().enumerate() {
        let connector = if i == items.len() - 1 {
            "\u{2514}"
        } else {
            "\u{251C}"
        };
        output.push_str(&format!("  {}\u{2500} {}\n", connector, item));
    }
}

fn push_rejected(output: &mut String, rejected: &[RejectedCandidate]) {
    if rejected.is_empty() {
        return;
    }
    output.push_str("\n\u{26A0} Rejected candidates:\n");
    for candidate in rejected {
        output.push_str(&format!(
            "  - {} [{}]: {}\n",
            candidate.candidate, candidate.collector, candidate.reason
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionKind, OptionSchema, OptionValue};
    use crate::pipeline::{RunStatus, TaskOutcome};
    use crate::requirement::{RequirementCollection, SatisfactionLevel, ServiceRequirement};
    use crate::task::{TaskAction, TaskHandler};
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn sample_task() -> BuildTask {
        let schema = Arc::new(
            OptionSchema::new()
                .with(
                    OptionSpec::new("Configuration", OptionKind::enumeration(["Debug", "Release"]))
                        .description("Build configuration")
                        .default_value(OptionValue::Enum("Release".to_string())),
                )
                .with(OptionSpec::new("Target", OptionKind::String).required()),
        );
        BuildTask::new(
            TaskSettings::new("Compile").description("Compile sources").order(5),
            RequirementCollection::new().with(Arc::new(ServiceRequirement::new("process"))),
            Some(schema.defaults()),
            TaskAction::Registered(TaskHandler::blocking(|_| 0)),
        )
    }

    fn sample_report() -> PipelineReport {
        PipelineReport {
            id: Uuid::new_v4(),
            context: "ctx".to_string(),
            status: RunStatus::Failed,
            started_at: Utc::now(),
            outcomes: vec![
                TaskOutcome {
                    task: "Compile".to_string(),
                    order: 0,
                    background: false,
                    can_failure: false,
                    result: TaskResult::Failed { exit_code: 2 },
                    duration_ms: 12,
                },
                TaskOutcome {
                    task: "Package".to_string(),
                    order: 1,
                    background: false,
                    can_failure: false,
                    result: TaskResult::NotStarted,
                    duration_ms: 0,
                },
            ],
            rejected: vec![],
            duration_ms: 15,
        }
    }

    #[test]
    fn test_listing_human() {
        let listing = TaskListing {
            context: "ctx".to_string(),
            tasks: vec![TaskSummary::from(&sample_task())],
            rejected: vec![RejectedCandidate {
                collector: "script".to_string(),
                candidate: "task_bad.py".to_string(),
                reason: "SyntaxError".to_string(),
            }],
        };
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_listing(&listing)
            .unwrap();

        assert!(output.contains("ctx (1 task)"));
        assert!(output.contains("Compile  (registered, order 5)"));
        assert!(output.contains("--Configuration=<enum(Debug|Release)>  (default Release)"));
        assert!(output.contains("--Target=<string>  (required)"));
        assert!(output.contains("task_bad.py [script]: SyntaxError"));
    }

    #[test]
    fn test_listing_json_flattens_settings() {
        let listing = TaskListing {
            context: "ctx".to_string(),
            tasks: vec![TaskSummary::from(&sample_task())],
            rejected: vec![],
        };
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_listing(&listing)
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        let task = &json["tasks"][0];
        assert_eq!(task["name"], "Compile");
        assert_eq!(task["kind"], "registered");
        assert_eq!(task["order"], 5);
        assert_eq!(task["requirements"][0]["name"], "process");
        assert_eq!(task["options"][0]["default"]["value"], "Release");
    }

    #[test]
    fn test_check_lists_every_unsatisfied() {
        let report = CheckReport {
            context: "ctx".to_string(),
            tasks: vec![
                TaskCheck {
                    task: "Compile".to_string(),
                    satisfied: false,
                    unsatisfied: vec![
                        UnsatisfiedRequirement {
                            name: "msbuild".to_string(),
                            level: SatisfactionLevel::Dissatisfied,
                            message: "not installed".to_string(),
                        },
                        UnsatisfiedRequirement {
                            name: "visual-studio".to_string(),
                            level: SatisfactionLevel::PartiallySatisfied,
                            message: "version 15 is too old".to_string(),
                        },
                    ],
                },
                TaskCheck {
                    task: "Lint".to_string(),
                    satisfied: true,
                    unsatisfied: vec![],
                },
            ],
        };
        assert!(!report.is_satisfied());

        let output = OutputFormatter::new(OutputFormat::Human)
            .format_check(&report)
            .unwrap();
        assert!(output.contains("msbuild (dissatisfied): not installed"));
        assert!(output.contains("visual-studio (partially satisfied): version 15 is too old"));
        assert!(output.contains("\u{2713} Lint"));
    }

    #[test]
    fn test_report_formats() {
        let report = sample_report();

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_report(&report)
            .unwrap();
        assert!(human.contains("for ctx: failed"));
        assert!(human.contains("Compile"));
        assert!(human.contains("12ms"));

        let yaml = OutputFormatter::new(OutputFormat::Yaml)
            .format_report(&report)
            .unwrap();
        assert!(yaml.contains("status: failed"));
        assert!(yaml.contains("result: not_started"));
    }

    #[test]
    fn test_options_view() {
        let task = sample_task();
        let mut options = task.options.clone().unwrap();
        options
            .set("Configuration", OptionValue::Enum("Debug".to_string()))
            .unwrap();

        let view = OptionsView::new("Compile", &options, FormatMode::Simplify);
        assert_eq!(view.changed, vec!["Configuration"]);
        assert!(view.command_line.contains("--Configuration=Debug"));

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_options(&view)
            .unwrap();
        assert!(human.contains("Debug *"));
        assert!(human.contains("Arguments: "));
    }
}
