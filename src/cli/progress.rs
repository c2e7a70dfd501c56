//! Terminal progress display for pipeline runs

use crate::observer::{ExecuteEvent, ExecuteObserver, LogLevel};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TEMPLATE: &str = "{spinner:.green} [{pos}/{len}] {wide_msg} {elapsed}";

/// Observer drawing a spinner with task counts on stderr.
///
/// Warnings and errors are printed above the bar; info lines only when
/// `verbose` is set.
pub struct ProgressObserver {
    bar: ProgressBar,
    verbose: bool,
}

impl ProgressObserver {
    pub fn new(verbose: bool) -> Self {
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bar = ProgressBar::new(0).with_style(style);
        Self::with_bar(bar, verbose)
    }

    /// Observer over an existing bar (hidden bars in tests)
    pub fn with_bar(bar: ProgressBar, verbose: bool) -> Self {
        Self { bar, verbose }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ExecuteObserver for ProgressObserver {
    fn on_event(&self, event: &ExecuteEvent) {
        match event {
            ExecuteEvent::PipelineStarted { context, tasks } => {
                self.bar.set_length(*tasks as u64);
                self.bar.set_position(0);
                self.bar.set_message(format!("{}: starting", context));
                self.bar.enable_steady_tick(Duration::from_millis(120));
            }
            ExecuteEvent::TaskStarted { task, .. } => {
                self.bar.set_message(task.clone());
            }
            ExecuteEvent::Log {
                source,
                level,
                message,
            } => match level {
                LogLevel::Info if !self.verbose => {}
                _ => self.bar.println(format!("[{}:{}] {}", source, level, message)),
            },
            ExecuteEvent::RequirementsUnsatisfied { task, unsatisfied } => {
                for requirement in unsatisfied {
                    self.bar
                        .println(format!("[{}] requirement not met: {}", task, requirement));
                }
                self.bar.inc(1);
            }
            ExecuteEvent::TaskFinished {
                task, exit_code, ..
            } => {
                if *exit_code != 0 {
                    self.bar
                        .println(format!("[{}] exited with code {}", task, exit_code));
                }
                self.bar.inc(1);
            }
            ExecuteEvent::Canceled { source } => {
                self.bar.set_message(format!("canceling ({})", source));
            }
            ExecuteEvent::PipelineFinished { status, duration } => {
                self.bar.finish_with_message(format!(
                    "{} in {:.1}s",
                    status,
                    duration.as_secs_f64()
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunStatus;

    #[test]
    fn test_counts_finished_and_skipped_tasks() {
        let observer = ProgressObserver::with_bar(ProgressBar::hidden(), false);
        observer.on_event(&ExecuteEvent::PipelineStarted {
            context: "ctx".to_string(),
            tasks: 3,
        });
        observer.on_event(&ExecuteEvent::TaskStarted {
            task: "a".to_string(),
            order: 0,
        });
        observer.info("a", "hidden unless verbose");
        observer.on_event(&ExecuteEvent::TaskFinished {
            task: "a".to_string(),
            exit_code: 0,
            duration: Duration::from_millis(5),
        });
        observer.on_event(&ExecuteEvent::RequirementsUnsatisfied {
            task: "b".to_string(),
            unsatisfied: vec![],
        });
        assert_eq!(observer.position(), 2);

        observer.on_event(&ExecuteEvent::PipelineFinished {
            status: RunStatus::Failed,
            duration: Duration::from_millis(10),
        });
        assert_eq!(observer.position(), 2);
    }
}
