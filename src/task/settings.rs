use serde::Serialize;

/// Scheduling attributes of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSettings {
    pub name: String,
    pub description: String,
    /// Execution priority; lower runs first, ties keep discovery order
    pub order: i32,
    pub can_async: bool,
    /// When false (and `can_async`), the pipeline does not wait for the task
    /// before starting the next one
    pub wait_result: bool,
    /// A failure of this task does not stop the pipeline
    pub can_failure: bool,
    pub active_condition: Option<String>,
}

impl TaskSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            order: 0,
            can_async: true,
            wait_result: true,
            can_failure: false,
            active_condition: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn can_failure(mut self, can_failure: bool) -> Self {
        self.can_failure = can_failure;
        self
    }

    /// Fire and forget: the pipeline moves on while this task runs
    pub fn background(mut self) -> Self {
        self.can_async = true;
        self.wait_result = false;
        self
    }

    pub fn active_condition(mut self, condition: impl Into<String>) -> Self {
        self.active_condition = Some(condition.into());
        self
    }

    pub fn runs_in_background(&self) -> bool {
        self.can_async && !self.wait_result
    }
}
