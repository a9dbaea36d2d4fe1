// Event sink: the narrow interface through which discovery and runs
// report lifecycle and per-test state back to the host UI.

use serde::Serialize;

use crate::tree::TreeNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    Running,
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteState {
    Running,
    Completed,
    Errored,
}

/// A (line, message) annotation attached to a failed result for display
/// at the failure's source location. `line` is 1-based, as reported by
/// the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoration {
    pub line: u32,
    pub message: String,
    pub hover: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestEvent {
    pub id: String,
    pub state: TestState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoration: Option<Decoration>,
}

/// Host Test UI interface. Implementations must not fail; a sink that
/// can't deliver an event drops it.
pub trait EventSink {
    fn load_started(&mut self);
    fn load_finished(&mut self, tree: &TreeNode);
    fn run_started(&mut self, ids: &[String]);
    fn run_finished(&mut self);
    fn suite_state(&mut self, id: &str, state: SuiteState);
    fn test_state(&mut self, event: TestEvent);
}

/// Captures every event in order. Used by tests and by embedders that
/// want to batch events instead of streaming them.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    LoadStarted,
    LoadFinished(TreeNode),
    RunStarted(Vec<String>),
    RunFinished,
    Suite { id: String, state: SuiteState },
    Test(TestEvent),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the per-test events, in emission order.
    pub fn test_events(&self) -> Vec<&TestEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Test(event) => Some(event),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn load_started(&mut self) {
        self.events.push(SinkEvent::LoadStarted);
    }

    fn load_finished(&mut self, tree: &TreeNode) {
        self.events.push(SinkEvent::LoadFinished(tree.clone()));
    }

    fn run_started(&mut self, ids: &[String]) {
        self.events.push(SinkEvent::RunStarted(ids.to_vec()));
    }

    fn run_finished(&mut self) {
        self.events.push(SinkEvent::RunFinished);
    }

    fn suite_state(&mut self, id: &str, state: SuiteState) {
        self.events.push(SinkEvent::Suite {
            id: id.to_string(),
            state,
        });
    }

    fn test_state(&mut self, event: TestEvent) {
        self.events.push(SinkEvent::Test(event));
    }
}
