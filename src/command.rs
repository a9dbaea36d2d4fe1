// Run command construction: turns a node selection into one luatest
// invocation. Selectors are the node labels luatest itself understands
// (group names, fully-qualified case names).

use crate::events::{EventSink, TestState};
use crate::tree::TreeNode;

/// Flag requesting the JSON output plugin, plus a shell fallback so a
/// non-zero exit (failing tests, not tool failure) doesn't abort the
/// invocation chain.
const RUN_SUFFIX: &str = "-o json || exit 0";

/// Wrap a selector in single quotes, escaping embedded single quotes.
/// Labels routinely contain `.`, spaces and parametrization brackets.
pub fn quote(label: &str) -> String {
    format!("'{}'", label.replace('\'', r"'\''"))
}

/// Build the runner invocation for a node selection.
///
/// A suite contributes each of its children's labels as selectors and
/// immediately marks every child as running, so the UI shows in-flight
/// state before the process completes. A test contributes its own
/// label. Returns None for an empty selection; the caller must not
/// spawn a process in that case.
pub fn build_run_command(
    exe: &str,
    selected: &[&TreeNode],
    sink: &mut dyn EventSink,
) -> Option<String> {
    if selected.is_empty() {
        return None;
    }
    let mut command = exe.to_string();
    for node in selected {
        match node {
            TreeNode::Suite { children, .. } => {
                for child in children {
                    sink.test_state(crate::events::TestEvent {
                        id: child.id().to_string(),
                        state: TestState::Running,
                        message: None,
                        decoration: None,
                    });
                    command.push(' ');
                    command.push_str(&quote(child.label()));
                }
            }
            TreeNode::Test { label, .. } => {
                command.push(' ');
                command.push_str(&quote(label));
            }
        }
    }
    command.push(' ');
    command.push_str(RUN_SUFFIX);
    Some(command)
}
