// Result correlation: execute a run command, parse the JSON result
// envelope off stdout, and replay each reported result onto its tree
// node through the event sink. This path never raises: process and
// parse failures degrade into failed states or logged truncation.

use serde::Deserialize;
use tracing::{error, warn};

use crate::command::build_run_command;
use crate::config::Config;
use crate::errors::RunError;
use crate::events::{Decoration, EventSink, TestEvent, TestState};
use crate::patterns::{self, PatternRegistry};
use crate::process::ProcessRunner;
use crate::tree::{DiscoverySession, TreeNode};

/// One JSON line printed by the output plugin after the banner.
#[derive(Debug, Deserialize)]
struct ResultEnvelope {
    #[serde(default)]
    tests: Vec<CaseResult>,
}

#[derive(Debug, Deserialize)]
struct CaseResult {
    name: String,
    group: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Map a reported status onto an event state. OK and XFAIL (expected
/// failure) count as passed; unknown statuses default to passed as
/// well, matching the runner's own summary convention.
fn state_for(status: &str) -> TestState {
    match status {
        "FAIL" | "ERROR" => TestState::Failed,
        "SKIP" => TestState::Skipped,
        _ => TestState::Passed,
    }
}

/// Run the selection identified by `ids` and emit one event per
/// reported result. Always emits `run_started` first and `run_finished`
/// last, even when the selection is empty or the output is unusable.
pub fn run_selection(
    session: &DiscoverySession,
    ids: &[String],
    config: &Config,
    registry: &PatternRegistry,
    process: &dyn ProcessRunner,
    sink: &mut dyn EventSink,
) {
    sink.run_started(ids);

    let nodes: Vec<&TreeNode> = ids
        .iter()
        .filter_map(|id| {
            let node = session.find_node(id);
            if node.is_none() {
                warn!(%id, "selected node not found in tree");
            }
            node
        })
        .collect();

    let exe = config.lua_test_exe(session.workspace());
    if let Some(command) = build_run_command(&exe, &nodes, sink) {
        execute_and_correlate(session, &command, registry, process, sink);
    }

    sink.run_finished();
}

fn execute_and_correlate(
    session: &DiscoverySession,
    command: &str,
    registry: &PatternRegistry,
    process: &dyn ProcessRunner,
    sink: &mut dyn EventSink,
) {
    // A process-level failure invalidates every individual result in
    // the run; its text overrides each result's message below.
    let (stdout, stderr) = match process.execute(command, session.workspace()) {
        Ok(output) => {
            let failed = output.exit_code != Some(0);
            let stderr = if failed && !output.stderr.is_empty() {
                output.stderr
            } else if failed {
                match output.exit_code {
                    Some(code) => format!("runner exited with code {code}"),
                    None => "runner terminated by signal".to_string(),
                }
            } else {
                String::new()
            };
            (output.stdout, stderr)
        }
        Err(e) => (String::new(), e.to_string()),
    };

    // Line 0 is a banner; line 1 carries the envelope. A missing or
    // malformed envelope ends the run with no per-test events.
    let Some(payload) = stdout.lines().nth(1) else {
        error!("runner output has no result line");
        return;
    };
    let envelope: ResultEnvelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!("failed to parse test results: {e}");
            return;
        }
    };

    for case in envelope.tests {
        let Some(node) = session.resolve_result(&case.group, &case.name) else {
            warn!(group = %case.group, test = %case.name, "result does not match any known test");
            continue;
        };
        let mut event = TestEvent {
            id: node.id().to_string(),
            state: state_for(&case.status),
            message: Some(case.message.clone()),
            decoration: None,
        };
        if !stderr.is_empty() {
            event.state = TestState::Failed;
            event.message = Some(stderr.clone());
        } else if event.state == TestState::Failed {
            event.decoration = extract_decoration(registry, &case.message);
        }
        sink.test_state(event);
    }
}

/// Pull a (line, message) decoration out of a failure message via the
/// failure-location pattern. The captured line is kept 1-based, as
/// authored by the runner.
fn extract_decoration(registry: &PatternRegistry, message: &str) -> Option<Decoration> {
    let caps = registry.decoration().captures(message)?;
    let line: u32 = caps[patterns::LINE].parse().ok()?;
    Some(Decoration {
        line,
        message: caps[patterns::MESSAGE].trim().to_string(),
        hover: message.to_string(),
    })
}

/// Cancellation of an in-flight runner process is not implemented.
/// Failing loudly here keeps the caller from believing a cancel
/// happened.
pub fn cancel() -> Result<(), RunError> {
    Err(RunError::CancelUnsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_and_xfail_count_as_passed() {
        assert_eq!(state_for("OK"), TestState::Passed);
        assert_eq!(state_for("XFAIL"), TestState::Passed);
    }

    #[test]
    fn fail_and_error_count_as_failed() {
        assert_eq!(state_for("FAIL"), TestState::Failed);
        assert_eq!(state_for("ERROR"), TestState::Failed);
    }

    #[test]
    fn skip_maps_to_skipped() {
        assert_eq!(state_for("SKIP"), TestState::Skipped);
    }

    #[test]
    fn decoration_is_extracted_from_traceback_message() {
        let registry =
            PatternRegistry::from_config(&crate::config::Config::default()).unwrap();
        let decoration = extract_decoration(
            &registry,
            "spec/foo_test.lua:42:assertion failed stack traceback:",
        )
        .unwrap();
        assert_eq!(decoration.line, 42);
        assert_eq!(decoration.message, "assertion failed");
        assert_eq!(
            decoration.hover,
            "spec/foo_test.lua:42:assertion failed stack traceback:"
        );
    }

    #[test]
    fn message_without_traceback_yields_no_decoration() {
        let registry =
            PatternRegistry::from_config(&crate::config::Config::default()).unwrap();
        assert!(extract_decoration(&registry, "plain failure").is_none());
    }

    #[test]
    fn cancel_fails_loudly() {
        assert!(matches!(cancel(), Err(RunError::CancelUnsupported)));
    }
}
