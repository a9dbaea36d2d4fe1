// Source scanning and tree assembly. Three strategies, selected at
// configuration time, all feeding the same TreeBuilder so downstream
// code never knows which scanner ran:
//
// - JsonListing: one `--list-test-cases-json` invocation, the runner
//   introspects the project and reports parametrized cases itself.
// - HybridListing: regex scan per file, plus a text listing per grouped
//   test to expand parametrized instances.
// - StaticRegex: regex only, one node per match, no expansion.
//
// Scan-level problems (unreadable file, unknown group) are logged and
// skipped; a file that yields no tests contributes no suite node.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::command::quote;
use crate::config::{Config, ScanStrategy};
use crate::errors::DiscoveryError;
use crate::events::EventSink;
use crate::patterns::{self, PatternRegistry};
use crate::process::ProcessRunner;
use crate::tree::{DiscoverySession, TreeBuilder};

/// Payload of `--list-test-cases-json`, minus the banner line.
#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    tests: Vec<ListedTest>,
    #[serde(default)]
    groups: Vec<ListedGroup>,
}

#[derive(Debug, Deserialize)]
struct ListedTest {
    name: String,
    group: String,
    #[serde(default)]
    line: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ListedGroup {
    name: String,
    file: String,
}

/// Run one discovery pass, replacing the session's tree and index
/// wholesale. Emits `load_started` / `load_finished` around the scan.
pub fn discover(
    session: &mut DiscoverySession,
    config: &Config,
    registry: &PatternRegistry,
    process: &dyn ProcessRunner,
    sink: &mut dyn EventSink,
) -> Result<(), DiscoveryError> {
    sink.load_started();
    let workspace = session.workspace().to_path_buf();
    let mut builder = TreeBuilder::new(&workspace);

    match config.strategy {
        ScanStrategy::JsonListing => {
            let exe = config.lua_test_exe(&workspace);
            scan_json_listing(&mut builder, &exe, &workspace, process);
        }
        ScanStrategy::HybridListing => {
            let exe = config.lua_test_exe(&workspace);
            scan_source_files(
                &mut builder,
                &workspace,
                config,
                registry,
                Some((exe.as_str(), process)),
            )?;
        }
        ScanStrategy::StaticRegex => {
            scan_source_files(&mut builder, &workspace, config, registry, None)?;
        }
    }

    let (root, index) = builder.finish();
    session.install(root, index);
    sink.load_finished(session.root());
    Ok(())
}

/// JSON listing: the runner enumerates every test case and every
/// group's source file in one invocation. Any failure here degrades to
/// an empty tree; the error is logged, never raised.
fn scan_json_listing(
    builder: &mut TreeBuilder,
    exe: &str,
    workspace: &Path,
    process: &dyn ProcessRunner,
) {
    let command = format!("{exe} --list-test-cases-json");
    let output = match process.execute(&command, workspace) {
        Ok(output) => output,
        Err(e) => {
            error!("failed to list test cases: {e}");
            return;
        }
    };
    // Line 0 is a runtime banner; the JSON payload spans the rest.
    let Some((_banner, payload)) = output.stdout.split_once('\n') else {
        error!("test case listing produced no payload");
        return;
    };
    let listing: Listing = match serde_json::from_str(payload) {
        Ok(listing) => listing,
        Err(e) => {
            error!("failed to parse test case listing: {e}");
            return;
        }
    };

    // Group files come back with a leading `@` source sigil.
    let group_files: HashMap<&str, &str> = listing
        .groups
        .iter()
        .map(|g| (g.name.as_str(), g.file.trim_start_matches('@')))
        .collect();

    for test in &listing.tests {
        let Some(file) = group_files.get(test.group.as_str()) else {
            warn!(group = %test.group, test = %test.name, "no source file known for group, skipping test");
            continue;
        };
        // Listing lines are 1-based; the tree stores 0-based lines.
        let line = test.line.and_then(|l| l.checked_sub(1));
        builder.add_test(Path::new(file), Some(&test.group), &test.name, line);
    }
}

/// Regex scan over candidate files, optionally expanding parametrized
/// groups through the runner's text listing mode.
fn scan_source_files(
    builder: &mut TreeBuilder,
    workspace: &Path,
    config: &Config,
    registry: &PatternRegistry,
    expansion: Option<(&str, &dyn ProcessRunner)>,
) -> Result<(), DiscoveryError> {
    let files = collect_test_files(workspace, registry)?;
    debug!(count = files.len(), "found candidate test files");

    for file in &files {
        let Some(content) = read_test_file(file, &config.test_encoding) else {
            continue;
        };
        scan_file(builder, file, &content, workspace, registry, expansion);
    }
    Ok(())
}

fn scan_file(
    builder: &mut TreeBuilder,
    file: &Path,
    content: &str,
    workspace: &Path,
    registry: &PatternRegistry,
    expansion: Option<(&str, &dyn ProcessRunner)>,
) {
    // variable → group name, local to this file
    let mut groups: HashMap<String, String> = HashMap::new();
    for caps in registry.group().captures_iter(content) {
        let var = caps[patterns::GROUP_VAR].to_string();
        let name = caps[patterns::GROUP_NAME].to_string();
        debug!(file = %file.display(), %var, %name, "found group");
        groups.insert(var, name);
    }

    for (i, line) in content.lines().enumerate() {
        let caps = registry
            .test()
            .captures(line)
            .or_else(|| registry.test_function().captures(line));
        let Some(caps) = caps else { continue };
        let method = &caps[patterns::TEST_NAME];
        let line_no = Some(i as u32);

        let group_var = caps
            .name(patterns::GROUP_VAR)
            .map(|m| m.as_str())
            .filter(|v| !v.is_empty());
        let Some(var) = group_var else {
            builder.add_test(file, None, method, line_no);
            continue;
        };
        let Some(group_name) = groups.get(var) else {
            warn!(file = %file.display(), var, method, "test bound to unknown group variable, skipping");
            continue;
        };

        let expanded = expansion
            .map(|(exe, process)| {
                expand_parametrized(exe, process, workspace, group_name, method)
            })
            .unwrap_or_default();

        if expanded.is_empty() {
            let label = format!("{group_name}.{method}");
            builder.add_test(file, Some(group_name), &label, line_no);
        } else {
            for case in expanded {
                // The instance's own group label is the case name minus
                // the trailing method segment.
                let group_label = case
                    .rsplit_once('.')
                    .map(|(head, _)| head.to_string())
                    .unwrap_or_else(|| group_name.clone());
                builder.add_test(file, Some(&group_label), &case, line_no);
            }
        }
    }
}

/// Text listing mode: enumerate the concrete instances of one
/// (possibly parametrized) test. The first and last stdout lines are
/// banner/summary, not case names.
fn expand_parametrized(
    exe: &str,
    process: &dyn ProcessRunner,
    workspace: &Path,
    group: &str,
    method: &str,
) -> Vec<String> {
    let filter = format!("{group}.*.{method}");
    let command = format!("{exe} --list-test-cases -p {}", quote(&filter));
    let output = match process.execute(&command, workspace) {
        Ok(output) => output,
        Err(e) => {
            warn!(group, method, "failed to expand parametrized test: {e}");
            return Vec::new();
        }
    };
    let lines: Vec<&str> = output.stdout.lines().collect();
    if lines.len() <= 2 {
        return Vec::new();
    }
    lines[1..lines.len() - 1]
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Walk the workspace for files matching the test glob. Dot-directories
/// (.git, .rocks) are skipped.
fn collect_test_files(
    workspace: &Path,
    registry: &PatternRegistry,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !workspace.is_dir() {
        return Err(DiscoveryError::NoWorkspace(workspace.to_path_buf()));
    }
    let mut files = Vec::new();
    walk(workspace, workspace, registry, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(
    dir: &Path,
    workspace: &Path,
    registry: &PatternRegistry,
    out: &mut Vec<PathBuf>,
) -> Result<(), DiscoveryError> {
    let entries = fs::read_dir(dir).map_err(|e| DiscoveryError::Walk {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| DiscoveryError::Walk {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if path.is_dir() {
            walk(&path, workspace, registry, out)?;
        } else {
            let relative = path.strip_prefix(workspace).unwrap_or(&path);
            if registry.is_test_file(relative) {
                out.push(path);
            }
        }
    }
    Ok(())
}

/// Read a candidate file. Only UTF-8 is read strictly; any other
/// configured encoding falls back to lossy conversion. Unreadable
/// files are logged and skipped.
fn read_test_file(file: &Path, encoding: &str) -> Option<String> {
    let result = if matches!(encoding, "utf8" | "utf-8") {
        fs::read_to_string(file)
    } else {
        fs::read(file).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    };
    match result {
        Ok(content) => Some(content),
        Err(e) => {
            warn!(file = %file.display(), "failed to read test file: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::StubRunner;

    #[test]
    fn json_listing_builds_three_level_hierarchy() {
        let stub = StubRunner::new();
        stub.push_stdout(concat!(
            "Tarantool 2.11.0\n",
            r#"{"tests":[{"name":"mygroup.test_add","group":"mygroup","method_name":"test_add","line":5}],"#,
            r#""groups":[{"name":"mygroup","file":"@test/my_test.lua"}]}"#,
        ));
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        scan_json_listing(&mut builder, "luatest", Path::new("/ws"), &stub);
        let (root, index) = builder.finish();

        let file_suite = &root.children()[0];
        assert_eq!(file_suite.id(), "test/my_test.lua");
        let group_suite = &file_suite.children()[0];
        assert_eq!(group_suite.label(), "mygroup");
        let test = &group_suite.children()[0];
        assert_eq!(test.label(), "mygroup.test_add");
        assert_eq!(
            index[&("mygroup".to_string(), "mygroup.test_add".to_string())],
            test.id()
        );
    }

    #[test]
    fn json_listing_skips_tests_with_unknown_group() {
        let stub = StubRunner::new();
        stub.push_stdout(concat!(
            "banner\n",
            r#"{"tests":[{"name":"ghost.test_x","group":"ghost"}],"groups":[]}"#,
        ));
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        scan_json_listing(&mut builder, "luatest", Path::new("/ws"), &stub);
        assert!(builder.is_empty());
    }

    #[test]
    fn malformed_listing_degrades_to_empty_tree() {
        let stub = StubRunner::new();
        stub.push_stdout("banner\nnot json at all\n");
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        scan_json_listing(&mut builder, "luatest", Path::new("/ws"), &stub);
        assert!(builder.is_empty());
    }

    #[test]
    fn parametrized_expansion_strips_banner_and_summary_lines() {
        let stub = StubRunner::new();
        stub.push_stdout("banner\nmygroup.p_1.test_add\nmygroup.p_2.test_add\nRan 0 tests\n");
        let cases = expand_parametrized(
            "luatest",
            &stub,
            Path::new("/ws"),
            "mygroup",
            "test_add",
        );
        assert_eq!(cases, vec!["mygroup.p_1.test_add", "mygroup.p_2.test_add"]);
        let commands = stub.commands.borrow();
        assert_eq!(commands[0], "luatest --list-test-cases -p 'mygroup.*.test_add'");
    }
}
