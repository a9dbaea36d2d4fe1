// Output-plugin installation: drops a JSON output formatter into the
// luatest install tree and patches two runner-internal files so the
// listing mode can emit JSON. Idempotent: each patch is keyed on an
// exact source fragment and skipped once the patched marker is present.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::errors::PluginError;

/// The JSON output formatter, registered as `-o json`. Prints the
/// result envelope as a single JSON line after the runtime banner.
const JSON_OUTPUT_PLUGIN: &str = r#"local json = require('json')
local Output = require('luatest.output.generic'):new_class()

local res = {}

function Output.mt:start_suite()
    res = {
        started_on = self.result.start_time,
        tests = {},
    }
end

function Output.mt:end_test(node)
    local test = {
        name = node.name,
        message = node.message,
        group = node.group.name,
    }

    if node:is('xfail') then
        test.status = 'XFAIL'
    end

    if node:is('skip') then
        test.status = 'SKIP'
    end

    if node:is('success') then
        test.status = 'OK'
    end

    if node:is('fail')then
        test.status = 'FAIL'
    end

    if node:is('error')then
        test.status = 'ERROR'
    end

    table.insert(res.tests, test)
end

function Output.mt:end_suite()
    local tests = self.result.tests
    res.xfail = #tests.xfail
    res.xsuccess = #tests.xsuccess
    res.fail = #tests.fail
    res.error = #tests.error
    res.skip = #tests.skip
    res.all = #tests.all
    res.success = #tests.success
    res.duration = self.result.duration

    print(json.encode(res))
end

return Output
"#;

const PATCH_MARKER: &str = "-- Modified by luatest-explorer";

/// The `--list-test-cases` CLI handling as shipped by luatest, and the
/// replacement that adds `--list-test-cases-json`.
const LIST_FLAG_FRAGMENT: &str = "elseif arg == '--list-test-cases' then
            result.list_test_cases = true";

const LIST_FLAG_PATCHED: &str = "elseif arg == '--list-test-cases' then
            -- Modified by luatest-explorer
            result.list_test_cases = true
        elseif arg == '--list-test-cases-json' then
            result.list_test_cases_json = true";

const LIST_HANDLER_FRAGMENT: &str = "-- Handle the --list-test-case CLI option.
    if self.list_test_cases then
        for _, test_case in ipairs(filtered_list[true]) do
            print(test_case.name)
        end
        return 0
    end";

const LIST_HANDLER_PATCHED: &str = r#"-- Handle the --list-test-case CLI option.
    -- Modified by luatest-explorer
    if self.list_test_cases then
        for _, test_case in ipairs(filtered_list[true]) do
            print(test_case.name)
        end
        return 0
    end

    -- Handle the --list-test-cases-json CLI option.
    if self.list_test_cases_json then
        print('{\n"tests":[')
        local tests_info = nil
        for _, test in pairs(self:find_tests()) do
            local test_info = ('{"name":"%s", "group":"%s", "method_name":"%s", "line":%s}'):format(test.name:gsub('"', '\\"'), test.group.name:gsub('"', '\\"'), test.method_name, test.line)
            if tests_info then
                tests_info = tests_info .. ',\n' .. test_info
            else
                tests_info = test_info
            end
        end
        print(tests_info)
        print("],")

        print('"groups":[')
        local groups_info = nil
        for _, group in pairs(self.groups) do
            local group_info = ('{"name":"%s", "file":"%s"}'):format(group.name:gsub('"', '\\"'), group.file)
            if groups_info then
                groups_info = groups_info .. ',\n' .. group_info
            else
                groups_info = group_info
            end
        end
        print(groups_info)
        print("]\n}")
        return 0
    end"#;

/// Group constructor patch: records each group's source file so the
/// JSON listing can map groups back to files.
const GROUP_FILE_FRAGMENT: &str = "end
    self.name = name";

const GROUP_FILE_PATCHED: &str = r#"end
    -- Modified by luatest-explorer
    self.name = name

    local pattern = '.*/test/(.+)_test%.lua'
    local info = assert(
        find_closest_matching_frame(pattern),
        "Can't derive test name from file name (it should match '.*/test/.*_test.lua')"
    )
    local test_filename = info.source
    self.file = test_filename"#;

/// Install the JSON output plugin and patch the runner for JSON
/// listing support. Safe to call before every run.
pub fn install_plugins(luatest_dir: &Path) -> Result<(), PluginError> {
    if !luatest_dir.is_dir() {
        return Err(PluginError::NoLuatestDir(luatest_dir.to_path_buf()));
    }

    let output_file = luatest_dir.join("output").join("json.lua");
    info!(path = %output_file.display(), "installing JSON output plugin");
    write_file(&output_file, JSON_OUTPUT_PLUGIN)?;

    let runner_file = luatest_dir.join("runner.lua");
    patch_file(&runner_file, LIST_FLAG_FRAGMENT, LIST_FLAG_PATCHED)?;
    patch_file(&runner_file, LIST_HANDLER_FRAGMENT, LIST_HANDLER_PATCHED)?;

    let group_file = luatest_dir.join("group.lua");
    patch_file(&group_file, GROUP_FILE_FRAGMENT, GROUP_FILE_PATCHED)?;

    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<(), PluginError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
    }
    fs::write(path, content).map_err(|e| io_error(path, e))
}

/// Replace `fragment` with `patched` in one file. A file already
/// carrying the patch marker is left alone; a file with neither the
/// fragment nor the marker can't be patched safely.
fn patch_file(path: &Path, fragment: &str, patched: &str) -> Result<(), PluginError> {
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    if content.contains(patched) || (content.contains(PATCH_MARKER) && !content.contains(fragment))
    {
        debug!(path = %path.display(), "patch already applied");
        return Ok(());
    }
    if !content.contains(fragment) {
        return Err(PluginError::FragmentNotFound {
            path: path.to_path_buf(),
        });
    }
    let updated = content.replacen(fragment, patched, 1);
    fs::write(path, updated).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> PluginError {
    PluginError::Io {
        path: path.to_path_buf(),
        source,
    }
}
