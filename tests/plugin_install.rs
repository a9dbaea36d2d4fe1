// tests/plugin_install.rs
//
// Plugin installation into a (fake) luatest tree: the JSON output
// formatter is written, the runner and group files are patched by
// exact substring replacement, and the whole step is idempotent.

mod common;

use std::fs;

use common::TestDir;

use luatest_explorer::errors::PluginError;
use luatest_explorer::plugins::install_plugins;

const RUNNER_LUA: &str = "\
local Runner = {}

function Runner.parse_args(args)
    for _, arg in ipairs(args) do
        if arg == '-v' then
            result.verbose = true
        elseif arg == '--list-test-cases' then
            result.list_test_cases = true
        end
    end
end

function Runner.mt:run()
    -- Handle the --list-test-case CLI option.
    if self.list_test_cases then
        for _, test_case in ipairs(filtered_list[true]) do
            print(test_case.name)
        end
        return 0
    end
end

return Runner
";

const GROUP_LUA: &str = "\
local Group = {}

function Group.mt:initialize(name)
    if not name then
        error('group name is required')
    end
    self.name = name
end

return Group
";

fn fake_luatest_dir(dir: &TestDir) -> std::path::PathBuf {
    dir.write("luatest/runner.lua", RUNNER_LUA);
    dir.write("luatest/group.lua", GROUP_LUA);
    dir.path().join("luatest")
}

#[test]
fn installs_output_plugin_and_patches_runner() {
    let dir = TestDir::new();
    let luatest = fake_luatest_dir(&dir);

    install_plugins(&luatest).unwrap();

    let plugin = fs::read_to_string(luatest.join("output/json.lua")).unwrap();
    assert!(plugin.contains("json.encode(res)"));

    let runner = fs::read_to_string(luatest.join("runner.lua")).unwrap();
    assert!(runner.contains("--list-test-cases-json"));
    assert!(runner.contains("list_test_cases_json"));

    let group = fs::read_to_string(luatest.join("group.lua")).unwrap();
    assert!(group.contains("self.file = test_filename"));

    dir.pass();
}

#[test]
fn second_install_changes_nothing() {
    let dir = TestDir::new();
    let luatest = fake_luatest_dir(&dir);

    install_plugins(&luatest).unwrap();
    let runner_once = fs::read_to_string(luatest.join("runner.lua")).unwrap();
    let group_once = fs::read_to_string(luatest.join("group.lua")).unwrap();

    install_plugins(&luatest).unwrap();
    assert_eq!(
        fs::read_to_string(luatest.join("runner.lua")).unwrap(),
        runner_once
    );
    assert_eq!(
        fs::read_to_string(luatest.join("group.lua")).unwrap(),
        group_once
    );

    dir.pass();
}

#[test]
fn missing_install_directory_is_an_error() {
    let dir = TestDir::new();
    let missing = dir.path().join("no-such-dir");
    assert!(matches!(
        install_plugins(&missing),
        Err(PluginError::NoLuatestDir(_))
    ));
    dir.pass();
}

#[test]
fn unrecognized_runner_source_is_an_error() {
    let dir = TestDir::new();
    dir.write("luatest/runner.lua", "-- a different luatest version\n");
    dir.write("luatest/group.lua", GROUP_LUA);

    let result = install_plugins(&dir.path().join("luatest"));
    assert!(matches!(
        result,
        Err(PluginError::FragmentNotFound { .. })
    ));
    dir.pass();
}
