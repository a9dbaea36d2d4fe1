// Configuration surface: every setting has a documented default so a
// bare workspace works out of the box. Pattern overrides are kept as
// raw strings here; compilation and validation happen in the Pattern
// Registry so a bad override fails fast instead of falling back.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Which scanner builds the test tree. Variants are ordered from least
/// to most capable; all three produce the same tree and index shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Pure regex over source text. No parametrized expansion; works
    /// without a runner executable.
    StaticRegex,
    /// Regex scan plus `--list-test-cases` text listing per group to
    /// expand parametrized instances.
    HybridListing,
    /// Single `--list-test-cases-json` invocation; the runner
    /// introspects the whole project itself.
    #[default]
    JsonListing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Path to the luatest executable. `${workspaceFolder}` and
    /// `${workspaceRoot}` are substituted before use.
    pub lua_test_exe: String,
    /// Directory of the luatest installation, for plugin installation.
    pub luatest_dir: String,
    /// Glob selecting candidate test files, relative to the workspace.
    pub test_glob: String,
    /// Override for the group-declaration pattern. Empty means default.
    pub test_group_regex: String,
    /// Override for the test-declaration pattern. Empty means default.
    pub test_regex: String,
    /// Override for the failure-location pattern. Empty means default.
    pub decoration_regex: String,
    /// Text encoding of test files. Only `utf8` / `utf-8` are honored;
    /// anything else is read lossily.
    pub test_encoding: String,
    /// Extra debug logging.
    pub debug: bool,
    pub strategy: ScanStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lua_test_exe: ".rocks/bin/luatest".to_string(),
            luatest_dir: "${workspaceRoot}/.rocks/share/tarantool/luatest".to_string(),
            test_glob: "**/*[tT]est*.lua".to_string(),
            test_group_regex: String::new(),
            test_regex: String::new(),
            decoration_regex: String::new(),
            test_encoding: "utf8".to_string(),
            debug: false,
            strategy: ScanStrategy::JsonListing,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The runner executable path with workspace variables substituted.
    pub fn lua_test_exe(&self, workspace: &Path) -> String {
        substitute_workspace(&self.lua_test_exe, workspace)
    }

    /// The luatest install directory with workspace variables substituted.
    pub fn luatest_dir(&self, workspace: &Path) -> String {
        substitute_workspace(&self.luatest_dir, workspace)
    }
}

fn substitute_workspace(s: &str, workspace: &Path) -> String {
    let folder = workspace.to_string_lossy();
    s.replace("${workspaceRoot}", &folder)
        .replace("${workspaceFolder}", &folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exe_is_rocks_bin() {
        let config = Config::default();
        assert_eq!(config.lua_test_exe(Path::new("/ws")), ".rocks/bin/luatest");
    }

    #[test]
    fn workspace_variables_are_substituted() {
        let config = Config {
            lua_test_exe: "${workspaceFolder}/.rocks/bin/luatest".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.lua_test_exe(Path::new("/home/me/proj")),
            "/home/me/proj/.rocks/bin/luatest"
        );
        assert_eq!(
            config.luatest_dir(Path::new("/home/me/proj")),
            "/home/me/proj/.rocks/share/tarantool/luatest"
        );
    }

    #[test]
    fn empty_overrides_parse_from_json() {
        let config: Config = serde_json::from_str(r#"{"testGlob":"spec/**/*.lua"}"#).unwrap();
        assert_eq!(config.test_glob, "spec/**/*.lua");
        assert_eq!(config.strategy, ScanStrategy::JsonListing);
    }
}
