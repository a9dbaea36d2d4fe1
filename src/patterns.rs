// Pattern Registry: the compiled regexes and glob used to recognize
// test constructs in source text and runner output. User overrides are
// validated up front, both for regex syntax and for the named capture
// groups downstream code relies on.

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::config::Config;
use crate::errors::ConfigError;

/// Matches `local g = t.group("name")` and the single-quote variant.
const DEFAULT_GROUP_PATTERN: &str = r#"(?m)^\s*local\s+(?P<group_var>[A-Za-z_][A-Za-z0-9_]*)\s*=\s*t\.group\(\s*['"](?P<group_name>[^'"]+)['"]"#;

/// Matches `g.test_foo = function(...)`. The test prefix is matched
/// case-insensitively via the explicit character class.
const DEFAULT_TEST_PATTERN: &str = r"^\s*(?:(?P<group_var>[A-Za-z_][A-Za-z0-9_]*)\.)?(?P<test>[tT]est[A-Za-z0-9_]*)\s*=\s*function\s*\(";

/// Matches `function g.test_foo(...)`. Always applied as a second pass
/// after the declaration pattern, mirroring the two idioms luatest
/// accepts for test methods.
const FUNCTION_TEST_PATTERN: &str = r"^function\s*(?P<group_var>[A-Za-z_][A-Za-z0-9_]*)\.(?P<test>[tT]est[A-Za-z0-9_]*)\s*\([A-Za-z_,. ]*\)";

/// Matches the `<file>:<line>:<message> stack traceback:` shape of a
/// luatest failure message. The line capture is 1-based.
const DEFAULT_DECORATION_PATTERN: &str =
    r"(?s)\.lua:(?P<line>[1-9][0-9]*):(?P<message>.*)stack traceback:";

pub const GROUP_VAR: &str = "group_var";
pub const GROUP_NAME: &str = "group_name";
pub const TEST_NAME: &str = "test";
pub const LINE: &str = "line";
pub const MESSAGE: &str = "message";

#[derive(Debug, Clone)]
pub struct PatternRegistry {
    file_glob: GlobMatcher,
    group: Regex,
    test: Regex,
    test_function: Regex,
    decoration: Regex,
}

impl PatternRegistry {
    /// Compile the registry from config, using defaults for any empty
    /// override. An invalid override is a hard error.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let file_glob = compile_glob(&config.test_glob)?;
        let group = compile(
            "testGroupRegex",
            &config.test_group_regex,
            DEFAULT_GROUP_PATTERN,
            &[GROUP_VAR, GROUP_NAME],
        )?;
        let test = compile(
            "testRegex",
            &config.test_regex,
            DEFAULT_TEST_PATTERN,
            &[GROUP_VAR, TEST_NAME],
        )?;
        let test_function = compile("testRegex", "", FUNCTION_TEST_PATTERN, &[GROUP_VAR, TEST_NAME])?;
        let decoration = compile(
            "decorationRegex",
            &config.decoration_regex,
            DEFAULT_DECORATION_PATTERN,
            &[LINE, MESSAGE],
        )?;
        Ok(PatternRegistry {
            file_glob,
            group,
            test,
            test_function,
            decoration,
        })
    }

    /// Whether a workspace-relative path is a candidate test file.
    pub fn is_test_file(&self, relative_path: &std::path::Path) -> bool {
        self.file_glob.is_match(relative_path)
    }

    /// Group declarations: captures `group_var` and `group_name`.
    pub fn group(&self) -> &Regex {
        &self.group
    }

    /// Test declarations, assignment idiom: captures optional
    /// `group_var` and `test`.
    pub fn test(&self) -> &Regex {
        &self.test
    }

    /// Test declarations, `function g.test_x()` idiom.
    pub fn test_function(&self) -> &Regex {
        &self.test_function
    }

    /// Failure locations: captures 1-based `line` and `message`.
    pub fn decoration(&self) -> &Regex {
        &self.decoration
    }
}

fn compile(
    setting: &'static str,
    override_pattern: &str,
    default_pattern: &str,
    required_groups: &[&'static str],
) -> Result<Regex, ConfigError> {
    let pattern = if override_pattern.is_empty() {
        default_pattern
    } else {
        override_pattern
    };
    let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        setting,
        pattern: pattern.to_string(),
        source: e,
    })?;
    for group in required_groups {
        let found = regex
            .capture_names()
            .any(|name| name == Some(*group));
        if !found {
            return Err(ConfigError::MissingCaptureGroup {
                setting,
                pattern: pattern.to_string(),
                group,
            });
        }
    }
    Ok(regex)
}

fn compile_glob(glob: &str) -> Result<GlobMatcher, ConfigError> {
    Ok(Glob::new(glob)
        .map_err(|e| ConfigError::InvalidGlob {
            glob: glob.to_string(),
            source: e,
        })?
        .compile_matcher())
}
