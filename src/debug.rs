// Debug-session plumbing. The launch itself belongs to the host; this
// module only resolves a node into a launch request and validates the
// preconditions the host can't check.

use std::path::{Path, PathBuf};

use tracing::error;

use crate::errors::RunError;
use crate::tree::DiscoverySession;

/// Everything a host debugger needs to launch one test file under the
/// runner executable.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugRequest {
    pub executable: String,
    pub cwd: PathBuf,
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Collaborator interface: given a workspace and a prepared request,
/// start a native debug session.
pub trait DebugLauncher {
    fn start_debug(&mut self, workspace: &Path, request: DebugRequest) -> Result<(), RunError>;
}

/// Resolve a node id into a debug request. Every failure here is
/// logged and returned; the caller abandons the request rather than
/// surfacing an exception to the editor host.
pub fn prepare_debug_request(
    session: &DiscoverySession,
    id: &str,
    executable: &str,
) -> Result<DebugRequest, RunError> {
    if !session.is_loaded() {
        error!(id, "no tests loaded, cannot debug");
        return Err(RunError::TreeNotLoaded);
    }
    let Some(node) = session.find_node(id) else {
        error!(id, "test not found");
        return Err(RunError::NodeNotFound(id.to_string()));
    };
    let Some(file) = node.file() else {
        error!(id, "test does not specify a source file");
        return Err(RunError::NodeWithoutFile(id.to_string()));
    };
    if file.is_absolute() && !file.starts_with(session.workspace()) {
        error!(file = %file.display(), "test file is outside the workspace");
        return Err(RunError::FileOutsideWorkspace(file.to_path_buf()));
    }
    Ok(DebugRequest {
        executable: executable.to_string(),
        cwd: session.workspace().to_path_buf(),
        program: file.to_path_buf(),
        args: vec![node.label().to_string()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;

    fn loaded_session() -> DiscoverySession {
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        builder.add_test(Path::new("/ws/a_test.lua"), Some("g"), "g.test_a", Some(3));
        let (root, index) = builder.finish();
        let mut session = DiscoverySession::new(Path::new("/ws"));
        session.install(root, index);
        session
    }

    #[test]
    fn request_carries_file_cwd_and_label() {
        let session = loaded_session();
        let request = prepare_debug_request(&session, "1", "luatest").unwrap();
        assert_eq!(request.program, Path::new("/ws/a_test.lua"));
        assert_eq!(request.cwd, Path::new("/ws"));
        assert_eq!(request.args, vec!["g.test_a".to_string()]);
    }

    #[test]
    fn unloaded_session_is_rejected() {
        let session = DiscoverySession::new(Path::new("/ws"));
        assert!(matches!(
            prepare_debug_request(&session, "1", "luatest"),
            Err(RunError::TreeNotLoaded)
        ));
    }

    #[test]
    fn unknown_node_is_rejected() {
        let session = loaded_session();
        assert!(matches!(
            prepare_debug_request(&session, "99", "luatest"),
            Err(RunError::NodeNotFound(_))
        ));
    }

    #[test]
    fn suite_without_file_is_rejected() {
        let session = loaded_session();
        assert!(matches!(
            prepare_debug_request(&session, "root", "luatest"),
            Err(RunError::NodeWithoutFile(_))
        ));
    }
}
