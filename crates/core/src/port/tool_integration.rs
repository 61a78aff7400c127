// Tool Integration Capability
// Extension points for concrete tools: stage inputs, clean up, harvest outputs

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{InvokeError, Result};

/// Named output files harvested from a workspace (file name -> contents)
pub type Diagnostics = BTreeMap<String, String>;

/// Capability interface implemented by concrete tool integrations
///
/// Every method has a default, so an integration only overrides what its
/// tool needs. `workspace` is None when the invoker runs without one.
pub trait ToolIntegration: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str {
        "generic"
    }

    /// Prepare the workspace before launch (e.g. write input files).
    /// Runs after workspace setup and before requirement checks.
    fn stage_workspace(&self, _workspace: Option<&Path>) -> Result<()> {
        Ok(())
    }

    /// Tool-specific cleanup inside the workspace, run at teardown before
    /// the workspace itself is removed
    fn clean_workspace(&self, _workspace: Option<&Path>) -> Result<()> {
        Ok(())
    }

    /// Harvest generated files from the workspace
    ///
    /// # Errors
    /// - InvokeError::Unimplemented unless the integration supplies it
    fn extract_diagnostics(&self, _workspace: Option<&Path>) -> Result<Diagnostics> {
        Err(InvokeError::Unimplemented {
            capability: "extract_diagnostics",
            integration: self.name().to_string(),
        })
    }
}

/// Integration with no tool-specific behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericTool;

impl ToolIntegration for GenericTool {}
