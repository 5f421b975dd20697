//! Built-in tool plugins
//!
//! Plugins implement the [`ToolPlugin`] contract and are registered into the
//! local provider's table at startup via [`builtin_plugins`].

mod fs;
mod shell;
mod sleep;
pub mod traits;

pub use fs::FsPlugin;
pub use shell::ShellPlugin;
pub use sleep::SleepPlugin;
pub use traits::ToolPlugin;

use std::path::PathBuf;
use std::sync::Arc;

/// The default plugin table: file ops, shell/process ops, and sleep.
///
/// `workspace` confines the file plugin's reachable paths.
pub fn builtin_plugins(workspace: PathBuf) -> Vec<Arc<dyn ToolPlugin>> {
    vec![
        Arc::new(FsPlugin::new(workspace)),
        Arc::new(ShellPlugin::new()),
        Arc::new(SleepPlugin::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_no_duplicate_tool_names() {
        let plugins = builtin_plugins(PathBuf::from("."));
        let mut names = Vec::new();
        for plugin in &plugins {
            for tool in plugin.tools() {
                assert!(!names.contains(&tool.name), "duplicate: {}", tool.name);
                names.push(tool.name);
            }
        }
        assert!(names.contains(&"list_directory".to_string()));
        assert!(names.contains(&"execute_shell".to_string()));
        assert!(names.contains(&"sleep".to_string()));
    }
}
