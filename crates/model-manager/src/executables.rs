//! Execute permissions for container scripts
//!
//! Scripts unpacked from the template are not necessarily executable. They
//! must be marked before anything tries to run them.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::debug;

use common::models::{
    BUILD_AND_PUSH_SCRIPT, PREDICT_SCRIPT, SERVE_LOCAL_SCRIPT, SERVE_SCRIPT, TRAIN_LOCAL_SCRIPT, TRAIN_SCRIPT,
};

/// Owner execute bit
#[cfg(unix)]
const OWNER_EXECUTE: u32 = 0o100;

/// Adds the owner execute bit to every path, stopping at the first failure
///
/// Paths marked before a failure stay marked.
pub fn mark_executable<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        set_owner_execute(path).with_context(|| format!("making {} executable", path.display()))?;
        debug!("Marked {} executable", path.display());
    }

    Ok(())
}

#[cfg(unix)]
fn set_owner_execute(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | OWNER_EXECUTE);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn set_owner_execute(path: &Path) -> std::io::Result<()> {
    // No execute bit outside unix; only check the file is there.
    std::fs::metadata(path).map(|_| ())
}

/// Scripts a push or build needs: the container's build script and the
/// model's train and serve entrypoints
pub fn build_scripts(container_dir: &Path, model_name: &str) -> Vec<PathBuf> {
    let model_dir = container_dir.join(model_name);
    vec![
        container_dir.join(BUILD_AND_PUSH_SCRIPT),
        model_dir.join(TRAIN_SCRIPT),
        model_dir.join(SERVE_SCRIPT),
    ]
}

/// Scripts in a container's `local_test` directory
pub fn local_test_scripts(local_test_dir: &Path) -> Vec<PathBuf> {
    [PREDICT_SCRIPT, SERVE_LOCAL_SCRIPT, TRAIN_LOCAL_SCRIPT]
        .iter()
        .map(|script| local_test_dir.join(script))
        .collect()
}
