//! Executable resolution.
//!
//! `start` must fail fast, with the attempted path in the error, when the
//! configured executable cannot be found or executed. A bare name is
//! searched through the PATH of the injected environment provider; an
//! explicit path is checked directly. The two failures carry distinct
//! messages: a missing bare name usually means the server is not
//! installed or the environment is not activated, while a bad explicit
//! path is a configuration mistake.

use std::path::{Path, PathBuf};

use harness_common::{EnvironmentProvider, Error, Result};

/// Resolves the configured executable to a spawnable path.
pub fn resolve_executable(executable: &str, env: &dyn EnvironmentProvider) -> Result<PathBuf> {
    if executable.is_empty() {
        return Err(Error::executable_not_found(executable));
    }

    let candidate = Path::new(executable);
    if candidate.components().count() > 1 {
        if is_executable(candidate) {
            return Ok(candidate.to_path_buf());
        }
        return Err(Error::executable_not_found(executable));
    }

    let search_path = env.var("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&search_path) {
        let full = dir.join(executable);
        if is_executable(&full) {
            return Ok(full);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{executable}.exe"));
            if is_executable(&exe) {
                return Ok(exe);
            }
        }
    }

    Err(Error::executable_not_found_in_path(executable))
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        path.is_file()
            && path
                .metadata()
                .map(|meta| meta.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        path.is_file()
    }
}
