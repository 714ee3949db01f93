use std::{env, io, path::PathBuf};

use anyhow::Result;

/// Returns the application data directory, creating it if needed. Activity
/// log, config and log files all live under this path.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = application_base_path();

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

fn application_base_path() -> PathBuf {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            let mut path =
                PathBuf::from(env::var("APPDATA").expect("APPDATA should be present on Windows"));
            path.push("prodtrack");
            path
        } else {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .expect("Couldn't find neither XDG_STATE_HOME nor HOME");
            path.push("prodtrack");
            path
        }
    }
}
