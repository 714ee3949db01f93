use std::path::PathBuf;

/// Maps the cli executable's path to the sibling daemon binary.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("prodtrack-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}
