//! On-disk layout of a monitored root
//!
//! ```text
//! <monitor_dir>/
//!   mods/                     tracked directory
//!   saves/                    tracked directory
//!   mods-1718000000.rwmod     artifact awaiting delivery
//!   .failed_uploads/          quarantine
//!     saves-1717990000.rwmod
//! ```

use std::path::{Path, PathBuf};

/// Name of the quarantine directory under the monitored root
pub const QUARANTINE_DIR: &str = ".failed_uploads";

/// Default extension of snapshot artifacts
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "rwmod";

/// Build the artifact file name for a directory snapshot
///
/// Format: `<dir_name>-<unix_secs>.<extension>`
pub fn artifact_name(dir_name: &str, unix_secs: u64, extension: &str) -> String {
    format!("{}-{}.{}", dir_name, unix_secs, extension)
}

/// Path of the quarantine directory for a monitored root
pub fn quarantine_dir(monitor_dir: &Path) -> PathBuf {
    monitor_dir.join(QUARANTINE_DIR)
}

/// Hidden names (leading `.`) are never tracked
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("mods", 1718000000, "rwmod"), "mods-1718000000.rwmod");
        assert_eq!(artifact_name("my saves", 0, "tar.gz"), "my saves-0.tar.gz");
    }

    #[test]
    fn test_quarantine_dir() {
        let dir = quarantine_dir(Path::new("/srv/monitor"));
        assert_eq!(dir, PathBuf::from("/srv/monitor/.failed_uploads"));
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(QUARANTINE_DIR));
        assert!(is_hidden(".git"));
        assert!(!is_hidden("mods"));
        assert!(!is_hidden(""));
    }
}
