//! Mapping of raw event paths to tracked directories

use monitor_core::layout;
use std::path::{Component, Path, PathBuf};

/// Resolves event paths to the first-level directory they belong to
#[derive(Debug, Clone)]
pub struct EventRouter {
    root: PathBuf,
}

impl EventRouter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` to its tracked directory key
    ///
    /// Returns `None` for paths outside the root, the root itself, paths
    /// that climb out through `..`, and hidden first-level entries such as
    /// the quarantine directory.
    pub fn route(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.root).ok()?;

        if relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return None;
        }

        let first = relative.components().find_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })?;

        if first.to_str().map_or(false, layout::is_hidden) {
            return None;
        }

        Some(self.root.join(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> EventRouter {
        EventRouter::new("/srv/monitor")
    }

    #[test]
    fn test_nested_paths_collapse_to_first_level() {
        let r = router();
        let key = Some(PathBuf::from("/srv/monitor/mods"));
        assert_eq!(r.route(Path::new("/srv/monitor/mods/plugin.dll")), key);
        assert_eq!(r.route(Path::new("/srv/monitor/mods/a/b/c/d.txt")), key);
        assert_eq!(r.route(Path::new("/srv/monitor/mods")), key);
    }

    #[test]
    fn test_outside_root_ignored() {
        let r = router();
        assert_eq!(r.route(Path::new("/srv/other/mods/file")), None);
        assert_eq!(r.route(Path::new("/srv/monitoring/mods/file")), None);
        assert_eq!(r.route(Path::new("relative/path")), None);
    }

    #[test]
    fn test_root_itself_ignored() {
        let r = router();
        assert_eq!(r.route(Path::new("/srv/monitor")), None);
        assert_eq!(r.route(Path::new("/srv/monitor/")), None);
    }

    #[test]
    fn test_escaping_paths_ignored() {
        let r = router();
        assert_eq!(r.route(Path::new("/srv/monitor/../etc/passwd")), None);
        assert_eq!(r.route(Path::new("/srv/monitor/mods/../../etc")), None);
    }

    #[test]
    fn test_hidden_first_level_ignored() {
        let r = router();
        assert_eq!(r.route(Path::new("/srv/monitor/.failed_uploads/mods-1.rwmod")), None);
        assert_eq!(r.route(Path::new("/srv/monitor/.git/HEAD")), None);
        // Hidden names deeper down still belong to their directory
        assert_eq!(
            r.route(Path::new("/srv/monitor/mods/.cache/x")),
            Some(PathBuf::from("/srv/monitor/mods"))
        );
    }
}
