//! File system watching for rwmod-monitor
//!
//! This crate provides:
//! - Native recursive watching of first-level directories
//! - Routing of raw event paths to tracked directories
//! - Per-directory debouncing (quiet windows)
//! - Startup reconciliation (initial snapshots)

pub mod debounce;
pub mod dispatch;
pub mod native;
pub mod reconcile;
pub mod route;

pub use debounce::DebounceScheduler;
pub use dispatch::{Dispatcher, RearmPolicy};
pub use native::{DirectoryWatcher, WatchError};
pub use route::EventRouter;

use notify::event::ModifyKind;

/// File system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path that changed
    pub path: std::path::PathBuf,
    /// Type of change
    pub kind: EventKind,
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created
    Create,
    /// File modified
    Modify,
    /// File deleted
    Delete,
    /// File renamed
    Rename,
}

impl EventKind {
    /// Translate a notify event kind
    ///
    /// Access, metadata-only (chmod, touch, xattr) and unclassified events
    /// map to `None` and never restart a quiet window.
    pub fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        match kind {
            notify::EventKind::Create(_) => Some(EventKind::Create),
            notify::EventKind::Modify(ModifyKind::Name(_)) => Some(EventKind::Rename),
            notify::EventKind::Modify(ModifyKind::Metadata(_)) => None,
            notify::EventKind::Modify(_) => Some(EventKind::Modify),
            notify::EventKind::Remove(_) => Some(EventKind::Delete),
            notify::EventKind::Access(_) | notify::EventKind::Any | notify::EventKind::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    #[test]
    fn test_event_kind_translation() {
        assert_eq!(
            EventKind::from_notify(&notify::EventKind::Create(CreateKind::File)),
            Some(EventKind::Create)
        );
        assert_eq!(
            EventKind::from_notify(&notify::EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(EventKind::Modify)
        );
        assert_eq!(
            EventKind::from_notify(&notify::EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(EventKind::Rename)
        );
        assert_eq!(
            EventKind::from_notify(&notify::EventKind::Remove(RemoveKind::File)),
            Some(EventKind::Delete)
        );
        assert_eq!(
            EventKind::from_notify(&notify::EventKind::Access(AccessKind::Any)),
            None
        );
        assert_eq!(
            EventKind::from_notify(&notify::EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            None
        );
        assert_eq!(
            EventKind::from_notify(&notify::EventKind::Modify(ModifyKind::Any)),
            Some(EventKind::Modify)
        );
    }
}
