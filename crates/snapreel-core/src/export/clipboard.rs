use crate::ExportResult;

use std::path::Path;

/// System clipboard that can hold a file reference.
pub trait ClipboardService: Send + Sync {
    /// Replace the clipboard contents with a file-list entry for `path`.
    fn publish_file(&self, path: &Path) -> ExportResult<()>;
}
