//! Filesystem checks that never follow symlinks.
//!
//! Audit discovery uses these so a link inside a plugin tree cannot pull in
//! files from elsewhere on disk.

use std::path::Path;

/// `true` for a regular file; `false` for symlinks and missing paths.
#[must_use]
pub(crate) fn is_regular_file(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|m| m.file_type().is_file())
}

/// `true` for a real directory; `false` for symlinks and missing paths.
#[must_use]
pub(crate) fn is_regular_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|m| m.file_type().is_dir())
}
