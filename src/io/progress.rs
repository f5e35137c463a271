//! Process-wide download progress hook.
//!
//! The CLI installs a callback to draw its progress line; everything else
//! leaves it unset and downloads stay silent apart from tracing.

use std::sync::{Mutex, OnceLock};

type ProgressFn = Box<dyn Fn(u64, u64) + Send + 'static>;

static DOWNLOAD_PROGRESS: OnceLock<Mutex<Option<ProgressFn>>> = OnceLock::new();

/// Install the download progress callback: `(bytes_done, bytes_total)`,
/// with `bytes_total == 0` when the server did not announce a length.
pub fn set_download_progress(cb: impl Fn(u64, u64) + Send + 'static) {
    let slot = DOWNLOAD_PROGRESS.get_or_init(|| Mutex::new(None));
    if let Ok(mut guard) = slot.lock() {
        *guard = Some(Box::new(cb));
    }
}

pub(crate) fn emit_download_progress(done: u64, total: u64) {
    if let Some(slot) = DOWNLOAD_PROGRESS.get() {
        if let Ok(guard) = slot.lock() {
            if let Some(cb) = guard.as_ref() {
                cb(done, total);
            }
        }
    }
}
