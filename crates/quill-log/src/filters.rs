//! Filters for the library's own tracing output

use tracing::{Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Filter};

const LIBRARY_TARGET: &str = "quill_log";

fn is_library_target(target: &str) -> bool {
    target == LIBRARY_TARGET || target.starts_with("quill_log::")
}

/// Filter that keeps the library's own events out of a layer
///
/// Installed on layers writing into a [`RotatingFileWriter`]: the writer emits
/// events while holding its lock, and those must not come back into it.
///
/// [`RotatingFileWriter`]: crate::RotatingFileWriter
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryEventFilter;

impl LibraryEventFilter {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Filter<S> for LibraryEventFilter
where
    S: Subscriber,
{
    fn enabled(&self, meta: &Metadata<'_>, _ctx: &Context<'_, S>) -> bool {
        !is_library_target(meta.target())
    }

    fn callsite_enabled(&self, meta: &Metadata<'_>) -> tracing::subscriber::Interest {
        if is_library_target(meta.target()) {
            tracing::subscriber::Interest::never()
        } else {
            tracing::subscriber::Interest::sometimes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_target_matching() {
        assert!(is_library_target("quill_log"));
        assert!(is_library_target("quill_log::rotation"));
        assert!(!is_library_target("quill_logger"));
        assert!(!is_library_target("quill"));
        assert!(!is_library_target("my_app::quill_log"));
    }
}
