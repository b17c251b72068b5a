//! Empty-slot representation
//!
//! A slot shows either the placeholder image or the URL of a blob. The
//! [`DisplayRef`] enum makes the "never null, never empty" rule structural.

use std::fmt;
use url::Url;

/// Inert "No Image" SVG shown in empty slots
pub const PLACEHOLDER_SRC: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMTAwIiBoZWlnaHQ9IjEwMCIgdmlld0JveD0iMCAwIDEwMCAxMDAiIHhtbG5zPSJodHRwOi8vd3d3LnczLm9yZy8yMDAwL3N2ZyI+PHJlY3Qgd2lkdGg9IjEwMCIgaGVpZ2h0PSIxMDAiIGZpbGw9IiNlZWVlZWUiIC8+PHRleHQgeD0iNTAiIHk9IjU1IiBmb250LXNpemU9IjE2IiBmb250LWZhbWlseT0iU2VnZSBTaWduIiB0ZXh0LWFuY2hvcj0ibWlkZGxlIiBmaWxsPSIjOTk5OTk5Ij5ObyBJbWFnZTwvdGV4dD48L3N2Zz4=";

/// Image reference displayed by a slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DisplayRef {
    /// No image
    #[default]
    Placeholder,
    /// Resolved blob URL
    Blob(Url),
}

impl DisplayRef {
    /// Check if this is the placeholder
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// Blob URL, if any
    #[inline]
    #[must_use]
    pub fn blob_url(&self) -> Option<&Url> {
        match self {
            Self::Placeholder => None,
            Self::Blob(url) => Some(url),
        }
    }

    /// Source to render
    #[inline]
    #[must_use]
    pub fn src(&self) -> &str {
        match self {
            Self::Placeholder => PLACEHOLDER_SRC,
            Self::Blob(url) => url.as_str(),
        }
    }
}

impl fmt::Display for DisplayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.src())
    }
}
