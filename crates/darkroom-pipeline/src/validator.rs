//! Format validator

use darkroom_core::{Error, Result};

/// Format-acceptance policy for uploaded object keys.
///
/// Pure predicate over the decoded key: the suffix must match one of the
/// accepted extensions, compared case-sensitively.
#[derive(Debug, Clone)]
pub struct FormatPolicy {
    extensions: Vec<String>,
}

impl FormatPolicy {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Accepted extensions, for rejection notifications
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Accept or reject a decoded object key
    pub fn validate(&self, key: &str) -> Result<()> {
        if self.extensions.iter().any(|ext| key.ends_with(ext.as_str())) {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat(key.to_string()))
        }
    }
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::new(
            darkroom_core::DEFAULT_ACCEPTED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}
