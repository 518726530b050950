//! Layout engine configuration
//!
//! The engine needs very little configuration: payload bounds and how the
//! decoder reports values it cannot interpret. Everything else is expressed
//! through the layout API itself.

use serde::{Deserialize, Serialize};

/// Configuration carried by every [`Message`](crate::Message)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Largest payload size in bytes accepted by `Message::new` and `resize`
    #[serde(default = "default_max_size_byte")]
    pub max_size_byte: usize,

    /// Value reported when an enum signal decodes to an index with no name
    #[serde(default)]
    pub unknown_enum_label: String,

    /// Skip the whole decode when the payload is shorter than the layout
    #[serde(default)]
    pub strict_payload_length: bool,
}

fn default_max_size_byte() -> usize {
    8
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_size_byte: default_max_size_byte(),
            unknown_enum_label: String::new(),
            strict_payload_length: false,
        }
    }
}

impl LayoutConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the largest accepted payload size
    pub fn with_max_size_byte(mut self, max_size_byte: usize) -> Self {
        self.max_size_byte = max_size_byte;
        self
    }

    /// Builder method: set the label used for unknown enum values
    pub fn with_unknown_enum_label(mut self, label: impl Into<String>) -> Self {
        self.unknown_enum_label = label.into();
        self
    }

    /// Builder method: require full-length payloads when decoding
    pub fn with_strict_payload_length(mut self, strict: bool) -> Self {
        self.strict_payload_length = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LayoutConfig::new();
        assert_eq!(config.max_size_byte, 8);
        assert!(config.unknown_enum_label.is_empty());
        assert!(!config.strict_payload_length);
    }

    #[test]
    fn test_builder_pattern() {
        let config = LayoutConfig::new()
            .with_max_size_byte(64)
            .with_unknown_enum_label("unknown")
            .with_strict_payload_length(true);

        assert_eq!(config.max_size_byte, 64);
        assert_eq!(config.unknown_enum_label, "unknown");
        assert!(config.strict_payload_length);
    }
}
