//! Error types for the value model

/// Errors raised while encoding or decoding persisted values
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// A persisted cache entry could not be decoded
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// Which shape was being decoded
        what: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// Which shape was being encoded
        what: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// JSON `null` or a non-rule array has no setting representation
    #[error("unrepresentable setting value: {0}")]
    Unrepresentable(String),
}

impl ValueError {
    /// Create decode error
    pub fn decode(what: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { what, source }
    }

    /// Create encode error
    pub fn encode(what: &'static str, source: serde_json::Error) -> Self {
        Self::Encode { what, source }
    }
}
