//! Error types for the queue subsystem

/// Queue registry and submission errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No queue registered under name
    #[error("queue not registered: {0}")]
    NotRegistered(String),

    /// A queue with this name already exists
    #[error("queue already registered: {0}")]
    AlreadyRegistered(String),

    /// Submission outside a tokio runtime
    #[error("queue {0} cannot start: no async runtime")]
    NoRuntime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_error_display() {
        let err = QueueError::NotRegistered("settings".to_string());
        assert_eq!(err.to_string(), "queue not registered: settings");
    }
}
