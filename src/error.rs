use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum MsoError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to allocate a {size} byte message buffer")]
    Allocation { size: usize },

    #[error("Malformed identity string '{identity}': {reason}")]
    ProtocolParse { identity: String, reason: String },

    #[error("Unsupported sample rate: {rate} Hz")]
    UnsupportedRate { rate: u64 },

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),
}

impl MsoError {
    /// Whether the error ends the current acquisition.
    ///
    /// Malformed single packets are skipped; everything else tears the
    /// acquisition down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidPacket(_))
    }
}

pub type Result<T> = std::result::Result<T, MsoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(MsoError::Transport(TransportError::NotOpen).is_fatal());
        assert!(MsoError::Allocation { size: 12 }.is_fatal());
        assert!(!MsoError::InvalidPacket("stray byte".into()).is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = MsoError::UnsupportedRate { rate: 3 };
        assert_eq!(err.to_string(), "Unsupported sample rate: 3 Hz");
    }
}
