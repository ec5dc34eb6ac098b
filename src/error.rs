//! Error taxonomy shared by the transport layer, protocol engines, and
//! dispatcher. Variants group by kind rather than by protocol, mirroring
//! the taxonomy the design settled on: transport failures, wire-framing
//! mismatches, protocol-semantic rejections, registry lookup failures, and
//! policy refusals (the Source double-challenge case).

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("framing error: {0}")]
    Framing(String),

    #[error("{0}")]
    Semantic(String),

    #[error("{0}")]
    Lookup(String),

    #[error("{0}")]
    Policy(String),
}

impl Error {
    pub fn framing(message: impl Into<String>) -> Self {
        Error::Framing(message.into())
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Error::Semantic(message.into())
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Error::Lookup(message.into())
    }

    pub fn policy(message: impl Into<String>) -> Self {
        Error::Policy(message.into())
    }
}
