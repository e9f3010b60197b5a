use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by callers that only care whether a failure
/// came from bad caller-supplied input or from the persistence layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    Storage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid base58 symbol {symbol:?} at position {position}")]
    InvalidBase58Symbol { symbol: char, position: usize },
    #[error("invalid base58 block length {0}")]
    InvalidBlockLength(usize),
    #[error("base58 block overflow")]
    Base58Overflow,
    #[error("invalid hex in {label}: {source}")]
    InvalidHex {
        label: &'static str,
        #[source]
        source: hex::FromHexError,
    },
    #[error("{label} must be {expected} bytes, got {got}")]
    InvalidLength {
        label: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{0} is not a canonical scalar")]
    NonCanonicalScalar(&'static str),
    #[error("{0} is not a valid curve point")]
    InvalidPoint(&'static str),
    #[error("decoded address is {0} bytes, need at least 33")]
    TruncatedAddress(usize),
    #[error("address checksum mismatch")]
    ChecksumMismatch,
    #[error("unknown address network byte 0x{0:02x}")]
    UnknownNetworkByte(u8),
    #[error("{label} index {value} is outside the u32 range")]
    IndexOutOfRange { label: &'static str, value: u64 },
    #[error("invalid XMR amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("minor index cursor exhausted for major index {0}")]
    CursorExhausted(u32),
    #[error("cursor storage: {0}")]
    Storage(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::MalformedInput,
        }
    }

    pub(crate) fn hex(label: &'static str, source: hex::FromHexError) -> Self {
        Error::InvalidHex { label, source }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
