//! Session capture: device description, fingerprint, network snapshot and
//! the logger that ties them to fraud scoring

pub mod aggregator;
pub mod device;
pub mod fingerprint;
pub mod logger;

pub use aggregator::SessionInfoAggregator;
pub use fingerprint::{DigestError, DigestPrimitive, Fingerprinter, Sha256Digest};
pub use logger::{SessionError, SessionLogger};
