pub mod alert;
pub mod environment;
pub mod session;

pub use alert::{AlertDetails, FraudAlert, RiskLevel};
pub use environment::ClientEnvironment;
pub use session::{
    DeviceFingerprint, DeviceInfo, DeviceType, GeolocationInfo, SessionAction, SessionSnapshot,
    UserSessionRecord, UNKNOWN_IP,
};
