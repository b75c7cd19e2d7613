pub mod alert;
pub mod session;

pub use alert::{AlertSeverity, SecurityAlert, ALERT_TYPE_LOGIN_ANOMALY};
pub use session::{DeviceInfo, GeoInfo, LoginEvent, SessionRecord};
