//! MP5475GU power management IC

mod monitor;
mod mp5475gu;

pub use monitor::{MonitorError, RailMonitor};
pub use mp5475gu::{reg, vout_code, BuckChannel, Mp5475gu, PmicError, StatusUv, I2C_ADDRESS};
