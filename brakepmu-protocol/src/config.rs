//! Transport configuration

/// Default identity for outbound DTC reports
pub const DTC_REPORT_ID: u32 = 0x18FF_50E5;

/// Default identity for inbound diagnostic requests
pub const DIAG_REQUEST_ID: u32 = 0x18DB_33F1;

/// CAN identities used by the diagnostic transport
///
/// Stored as raw 29-bit values; the transport validates them when it is
/// created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportConfig {
    /// Extended identifier of every outbound report frame
    pub report_id: u32,
    /// Extended identifier accepted for inbound commands
    pub request_id: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            report_id: DTC_REPORT_ID,
            request_id: DIAG_REQUEST_ID,
        }
    }
}
