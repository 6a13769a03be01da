//! Burst framing for outbound reports
//!
//! A report is split into bursts of at most [`MAX_BURST_LEN`] bytes, one
//! per CAN frame. Only the final burst may be shorter.

/// Maximum data bytes in one classic CAN frame
pub const MAX_BURST_LEN: usize = 8;

/// Length in bytes of an encoded DTC mask report
pub const MASK_REPORT_LEN: usize = 4;

/// Number of bursts needed to carry `len` bytes
pub fn burst_count(len: usize) -> usize {
    len.div_ceil(MAX_BURST_LEN)
}

/// The burst starting at `offset`, or an empty slice past the end
pub fn burst_at(data: &[u8], offset: usize) -> &[u8] {
    if offset >= data.len() {
        return &[];
    }
    let end = data.len().min(offset + MAX_BURST_LEN);
    &data[offset..end]
}

/// Encode a DTC mask as a report payload (little-endian)
pub fn encode_mask_report(mask: u32) -> [u8; MASK_REPORT_LEN] {
    mask.to_le_bytes()
}

/// Decode a report payload back into a DTC mask
pub fn decode_mask_report(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; MASK_REPORT_LEN] = payload.get(..MASK_REPORT_LEN)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
