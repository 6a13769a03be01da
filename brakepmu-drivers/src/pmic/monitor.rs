//! Rail monitor
//!
//! Polls the PMIC under-voltage flags and mirrors them into the DTC
//! registry: a flagged rail sets its DTC, a recovered rail clears it.

use brakepmu_core::dtc::{DtcCode, DtcError, DtcStore};
use brakepmu_hal::storage::NvStorage;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use super::mp5475gu::{BuckChannel, Mp5475gu, PmicError, StatusUv};

/// Rail monitor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorError {
    Pmic(PmicError),
    Dtc(DtcError),
}

impl From<PmicError> for MonitorError {
    fn from(e: PmicError) -> Self {
        MonitorError::Pmic(e)
    }
}

impl From<DtcError> for MonitorError {
    fn from(e: DtcError) -> Self {
        MonitorError::Dtc(e)
    }
}

const fn dtc_for(channel: BuckChannel) -> DtcCode {
    match channel {
        BuckChannel::A => DtcCode::BuckAUndervoltage,
        BuckChannel::B => DtcCode::BuckBUndervoltage,
        BuckChannel::C => DtcCode::BuckCUndervoltage,
        BuckChannel::D => DtcCode::BuckDUndervoltage,
    }
}

/// PMIC fault source
pub struct RailMonitor<I2C, D> {
    pmic: Mp5475gu<I2C, D>,
    last: Option<StatusUv>,
}

impl<I2C: I2c, D: DelayNs> RailMonitor<I2C, D> {
    pub fn new(pmic: Mp5475gu<I2C, D>) -> Self {
        Self { pmic, last: None }
    }

    /// Status seen by the last successful poll
    pub fn last_status(&self) -> Option<StatusUv> {
        self.last
    }

    pub fn pmic(&mut self) -> &mut Mp5475gu<I2C, D> {
        &mut self.pmic
    }

    /// Read STATUS_UV and apply it to `store`
    pub async fn poll<M, S>(&mut self, store: &DtcStore<M, S>) -> Result<StatusUv, MonitorError>
    where
        M: RawMutex,
        S: NvStorage,
    {
        let status = self.pmic.read_uv_status().await?;
        if self.last != Some(status) {
            info!("PMIC UV status {=u8:#x}", status.to_byte());
            self.last = Some(status);
        }
        Self::apply(status, store).await?;
        Ok(status)
    }

    /// Set or clear each rail's DTC from `status`
    ///
    /// Every rail is applied even if one fails; the first error is returned.
    pub async fn apply<M, S>(status: StatusUv, store: &DtcStore<M, S>) -> Result<(), DtcError>
    where
        M: RawMutex,
        S: NvStorage,
    {
        let mut first_error = None;
        for channel in BuckChannel::ALL {
            let code = dtc_for(channel);
            let result = if status.is_undervoltage(channel) {
                store.set(code).await
            } else {
                store.clear(code).await
            };
            if let Err(e) = result {
                first_error = first_error.or(Some(e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
