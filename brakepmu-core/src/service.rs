//! Diagnostic service
//!
//! Connects the transport's command mailbox to the DTC registry. The
//! board's diagnostic task calls [`DiagnosticService::poll`] periodically
//! or whenever the receive interrupt posts a command.
//!
//! | command    | action                                   |
//! |------------|------------------------------------------|
//! | `ClearDtc` | clear and persist the whole mask          |
//! | `ReadDtc`  | snapshot the mask and transmit it         |

use brakepmu_hal::can::CanController;
use brakepmu_hal::storage::NvStorage;
use brakepmu_protocol::frame::encode_mask_report;
use brakepmu_protocol::{DiagCommand, DiagTransport, TransmitError};
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::dtc::{DtcError, DtcStore};

/// What a poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceAction {
    /// No command was pending
    Idle,
    /// All DTCs were cleared
    Cleared,
    /// A report was queued for transmission
    ReportQueued,
    /// A report is still in flight; the read command stays pending
    ReportDeferred,
}

/// Failures while acting on a command
///
/// The command is consumed either way; the tester has to ask again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceError {
    /// Clearing the registry did not persist
    Dtc(DtcError),
    /// The report could not be started
    Transmit(TransmitError),
}

/// Command handler bound to one registry and one transport
///
/// `MS` guards the registry's storage and `MT` the transport state; they
/// may differ, for example a thread-mode mutex for storage and a
/// critical-section mutex for state shared with CAN interrupts.
pub struct DiagnosticService<'a, MS, MT, S, C, const N: usize>
where
    MS: RawMutex,
    MT: RawMutex,
    C: CanController,
{
    store: &'a DtcStore<MS, S>,
    transport: &'a DiagTransport<MT, C, N>,
}

impl<'a, MS, MT, S, C, const N: usize> DiagnosticService<'a, MS, MT, S, C, N>
where
    MS: RawMutex,
    MT: RawMutex,
    S: NvStorage,
    C: CanController,
{
    /// Create a service over shared registry and transport
    pub fn new(store: &'a DtcStore<MS, S>, transport: &'a DiagTransport<MT, C, N>) -> Self {
        Self { store, transport }
    }

    /// Handle the pending command, if any
    pub async fn poll(&self) -> Result<ServiceAction, ServiceError> {
        let Some(command) = self.transport.get_command() else {
            return Ok(ServiceAction::Idle);
        };

        match command {
            DiagCommand::ClearDtc => {
                let result = self.store.clear_all().await;
                self.transport.acknowledge_command(command);
                result.map_err(ServiceError::Dtc)?;
                info!("DTCs cleared by tester");
                Ok(ServiceAction::Cleared)
            }
            DiagCommand::ReadDtc => {
                let report = encode_mask_report(self.store.get_mask());
                match self.transport.transmit(&report) {
                    Ok(()) => {
                        self.transport.acknowledge_command(command);
                        Ok(ServiceAction::ReportQueued)
                    }
                    Err(TransmitError::Busy) => Ok(ServiceAction::ReportDeferred),
                    Err(e) => {
                        warn!("DTC report not sent: {:?}", e);
                        self.transport.acknowledge_command(command);
                        Err(ServiceError::Transmit(e))
                    }
                }
            }
        }
    }
}
