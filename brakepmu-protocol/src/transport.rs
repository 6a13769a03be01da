//! Diagnostic transport
//!
//! Owns the CAN controller and two independent pieces of state:
//!
//! - the outbound Transmission Job, advanced one burst per
//!   transmit-complete interrupt (`Idle → Sending → Idle`)
//! - the inbound command mailbox, written by the receive interrupt
//!
//! Task code calls [`DiagTransport::transmit`]; the board's interrupt
//! handlers call [`DiagTransport::on_transmit_complete`] and
//! [`DiagTransport::on_frame_received`]. Job state lives behind a
//! blocking mutex, so the busy check and the job start happen in one
//! critical section and an interrupt can never observe a half-started job.

use core::cell::RefCell;

use brakepmu_hal::can::{CanController, IdFilter};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_can::{ExtendedId, Frame, Id};
use heapless::Vec;

use crate::command::DiagCommand;
use crate::config::TransportConfig;
use crate::frame;
use crate::mailbox::CommandMailbox;

/// Default capacity of the job buffer in bytes
pub const DEFAULT_JOB_CAPACITY: usize = 64;

/// Reasons a transmit request is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitError {
    /// A Transmission Job is already active
    Busy,
    /// Empty payload, or payload larger than the job buffer
    InvalidArgument,
    /// The controller refused the burst
    Device,
}

/// Errors while setting up the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Configured identifier does not fit in 29 bits
    InvalidIdentity,
    /// Filter setup or controller start failed
    Controller,
}

/// Snapshot of the active job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxProgress {
    /// Bytes whose bursts have been confirmed sent
    pub acknowledged: usize,
    /// Bytes in the burst currently queued in the controller
    pub in_flight: usize,
    /// Total job length
    pub total: usize,
}

/// How the most recent job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxOutcome {
    /// Every burst was sent
    Completed { len: usize },
    /// A burst could not be queued; only `acknowledged` bytes went out
    Aborted { acknowledged: usize, total: usize },
}

struct TxJob<const N: usize> {
    data: Vec<u8, N>,
    acknowledged: usize,
    in_flight: usize,
}

struct Shared<C, const N: usize> {
    can: C,
    job: Option<TxJob<N>>,
    outcome: Option<TxOutcome>,
}

impl<C: CanController, const N: usize> Shared<C, N> {
    /// Queue the burst following the acknowledged bytes
    ///
    /// On failure the job is dropped and recorded as aborted.
    fn send_next(&mut self, report_id: ExtendedId) -> Result<(), TransmitError> {
        let Some(job) = self.job.as_mut() else {
            return Ok(());
        };

        let burst = frame::burst_at(&job.data, job.acknowledged);
        let burst_len = burst.len();
        let queued = match C::Frame::new(report_id, burst) {
            Some(frame) => self
                .can
                .try_enqueue(&frame)
                .map_err(|_| TransmitError::Device),
            None => Err(TransmitError::InvalidArgument),
        };

        match queued {
            Ok(()) => {
                job.in_flight = burst_len;
                Ok(())
            }
            Err(e) => {
                let acknowledged = job.acknowledged;
                let total = job.data.len();
                warn!(
                    "Report burst at byte {} of {} not queued, job aborted",
                    acknowledged, total
                );
                self.job = None;
                self.outcome = Some(TxOutcome::Aborted {
                    acknowledged,
                    total,
                });
                Err(e)
            }
        }
    }
}

/// CAN transport for DTC reports and diagnostic commands
///
/// `N` bounds the length of a single report.
pub struct DiagTransport<M: RawMutex, C: CanController, const N: usize = DEFAULT_JOB_CAPACITY> {
    shared: Mutex<M, RefCell<Shared<C, N>>>,
    mailbox: CommandMailbox,
    report_id: ExtendedId,
    request_id: ExtendedId,
}

impl<M: RawMutex, C: CanController, const N: usize> DiagTransport<M, C, N> {
    /// Create a transport around a stopped controller
    pub fn new(can: C, config: TransportConfig) -> Result<Self, TransportError> {
        let report_id =
            ExtendedId::new(config.report_id).ok_or(TransportError::InvalidIdentity)?;
        let request_id =
            ExtendedId::new(config.request_id).ok_or(TransportError::InvalidIdentity)?;

        Ok(Self {
            shared: Mutex::new(RefCell::new(Shared {
                can,
                job: None,
                outcome: None,
            })),
            mailbox: CommandMailbox::new(),
            report_id,
            request_id,
        })
    }

    /// Install the request filter and start the controller
    pub fn init(&self) -> Result<(), TransportError> {
        self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            shared
                .can
                .set_filter(IdFilter::exact_extended(self.request_id))
                .map_err(|_| TransportError::Controller)?;
            shared
                .can
                .start()
                .map_err(|_| TransportError::Controller)?;
            info!(
                "Diagnostic transport up (rx {=u32:#x}, tx {=u32:#x})",
                self.request_id.as_raw(),
                self.report_id.as_raw()
            );
            Ok(())
        })
    }

    /// Start sending `data` as a sequence of bursts
    ///
    /// Returns as soon as the first burst is queued. The payload is copied
    /// into the transport, so the caller's buffer is free immediately.
    pub fn transmit(&self, data: &[u8]) -> Result<(), TransmitError> {
        self.shared.lock(|shared| {
            let mut guard = shared.borrow_mut();
            let shared = &mut *guard;

            if shared.job.is_some() {
                return Err(TransmitError::Busy);
            }
            if data.is_empty() {
                return Err(TransmitError::InvalidArgument);
            }
            let data = Vec::from_slice(data).map_err(|_| TransmitError::InvalidArgument)?;

            debug!(
                "Report of {} bytes in {} bursts",
                data.len(),
                frame::burst_count(data.len())
            );
            shared.outcome = None;
            shared.job = Some(TxJob {
                data,
                acknowledged: 0,
                in_flight: 0,
            });
            shared.send_next(self.report_id)
        })
    }

    /// Transmit-complete interrupt hook
    ///
    /// Call once per transmit slot that finished. Completions that arrive
    /// with nothing in flight are ignored.
    pub fn on_transmit_complete(&self) {
        self.shared.lock(|shared| {
            let mut guard = shared.borrow_mut();
            let shared = &mut *guard;

            let Some(job) = shared.job.as_mut() else {
                return;
            };
            if job.in_flight == 0 {
                return;
            }

            job.acknowledged += job.in_flight;
            job.in_flight = 0;

            if job.acknowledged >= job.data.len() {
                let len = job.data.len();
                shared.job = None;
                shared.outcome = Some(TxOutcome::Completed { len });
                trace!("Report of {} bytes sent", len);
            } else {
                // Failure is recorded in the outcome
                let _ = shared.send_next(self.report_id);
            }
        })
    }

    /// Receive interrupt hook
    ///
    /// Frames other than data frames on the request identity are ignored,
    /// as are unknown opcodes. Returns the command that was posted.
    pub fn on_frame_received(&self, frame: &C::Frame) -> Option<DiagCommand> {
        if frame.is_remote_frame() || frame.id() != Id::Extended(self.request_id) {
            return None;
        }

        let command = DiagCommand::from_payload(frame.data());
        match command {
            Some(command) => self.mailbox.post(command),
            None => trace!("Ignoring diagnostic request {=[u8]:x}", frame.data()),
        }
        command
    }

    /// Most recent unconsumed command, without consuming it
    pub fn get_command(&self) -> Option<DiagCommand> {
        self.mailbox.peek()
    }

    /// Empty the command mailbox
    pub fn clear_command(&self) {
        self.mailbox.clear();
    }

    /// Empty the mailbox if it still holds `command`
    pub fn acknowledge_command(&self, command: DiagCommand) -> bool {
        self.mailbox.acknowledge(command)
    }

    /// True while a Transmission Job is active
    pub fn is_busy(&self) -> bool {
        self.shared.lock(|shared| shared.borrow().job.is_some())
    }

    /// Progress of the active job
    pub fn progress(&self) -> Option<TxProgress> {
        self.shared.lock(|shared| {
            shared.borrow().job.as_ref().map(|job| TxProgress {
                acknowledged: job.acknowledged,
                in_flight: job.in_flight,
                total: job.data.len(),
            })
        })
    }

    /// Result of the last finished job, cleared when a new job starts
    pub fn last_outcome(&self) -> Option<TxOutcome> {
        self.shared.lock(|shared| shared.borrow().outcome)
    }

    /// Run `f` with exclusive access to the controller
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        self.shared.lock(|shared| f(&mut shared.borrow_mut().can))
    }
}
