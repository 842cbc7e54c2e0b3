//! Event-driven acquisition.
//!
//! The driver owns no threads. The host registers the transport's
//! descriptor with its event loop and calls [`Mso19::receive_data`] once per
//! readable event; each call advances the acquisition by one step:
//!
//! ```text
//! Idle --start--> Armed --status query--> WaitingTrigger --'6'--> DataReady
//!                                            ^    |                   |
//!                                            +----+ other status      v
//!                              Idle <--3072 bytes decoded-------- Filling
//! ```
//!
//! A stop request or a fatal transport error moves to `Stopped` from any
//! state. `receive_data` takes `&mut self`, so a new event cannot be handled
//! while the previous step is still running.

use crate::decoder::{decode_block, DecodedSamples};
use crate::error::{MsoError, Result};
use crate::mso::{AcquisitionState, Mso19, TriggerStatus};
use crate::registers::BIT_CTL1_LED;
use crate::transport::{SourceId, Transport, TransportError};

/// Largest read performed per readable event.
pub const READ_CHUNK: usize = 1024;

/// Consumer of acquired data.
pub trait SampleSink {
    fn on_samples(&mut self, samples: DecodedSamples);

    /// Called exactly once when an acquisition stops.
    fn on_end_of_stream(&mut self);

    fn on_fatal_error(&mut self, reason: &MsoError);
}

/// The host event loop's descriptor registration.
pub trait SourceRegistry {
    fn add_source(&mut self, source: SourceId);

    fn remove_source(&mut self, source: SourceId);
}

pub trait AcquisitionHost: SampleSink + SourceRegistry {}

impl<H: SampleSink + SourceRegistry + ?Sized> AcquisitionHost for H {}

/// What the event loop should do with the source after a receive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// More events are expected for this acquisition.
    KeepSource,
    /// Nothing further to read this cycle.
    RemoveSource,
}

impl<T: Transport> Mso19<T> {
    /// Configure the hardware, arm the trigger and register the transport
    /// with the host.
    ///
    /// Blocks once, for the bounded trigger status read.
    pub fn start_acquisition<H: AcquisitionHost + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let _span = tracing::debug_span!("start_acquisition", rate = self.ctx.cur_rate).entered();

        let source = self.transport.fd().ok_or(TransportError::NotOpen)?;
        if !matches!(
            self.ctx.state,
            AcquisitionState::Idle | AcquisitionState::Stopped
        ) {
            log::warn!(
                "Restarting acquisition while in state {:?}",
                self.ctx.state
            );
        }

        self.ctx.stop_requested = false;
        self.ctx.buffer.reset();
        self.ctx.trigger_status = TriggerStatus::Unknown.as_byte();

        if let Err(e) = self.configure_and_arm() {
            log::error!("Failed to start acquisition: {}", e);
            self.ctx.state = AcquisitionState::Idle;
            return Err(e);
        }

        host.add_source(source);
        self.ctx.active = true;
        log::debug!("Acquisition started, polling trigger on source {}", source);
        Ok(())
    }

    fn configure_and_arm(&mut self) -> Result<()> {
        if self.ctx.ctlbase1 & BIT_CTL1_LED != 0 {
            self.toggle_led(false)?;
        }
        self.set_clock_rate(self.ctx.cur_rate)?;
        self.set_dac(self.ctx.calibration.dac_offset)?;
        self.configure_threshold_level()?;
        self.configure_trigger()?;
        self.arm()?;
        self.ctx.state = AcquisitionState::Armed;

        match self.check_trigger() {
            Ok(status) => log::debug!("Trigger state after arm: {:#04x}", status),
            Err(e) => log::warn!("No trigger state after arm: {}", e),
        }
        self.request_trigger_status()?;
        self.ctx.state = AcquisitionState::WaitingTrigger;
        Ok(())
    }

    /// Ask the acquisition to stop at the next receive step.
    pub fn request_stop(&mut self) {
        self.ctx.stop_requested = true;
    }

    /// Unregister the transport and signal end-of-stream. Only the first
    /// call after a successful start has any effect.
    pub fn stop_acquisition<H: AcquisitionHost + ?Sized>(&mut self, host: &mut H) {
        self.ctx.stop_requested = false;
        if !self.ctx.active {
            return;
        }
        self.ctx.active = false;
        if let Some(source) = self.transport.fd() {
            host.remove_source(source);
        }
        self.ctx.buffer.reset();
        self.ctx.state = AcquisitionState::Stopped;
        log::debug!("Acquisition stopped.");
        host.on_end_of_stream();
    }

    /// Handle one readable event on the transport.
    pub fn receive_data<H: AcquisitionHost + ?Sized>(&mut self, host: &mut H) -> ReceiveOutcome {
        let _span = tracing::trace_span!("receive_data", state = ?self.ctx.state).entered();

        if self.ctx.stop_requested {
            self.stop_acquisition(host);
            return ReceiveOutcome::RemoveSource;
        }

        if matches!(
            self.ctx.state,
            AcquisitionState::Idle | AcquisitionState::Stopped
        ) {
            log::debug!("Readable event with no acquisition outstanding.");
            return ReceiveOutcome::RemoveSource;
        }

        let mut scratch = [0u8; READ_CHUNK];
        let n = match self.transport.read(&mut scratch) {
            Ok(0) => return self.fail(host, TransportError::Closed.into()),
            Ok(n) => n,
            Err(e) if e.is_transient() => {
                log::trace!("Spurious wakeup: {}", e);
                return ReceiveOutcome::KeepSource;
            }
            Err(e) => return self.fail(host, e.into()),
        };
        let data = &scratch[..n];

        match self.ctx.state {
            AcquisitionState::DataReady | AcquisitionState::Filling => {
                self.accept_sample_data(host, data)
            }
            _ => match self.handle_trigger_status(data[0]) {
                Ok(()) => ReceiveOutcome::KeepSource,
                Err(e) => self.fail(host, e),
            },
        }
    }

    /// Only the first byte of a read is meaningful while waiting.
    fn handle_trigger_status(&mut self, byte: u8) -> Result<()> {
        self.ctx.trigger_status = byte;
        match TriggerStatus::from_byte(byte) {
            Some(TriggerStatus::DataReady) => {
                log::debug!("Trigger is ready.");
                self.read_buffer()?;
                self.ctx.buffer.reset();
                self.ctx.state = AcquisitionState::DataReady;
            }
            Some(status) => {
                log::trace!("Trigger state {:?}, polling again.", status);
                self.request_trigger_status()?;
                self.ctx.state = AcquisitionState::WaitingTrigger;
            }
            None => {
                let err = MsoError::InvalidPacket(format!("unexpected trigger status {byte:#04x}"));
                log::warn!("{}, polling again.", err);
                self.request_trigger_status()?;
                self.ctx.state = AcquisitionState::WaitingTrigger;
            }
        }
        Ok(())
    }

    fn accept_sample_data<H: AcquisitionHost + ?Sized>(
        &mut self,
        host: &mut H,
        data: &[u8],
    ) -> ReceiveOutcome {
        let taken = self.ctx.buffer.extend(data);
        if taken < data.len() {
            log::warn!(
                "Discarding {} bytes past the end of the sample block.",
                data.len() - taken
            );
        }
        self.ctx.state = AcquisitionState::Filling;

        let Some(block) = self.ctx.buffer.as_full() else {
            return ReceiveOutcome::KeepSource;
        };
        let samples = decode_block(block);
        self.ctx.buffer.reset();
        self.ctx.state = AcquisitionState::Idle;

        log::debug!("Got {} samples, sending them on.", samples.len());
        host.on_samples(samples);
        ReceiveOutcome::RemoveSource
    }

    fn fail<H: AcquisitionHost + ?Sized>(&mut self, host: &mut H, err: MsoError) -> ReceiveOutcome {
        log::error!("Acquisition aborted: {}", err);
        host.on_fatal_error(&err);
        self.stop_acquisition(host);
        ReceiveOutcome::RemoveSource
    }
}
