//! # MSO-19 RS
//!
//! A Rust driver for the Link Instruments MSO-19 USB mixed-signal
//! oscilloscope: one 10-bit analog channel and eight logic inputs, sampled
//! together into blocks of 1024 samples.
//!
//! The driver speaks the device's framed register protocol over a serial
//! transport and runs acquisitions from a host event loop without owning any
//! threads.
//!
//! ## Features
//!
//! - **Register protocol**: framed op-word messages with host-side shadows of
//!   the write-only control registers
//! - **Trigger configuration**: analog, logic pattern and SPI/I2C protocol
//!   triggers with builder patterns
//! - **Event-driven acquisition**: one non-blocking step per readable event
//! - **DataFrame output**: decoded blocks as `polars` frames with time and
//!   millivolt columns
//!
//! ## Examples
//!
//! ### Trigger Configuration
//!
//! ```rust
//! use mso19_rs::{BitState, LogicPattern, ProbeType, TriggerConfig};
//!
//! let trigger = TriggerConfig::on_channel(3).logic_pattern(
//!     LogicPattern::when()
//!         .bit0(BitState::High)
//!         .bit1(BitState::Low),
//! );
//! assert_eq!(trigger.logic.value(), 0x01);
//!
//! let analog = TriggerConfig::on_channel(0)
//!     .falling_edge()
//!     .level_mv(1500.0)
//!     .probe(ProbeType::X10);
//! println!("DSO trigger word: {:#06x}", analog.dso_trigger_word(4.19));
//! ```
//!
//! ### Acquisition
//!
//! ```rust,no_run
//! use mso19_rs::{DecodedSamples, Mso19, MsoError, ReceiveOutcome, SampleSink, SourceId, SourceRegistry};
//!
//! #[derive(Default)]
//! struct Host {
//!     samples: Option<DecodedSamples>,
//! }
//!
//! impl SampleSink for Host {
//!     fn on_samples(&mut self, samples: DecodedSamples) {
//!         self.samples = Some(samples);
//!     }
//!     fn on_end_of_stream(&mut self) {}
//!     fn on_fatal_error(&mut self, reason: &MsoError) {
//!         eprintln!("{reason}");
//!     }
//! }
//!
//! impl SourceRegistry for Host {
//!     fn add_source(&mut self, _source: SourceId) {}
//!     fn remove_source(&mut self, _source: SourceId) {}
//! }
//!
//! let mut mso = Mso19::open("/dev/ttyUSB0", "4191903803812345")?;
//! mso.set_clock_rate(10_000_000)?;
//!
//! let mut host = Host::default();
//! mso.start_acquisition(&mut host)?;
//! while mso.receive_data(&mut host) == ReceiveOutcome::KeepSource {}
//!
//! if let Some(samples) = host.samples.take() {
//!     let df = mso.captured_block(samples).to_dataframe()?;
//!     println!("Captured {} samples", df.height());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod acquisition;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod identity;
pub mod mso;
pub mod registers;
pub mod sample_rate;
pub mod transport;
pub mod trigger_config;
pub mod wire;

// Re-export the main types for convenience
pub use acquisition::{AcquisitionHost, ReceiveOutcome, SampleSink, SourceRegistry};

pub use decoder::{decode_block, DecodedSamples};

pub use error::{MsoError, Result};

pub use frame::CapturedBlock;

pub use identity::Calibration;

pub use mso::{AcquisitionState, DeviceContext, LogicThreshold, Mso19, TriggerStatus};

pub use transport::{SerialTransport, SourceId, Transport, TransportError};

pub use trigger_config::{
    BitState, LogicPattern, ProbeType, ProtocolTrigger, TriggerConfig, TriggerSlope,
};
