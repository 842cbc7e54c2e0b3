use crate::decoder::RawSampleBlock;
use crate::error::{MsoError, Result};
use crate::identity::Calibration;
use crate::registers::{
    bits_ctl2_bank, op_word, reg_pt_mask, reg_pt_word, BIT_CTL1_ADC_UNKNOWN4, BIT_CTL1_ARM,
    BIT_CTL1_FORCE, BIT_CTL1_LED, BIT_CTL1_RESETADC, BIT_CTL1_RESETFSM, REG_BUFFER, REG_CLKRATE1,
    REG_CLKRATE2, REG_CTL1, REG_CTL2, REG_DAC1, REG_DAC2, REG_DSO_TRIGGER_HI, REG_DSO_TRIGGER_LO,
    REG_LA_TRIGGER, REG_LA_TRIGGER_MASK, REG_PT_SPIMODE, REG_TRIGGER, REG_TRIGGER_WIDTH,
};
use crate::sample_rate;
use crate::transport::{SerialTransport, Transport, TransportError};
use crate::trigger_config::TriggerConfig;
use crate::wire;

/// Trigger status byte as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    Unknown,
    Unknown1,
    Unknown2,
    Unknown3,
    Waiting,
    Fired,
    /// A full sample block is waiting to be dumped.
    DataReady,
}

impl TriggerStatus {
    pub const fn as_byte(self) -> u8 {
        match self {
            TriggerStatus::Unknown => b'!',
            TriggerStatus::Unknown1 => b'1',
            TriggerStatus::Unknown2 => b'2',
            TriggerStatus::Unknown3 => b'3',
            TriggerStatus::Waiting => b'4',
            TriggerStatus::Fired => b'5',
            TriggerStatus::DataReady => b'6',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'!' => Some(TriggerStatus::Unknown),
            b'1' => Some(TriggerStatus::Unknown1),
            b'2' => Some(TriggerStatus::Unknown2),
            b'3' => Some(TriggerStatus::Unknown3),
            b'4' => Some(TriggerStatus::Waiting),
            b'5' => Some(TriggerStatus::Fired),
            b'6' => Some(TriggerStatus::DataReady),
            _ => None,
        }
    }
}

/// Logic input switching threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicThreshold {
    V1_2,
    #[default]
    V1_5,
    V1_8,
    V2_5,
    V3_0,
}

impl LogicThreshold {
    /// DAC word producing this threshold.
    pub fn dac_value(self) -> u16 {
        match self {
            LogicThreshold::V1_2 => 0x8600,
            LogicThreshold::V1_5 => 0x8300,
            LogicThreshold::V1_8 => 0x7a00,
            LogicThreshold::V2_5 => 0x7000,
            LogicThreshold::V3_0 => 0x6900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    /// No acquisition outstanding.
    #[default]
    Idle,
    /// Trigger configured and the arm sequence sent.
    Armed,
    /// Polling the trigger status register.
    WaitingTrigger,
    /// Buffer dump requested, nothing received yet.
    DataReady,
    /// Accumulating the raw block.
    Filling,
    /// Stopped explicitly or after a fatal error.
    Stopped,
}

/// Per-instrument state, including host-side mirrors of the write-only
/// control registers.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub calibration: Calibration,
    pub trigger: TriggerConfig,
    pub threshold: LogicThreshold,
    pub(crate) cur_rate: u64,
    pub(crate) ctlbase1: u8,
    pub(crate) ctlbase2: u8,
    pub(crate) state: AcquisitionState,
    pub(crate) buffer: RawSampleBlock,
    pub(crate) trigger_status: u8,
    pub(crate) stop_requested: bool,
    /// Source registered with the host and end-of-stream still owed.
    pub(crate) active: bool,
}

impl DeviceContext {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            trigger: TriggerConfig::default(),
            threshold: LogicThreshold::default(),
            cur_rate: sample_rate::DEFAULT_SAMPLE_RATE,
            ctlbase1: 0,
            ctlbase2: 0,
            state: AcquisitionState::Idle,
            buffer: RawSampleBlock::new(),
            trigger_status: TriggerStatus::Unknown.as_byte(),
            stop_requested: false,
            active: false,
        }
    }

    pub fn cur_rate(&self) -> u64 {
        self.cur_rate
    }

    /// Last value written to `REG_CTL1`.
    pub fn ctlbase1(&self) -> u8 {
        self.ctlbase1
    }

    /// Last value written to `REG_CTL2` outside of bank switches.
    pub fn ctlbase2(&self) -> u8 {
        self.ctlbase2
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn trigger_status(&self) -> u8 {
        self.trigger_status
    }

    pub fn buffer_filled(&self) -> usize {
        self.buffer.filled()
    }
}

/// Driver for one MSO-19.
///
/// Every command is a single framed message. Shadow registers are only
/// updated after the message carrying the new value went out.
pub struct Mso19<T: Transport = SerialTransport> {
    pub(crate) transport: T,
    pub(crate) ctx: DeviceContext,
}

impl Mso19<SerialTransport> {
    /// Open the device on a serial port and bring it into a known state.
    ///
    /// `identity` is the USB serial number, which carries the calibration.
    pub fn open(port: &str, identity: &str) -> Result<Self> {
        let transport = SerialTransport::open(port)?;
        let mut mso = Self::new(transport, identity)?;
        mso.initialize()?;
        Ok(mso)
    }

    pub fn close(mut self) {
        self.transport.close();
    }
}

impl<T: Transport> Mso19<T> {
    pub fn new(transport: T, identity: &str) -> Result<Self> {
        let calibration = Calibration::parse(identity)?;
        log::debug!(
            "MSO-19 model {} rev {}, {} mV/bit",
            calibration.hwmodel,
            calibration.hwrev,
            calibration.vbit
        );
        Ok(Self::with_calibration(transport, calibration))
    }

    pub fn with_calibration(transport: T, calibration: Calibration) -> Self {
        Self {
            transport,
            ctx: DeviceContext::new(calibration),
        }
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn calibration(&self) -> &Calibration {
        &self.ctx.calibration
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Trigger settings used by the next `configure_trigger`.
    pub fn set_trigger(&mut self, trigger: TriggerConfig) {
        self.ctx.trigger = trigger;
    }

    pub fn set_threshold(&mut self, threshold: LogicThreshold) {
        self.ctx.threshold = threshold;
    }

    fn send(&mut self, ops: &[u16]) -> Result<()> {
        wire::send_control_message(&mut self.transport, ops)
    }

    /// Device-open sequence: reset the ADC, reading the trigger status
    /// before and after for diagnostics.
    pub fn initialize(&mut self) -> Result<()> {
        self.refresh_trigger_status();
        self.reset_adc()?;
        self.refresh_trigger_status();
        Ok(())
    }

    fn refresh_trigger_status(&mut self) {
        match self.check_trigger() {
            Ok(status) => log::debug!("Trigger state: {:#04x}", status),
            Err(e) => log::warn!("Could not read trigger state: {}", e),
        }
    }

    /// Write the full trigger setup, including the protocol trigger in
    /// register bank 2.
    pub fn configure_trigger(&mut self) -> Result<()> {
        let trigger = &self.ctx.trigger;
        let dso_trigger = trigger.dso_trigger_word(self.ctx.calibration.vbit);
        let protocol = &trigger.protocol;
        let ctlbase2 = self.ctx.ctlbase2;

        let ops = [
            op_word(REG_LA_TRIGGER, trigger.logic.value()),
            op_word(REG_LA_TRIGGER_MASK, trigger.logic.mask()),
            op_word(REG_DSO_TRIGGER_LO, (dso_trigger & 0xff) as u8),
            op_word(REG_DSO_TRIGGER_HI, (dso_trigger >> 8) as u8),
            op_word(REG_TRIGGER_WIDTH, trigger.width_samples(self.ctx.cur_rate)),
            // select the SPI/I2C trigger bank
            op_word(REG_CTL2, ctlbase2 | bits_ctl2_bank(2)),
            op_word(reg_pt_word(0), protocol.word[0]),
            op_word(reg_pt_word(1), protocol.word[1]),
            op_word(reg_pt_word(2), protocol.word[2]),
            op_word(reg_pt_word(3), protocol.word[3]),
            op_word(reg_pt_mask(0), protocol.mask[0]),
            op_word(reg_pt_mask(1), protocol.mask[1]),
            op_word(reg_pt_mask(2), protocol.mask[2]),
            op_word(reg_pt_mask(3), protocol.mask[3]),
            op_word(REG_PT_SPIMODE, protocol.spimode),
            // back to the default bank
            op_word(REG_CTL2, ctlbase2),
        ];

        log::debug!("Configuring trigger, DSO trigger word {:#06x}", dso_trigger);
        self.send(&ops)
    }

    pub fn configure_threshold_level(&mut self) -> Result<()> {
        self.set_dac(self.ctx.threshold.dac_value())
    }

    /// Ask the device to dump its sample buffer.
    pub fn read_buffer(&mut self) -> Result<()> {
        log::debug!("Requesting buffer dump.");
        self.send(&[op_word(REG_BUFFER, 0)])
    }

    pub fn arm(&mut self) -> Result<()> {
        let base = self.ctx.ctlbase1;
        log::debug!("Requesting trigger arm.");
        self.send(&[
            op_word(REG_CTL1, base | BIT_CTL1_RESETFSM),
            op_word(REG_CTL1, base | BIT_CTL1_ARM),
            op_word(REG_CTL1, base),
        ])
    }

    pub fn force_capture(&mut self) -> Result<()> {
        let base = self.ctx.ctlbase1;
        log::debug!("Requesting forced capture.");
        self.send(&[
            op_word(REG_CTL1, base | BIT_CTL1_FORCE),
            op_word(REG_CTL1, base),
        ])
    }

    /// Load the DAC with `val` and pulse the ADC reset so it takes effect.
    pub fn set_dac(&mut self, val: u16) -> Result<()> {
        let base = self.ctx.ctlbase1;
        log::debug!("Setting dac word to {:#x}.", val);
        self.send(&[
            op_word(REG_DAC1, (val >> 8) as u8),
            op_word(REG_DAC2, (val & 0xff) as u8),
            op_word(REG_CTL1, base | BIT_CTL1_RESETADC),
            op_word(REG_CTL1, base),
        ])
    }

    pub fn reset_adc(&mut self) -> Result<()> {
        // hardware quirk: must stay set from the first ADC reset on
        let base = self.ctx.ctlbase1 | BIT_CTL1_ADC_UNKNOWN4;
        log::debug!("Requesting ADC reset.");
        self.send(&[
            op_word(REG_CTL1, base | BIT_CTL1_RESETADC),
            op_word(REG_CTL1, base),
        ])?;
        self.ctx.ctlbase1 = base;
        Ok(())
    }

    pub fn reset_fsm(&mut self) -> Result<()> {
        let base = self.ctx.ctlbase1 | BIT_CTL1_RESETFSM;
        log::debug!("Requesting FSM reset.");
        self.send(&[op_word(REG_CTL1, base)])?;
        self.ctx.ctlbase1 = base;
        Ok(())
    }

    pub fn toggle_led(&mut self, on: bool) -> Result<()> {
        let mut base = self.ctx.ctlbase1 & !BIT_CTL1_LED;
        if on {
            base |= BIT_CTL1_LED;
        }
        log::debug!("Requesting LED toggle.");
        self.send(&[op_word(REG_CTL1, base)])?;
        self.ctx.ctlbase1 = base;
        Ok(())
    }

    /// Switch to `rate` Hz. Unsupported rates leave the device untouched.
    pub fn set_clock_rate(&mut self, rate: u64) -> Result<()> {
        let Some(entry) = sample_rate::lookup(rate) else {
            log::error!("Unsupported rate {} Hz.", rate);
            return Err(MsoError::UnsupportedRate { rate });
        };

        log::debug!("Setting clkrate word to {:#x}.", entry.divider);
        self.send(&[
            op_word(REG_CLKRATE1, (entry.divider >> 8) as u8),
            op_word(REG_CLKRATE2, (entry.divider & 0xff) as u8),
            op_word(REG_CTL2, entry.slowmode),
        ])?;
        self.ctx.ctlbase2 = entry.slowmode;
        self.ctx.cur_rate = rate;
        Ok(())
    }

    /// Send the trigger status query without waiting for the answer. The
    /// reply arrives as the next readable event.
    pub fn request_trigger_status(&mut self) -> Result<()> {
        log::debug!("Requesting trigger state.");
        self.send(&[op_word(REG_TRIGGER, 0)])
    }

    /// Query the trigger status and block (bounded by the transport's read
    /// timeout) for the one byte reply.
    pub fn check_trigger(&mut self) -> Result<u8> {
        self.request_trigger_status()?;

        let mut status = [0u8; 1];
        let n = self.transport.read(&mut status)?;
        if n != 1 {
            return Err(TransportError::ShortRead {
                expected: 1,
                actual: n,
            }
            .into());
        }
        self.ctx.trigger_status = status[0];
        log::debug!("Trigger state is: {:#04x}.", status[0]);
        Ok(status[0])
    }
}
