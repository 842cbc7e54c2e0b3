// Single-shot acquisition
//
// Opens an MSO-19, configures the trigger, waits for one block of 1024
// samples and prints a short summary of the analog and logic channels.

use clap::Parser;
use mso19_rs::{
    sample_rate, DecodedSamples, LogicThreshold, Mso19, MsoError, ProbeType, ReceiveOutcome,
    SampleSink, SourceId, SourceRegistry, TriggerConfig,
};
use polars::prelude::DataFrame;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "data_acquisition")]
#[command(version = "0.1")]
#[command(about = "Capture one block from an MSO-19")]
struct Args {
    /// Serial port of the device, e.g. /dev/ttyUSB0
    port: String,

    /// USB serial number of the device; carries its calibration
    identity: String,

    #[arg(short, long, default_value_t = sample_rate::DEFAULT_SAMPLE_RATE, help = "Sample rate in Hz")]
    rate: u64,

    #[arg(short, long, default_value = "x10", value_parser = ["x1", "x10"], help = "Probe multiplier")]
    probe: String,

    #[arg(short, long, default_value_t = 0, help = "Analog trigger level in mV at the probe tip")]
    level: i32,

    #[arg(long, help = "Trigger on the falling edge")]
    falling: bool,

    #[arg(short, long, default_value_t = 3000, help = "Give up after this many milliseconds")]
    timeout_ms: u64,

    #[arg(short, long, help = "Force a capture instead of waiting for the trigger")]
    force: bool,

    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

/// Minimal host: one registered source and a slot for the result.
#[derive(Default)]
struct Host {
    source: Option<SourceId>,
    samples: Option<DecodedSamples>,
    done: bool,
}

impl SampleSink for Host {
    fn on_samples(&mut self, samples: DecodedSamples) {
        self.samples = Some(samples);
    }

    fn on_end_of_stream(&mut self) {
        self.done = true;
    }

    fn on_fatal_error(&mut self, reason: &MsoError) {
        eprintln!("Acquisition failed: {reason}");
    }
}

impl SourceRegistry for Host {
    fn add_source(&mut self, source: SourceId) {
        self.source = Some(source);
    }

    fn remove_source(&mut self, source: SourceId) {
        if self.source == Some(source) {
            self.source = None;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let probe = if args.probe == "x1" {
        ProbeType::X1
    } else {
        ProbeType::X10
    };

    let mut mso = Mso19::open(&args.port, &args.identity)?;
    println!(
        "Connected to MSO-19 on {} ({} mV/bit)",
        args.port,
        mso.calibration().vbit
    );

    mso.set_clock_rate(args.rate)?;
    mso.set_threshold(LogicThreshold::V1_5);
    let trigger = TriggerConfig::on_channel(0)
        .level_mv(f64::from(args.level))
        .probe(probe);
    mso.set_trigger(if args.falling {
        trigger.falling_edge()
    } else {
        trigger.rising_edge()
    });

    let mut host = Host::default();
    mso.start_acquisition(&mut host)?;
    if args.force {
        mso.force_capture()?;
    }

    // The serial read timeout paces this loop like a poll() would.
    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    while host.source.is_some() {
        if Instant::now() > deadline {
            println!("Timed out waiting for the trigger");
            mso.request_stop();
        }
        if mso.receive_data(&mut host) == ReceiveOutcome::RemoveSource {
            break;
        }
    }
    mso.stop_acquisition(&mut host);

    if let Some(samples) = host.samples.take() {
        let df = mso.captured_block(samples).to_dataframe()?;
        println!("Captured {} samples at {} Hz", df.height(), args.rate);
        print_data_summary(&df)?;
    }

    mso.close();
    Ok(())
}

fn print_data_summary(data: &DataFrame) -> Result<(), Box<dyn std::error::Error>> {
    let values: Vec<f64> = data
        .column(mso19_rs::frame::ANALOG_MV_COLUMN_NAME)?
        .f64()?
        .into_no_null_iter()
        .collect();

    if !values.is_empty() {
        let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        println!("   Analog range: {min:.1} mV to {max:.1} mV (mean: {mean:.1} mV)");
    }

    for bit in 0..8 {
        let highs = data
            .column(&format!("bit_{bit}"))?
            .bool()?
            .into_no_null_iter()
            .filter(|b| *b)
            .count();
        println!("   Logic input {bit}: high in {highs} of {} samples", data.height());
    }

    Ok(())
}
