// Trigger status monitor
//
// Arms the trigger and polls the status register until it reports that
// data is ready. The LED is lit while waiting.

use clap::Parser;
use mso19_rs::{Mso19, TriggerStatus};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "trigger_poll")]
#[command(version = "0.1")]
#[command(about = "Watch the MSO-19 trigger state machine")]
struct Args {
    /// Serial port of the device, e.g. /dev/ttyUSB0
    port: String,

    /// USB serial number of the device
    identity: String,

    #[arg(short, long, default_value_t = 50, help = "Number of status queries")]
    count: u32,

    #[arg(short, long, default_value_t = 100, help = "Pause between queries in milliseconds")]
    interval_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut mso = Mso19::open(&args.port, &args.identity)?;
    mso.configure_trigger()?;
    mso.arm()?;
    mso.toggle_led(true)?;

    for _ in 0..args.count {
        match mso.check_trigger() {
            Ok(byte) => {
                let status = TriggerStatus::from_byte(byte);
                println!("{:#04x} {:?}", byte, status);
                if status == Some(TriggerStatus::DataReady) {
                    break;
                }
            }
            Err(e) => println!("no answer: {e}"),
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms));
    }

    mso.toggle_led(false)?;
    mso.close();
    Ok(())
}
