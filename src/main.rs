//! wedlink: command line client for WED wearables over BlueZ

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bluer::Address;
use clap::Parser;
use colored::Colorize;
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use wedlink::bluez::{BluezTransport, ConnectOptions};
use wedlink::commands::{parse_i2c, Command, CommandName, DownloadMode, Params};
use wedlink::config::att::DEFAULT_LE_MTU;
use wedlink::config::limits::MAX_DEVICES;
use wedlink::debug::PduDump;
use wedlink::driver;
use wedlink::firmware::{FirmwareUpdate, ImageSource};
use wedlink::logs::DecoderOptions;
use wedlink::output::{FileSink, OutputOptions};
use wedlink::session::{DeviceSession, ExtendedStatusReport, SessionEvent, SessionOptions};

#[derive(Parser, Debug)]
#[command(name = "wedlink")]
#[command(about = "Talk to WED wearables over Bluetooth LE")]
struct Args {
    /// Command to run (status, download, configls, configaccel, configtemp,
    /// blink, deepsleep, resetlogs, resetcpu, resetconfigs, rename, tag,
    /// extstatus)
    #[arg(short, long)]
    command: Option<String>,

    /// Device address, or two separated by a comma
    #[arg(short, long)]
    device: String,

    /// Adapter to connect through
    #[arg(short, long, default_value = "hci0")]
    adapter: String,

    /// Parameter file or `key=value[,...]` line
    #[arg(short, long)]
    input: Option<String>,

    /// Mode to switch to with `tag` (fast, slow or sleep)
    #[arg(long)]
    mode: Option<String>,

    /// Firmware image to upload, implies the firmware update command
    #[arg(long, value_name = "FILE")]
    fwupdate: Option<PathBuf>,

    /// Firmware pages sent per device status poll
    #[arg(long, default_value = "1")]
    speedup: u32,

    /// Read an I2C register, `address:register`
    #[arg(long, value_name = "ADDR:REG")]
    i2c_read: Option<String>,

    /// Write an I2C register, `address:register:value`
    #[arg(long, value_name = "ADDR:REG:VALUE")]
    i2c_write: Option<String>,

    /// Discover every characteristic instead of using the known handles
    #[arg(long)]
    full: bool,

    /// Stream live sensor data instead of stored logs
    #[arg(long)]
    live: bool,

    /// Download without compression
    #[arg(long)]
    raw: bool,

    /// Leave compressed accelerometer records undecoded
    #[arg(long)]
    compressed: bool,

    /// Print accelerometer lines while downloading
    #[arg(long)]
    print: bool,

    /// Append to the log file instead of truncating it
    #[arg(long)]
    append: bool,

    /// A tag record restarts accelerometer delta decoding
    #[arg(long)]
    tag_resets_base: bool,

    /// ATT MTU to assume
    #[arg(long, default_value_t = DEFAULT_LE_MTU)]
    mtu: usize,

    /// Device uses a random address
    #[arg(long)]
    random: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output name for download, otherwise the input
    #[arg(value_name = "NAME")]
    extra: Option<String>,
}

/// Everything resolved from the arguments before touching a device
#[derive(Debug)]
struct Plan {
    command: Command,
    session: SessionOptions,
    output: OutputOptions,
    firmware: Option<PathBuf>,
}

impl Args {
    fn command_name(&self) -> Result<CommandName> {
        if self.fwupdate.is_some() {
            return Ok(CommandName::FirmwareUpdate);
        }
        if self.i2c_read.is_some() {
            return Ok(CommandName::I2cRead);
        }
        if self.i2c_write.is_some() {
            return Ok(CommandName::I2cWrite);
        }
        match &self.command {
            Some(name) => CommandName::from_name(name)
                .with_context(|| format!("Unknown command {}", name)),
            None if self.live => Ok(CommandName::Download),
            None => Ok(CommandName::default()),
        }
    }

    fn devices(&self) -> Result<Vec<Address>> {
        let devices = self
            .device
            .split(',')
            .map(|addr| {
                Address::from_str(addr.trim()).with_context(|| format!("Invalid address {}", addr))
            })
            .collect::<Result<Vec<_>>>()?;
        if devices.len() > MAX_DEVICES {
            bail!("At most {} devices are supported", MAX_DEVICES);
        }
        Ok(devices)
    }

    fn plan(&self) -> Result<Plan> {
        let name = self.command_name()?;

        let mut params = Params::new();
        if let Some(mode) = &self.mode {
            params.set_mode(mode)?;
        }
        if let Some(input) = &self.input {
            params.load_input(input, name)?;
        }

        let mut base_name = None;
        if let Some(extra) = &self.extra {
            if name == CommandName::Download {
                base_name = Some(extra.clone());
            } else {
                params.load_input(extra, name)?;
            }
        }

        let download = DownloadMode {
            raw: self.raw,
            live: self.live,
        };
        let command = match name {
            CommandName::FirmwareUpdate => Command::FirmwareUpdate,
            CommandName::I2cRead => {
                Command::I2c(parse_i2c(self.i2c_read.as_deref().unwrap_or(""), false)?)
            }
            CommandName::I2cWrite => {
                Command::I2c(parse_i2c(self.i2c_write.as_deref().unwrap_or(""), true)?)
            }
            _ => params.command(name, download)?,
        };

        Ok(Plan {
            command,
            session: SessionOptions {
                full_discovery: self.full,
                decoder: DecoderOptions {
                    decompress: !self.compressed,
                    tag_resets_base: self.tag_resets_base,
                    live: self.live,
                },
            },
            output: OutputOptions {
                base_name,
                append: self.append,
                print: self.print,
                device_count: self.device.split(',').count(),
            },
            firmware: self.fwupdate.clone(),
        })
    }
}

type Session = DeviceSession<BluezTransport, FileSink>;

/// Console output for one session event
fn report(index: usize, event: &SessionEvent) {
    let tag = format!("[{}]", index).dimmed();
    match event {
        SessionEvent::Build(build) => println!("{} Build: {}", tag, build),
        SessionEvent::Version {
            version,
            compatible,
        } => {
            println!("{} Version: {}", tag, version);
            if !compatible {
                println!("{} {}", tag, "Firmware too old for this config layout".yellow());
            }
        }
        SessionEvent::Status(status) => println!("{} {}", tag, status.report().to_string().green()),
        SessionEvent::KeepAlive(_) => {}
        SessionEvent::Characteristic(c) => println!(
            "{} handle: {:#06x}, char properties: {:#04x}, char value handle: {:#06x}, uuid: {}",
            tag, c.handle, c.properties, c.value_handle, c.uuid
        ),
        SessionEvent::ExtendedStatus { status, version } => println!(
            "{}\n{}",
            tag,
            ExtendedStatusReport {
                status,
                version: version.as_ref(),
            }
        ),
        SessionEvent::I2c(result) if result.is_ok() => {
            println!("{} I2C data: {:#04x}", tag, result.data)
        }
        SessionEvent::I2c(result) => println!(
            "{} {}",
            tag,
            format!("I2C failed with status {}", result.status).red()
        ),
        SessionEvent::FirmwareProgress(progress) => {
            print!("\r{} {}", tag, progress);
            let _ = std::io::stdout().flush();
        }
        SessionEvent::FirmwareDone => println!("\n{} {}", tag, "Firmware update committed".green()),
        SessionEvent::DownloadDone { read, total } => {
            println!("{} Downloaded {} of {} entries", tag, read, total)
        }
        SessionEvent::NothingToDownload => println!("{} No log entries to download", tag),
        SessionEvent::Desync(e) => println!("{} {}", tag, e.to_string().yellow()),
        SessionEvent::ConfigWritten => println!("{} {}", tag, "Done".green()),
        SessionEvent::Unhandled(pdu) => println!("{} {}", tag, PduDump(pdu)),
    }
}

/// Set `quit` when the user types `q` and enter, or presses Ctrl-C
fn watch_quit(quit: Arc<AtomicBool>) {
    let keys = quit.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().eq_ignore_ascii_case("q") {
                keys.store(true, Ordering::Relaxed);
                break;
            }
        }
    });
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            quit.store(true, Ordering::Relaxed);
        }
    });
}

async fn connect_all(args: &Args, plan: &Plan) -> Result<Vec<Session>> {
    let connect = ConnectOptions {
        adapter: args.adapter.clone(),
        random: args.random,
        mtu: args.mtu,
    };
    let bluez = bluer::Session::new()
        .await
        .context("Cannot reach bluetoothd")?;

    let mut sessions = Vec::new();
    for (index, address) in args.devices()?.into_iter().enumerate() {
        let transport = BluezTransport::connect(&bluez, address, &connect).await?;
        println!("[{}] {} {}", index, "Connected to".green(), address);

        let sink = FileSink::for_device(index, &plan.output);
        let mut session = DeviceSession::new(index, transport, sink, plan.session);
        if let Some(path) = &plan.firmware {
            let file = File::open(path)
                .with_context(|| format!("Cannot open firmware image {}", path.display()))?;
            let image = FirmwareUpdate::new(Box::new(file) as Box<dyn ImageSource>, args.speedup)
                .with_context(|| format!("Invalid firmware image {}", path.display()))?;
            session = session.with_firmware(image);
        }
        sessions.push(session);
    }
    Ok(sessions)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Bad parameters are rejected before any connection is made
    let plan = args.plan()?;
    debug!("Plan: {:?}", plan);

    let mut sessions = connect_all(&args, &plan).await?;
    let quit = Arc::new(AtomicBool::new(false));
    watch_quit(quit.clone());
    info!("Running {} on {} device(s), q to quit", plan.command.name(), sessions.len());

    let results = driver::run(&mut sessions, &plan.command, &mut &*quit, report).await;

    let mut failed = 0;
    for (session, result) in sessions.iter_mut().zip(results) {
        let index = session.index();
        if session.sink().is_open() {
            println!("[{}] Log written to {}", index, session.sink().path().display());
        }
        if let Err(e) = result {
            println!("[{}] {}", index, format!("Error: {}", e).red());
            failed += 1;
        }
    }
    drop(sessions);

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
