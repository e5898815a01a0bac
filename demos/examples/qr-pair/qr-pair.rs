use anyhow::Result;
use bytes::BytesMut;
use clap::Parser;
use env_logger::Target;
use log::{info, trace};
use sansio::Protocol;
use std::fs::OpenOptions;
use std::time::{Duration, Instant};
use std::{fs, io::Write, str::FromStr};
use tokio::sync::broadcast;

use pair::capture::ManualCapture;
use pair::configuration::PairingConfiguration;
use pair::notifier::LogNotifier;
use pair::qr::CaptureFrame;
use pair::session::{PairingEvent, Phase, RTCPairingSession};
use pair::sim::{SimNetwork, SimProvider};
use shared::error::Error;

const TICK_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "qr-pair")]
#[command(author = "Rusty Rain <y@liu.mx>")]
#[command(version = "0.0.0")]
#[command(about = "An example of pairing two peers by showing each other QR codes", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(short, long, default_value_t = format!(""))]
    output_log_file: String,
    #[arg(short, long, default_value_t = format!(""))]
    config_file: String,
    #[arg(short, long, default_value_t = format!("Hello from initiator!"))]
    message: String,
    #[arg(long)]
    show_codes: bool,
    #[arg(long, default_value_t = 4)]
    module_px: u32,
}

/// One side of the demo: a session plus the screen it shows and the
/// camera it points at the other side's screen.
struct Device {
    name: &'static str,
    session: RTCPairingSession<SimProvider>,
    provider: SimProvider,
    screen: Option<CaptureFrame>,
}

impl Device {
    fn new(name: &'static str, network: &SimNetwork, config: PairingConfiguration) -> Result<Self> {
        let provider = network.provider();
        let session = RTCPairingSession::new(
            config,
            provider.clone(),
            Box::new(ManualCapture::default()),
            Box::new(LogNotifier),
        )?;
        Ok(Device {
            name,
            session,
            provider,
            screen: None,
        })
    }

    /// Feeds pending transport events and timers, then renders new codes.
    fn drive(&mut self, now: Instant, show_codes: bool, module_px: u32) -> Result<Vec<PairingEvent>> {
        while let Some(event) = self.provider.poll_event() {
            trace!("{} <- {:?}", self.name, event.kind);
            self.session.handle_event(event)?;
        }
        if self.session.poll_timeout().is_some_and(|at| at <= now) {
            self.session.handle_timeout(now)?;
        }
        while let Some(code) = self.session.poll_write() {
            println!(
                "{} shows {} code: version {}, {} bytes",
                self.name,
                code.sdp_type,
                code.code.version(),
                code.code.data().len()
            );
            if show_codes {
                println!("{}", code.code.to_unicode());
            }
            self.screen = Some(code.code.to_image(module_px));
        }

        let mut events = vec![];
        while let Some(event) = self.session.poll_event() {
            info!("{} event: {:?}", self.name, event);
            events.push(event);
        }
        Ok(events)
    }

    /// Points this device's camera at `other` for one frame.
    fn look_at(&mut self, other: &Device) -> Result<()> {
        if let Some(frame) = other.screen.as_ref() {
            self.session.handle_read(frame.clone())?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output_log_file = cli.output_log_file;
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        env_logger::Builder::new()
            .target(if !output_log_file.is_empty() {
                Target::Pipe(Box::new(
                    OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(true)
                        .open(output_log_file)?,
                ))
            } else {
                Target::Stdout
            })
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let config = if cli.config_file.is_empty() {
        PairingConfiguration::default()
    } else {
        PairingConfiguration::from_json(&fs::read_to_string(&cli.config_file)?)?
    };

    let (stop_tx, stop_rx) = broadcast::channel::<()>(1);
    println!("Press Ctrl-C to stop");
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });

    if let Err(err) = run(stop_rx, config, cli.message, cli.show_codes, cli.module_px).await {
        eprintln!("run got error: {}", err);
    }

    Ok(())
}

async fn run(
    mut stop_rx: broadcast::Receiver<()>,
    config: PairingConfiguration,
    message: String,
    show_codes: bool,
    module_px: u32,
) -> Result<()> {
    let network = SimNetwork::new();
    let mut initiator = Device::new("initiator", &network, config.clone())?;
    let mut responder = Device::new("responder", &network, config)?;

    initiator.session.begin_as_initiator()?;
    responder.session.begin_as_responder()?;

    let deadline = Instant::now() + DEFAULT_TIMEOUT_DURATION;
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let mut message_sent = false;
    let mut dismissed = 0;

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                println!("received ctrl-c, closing");
                break;
            }
            _ = interval.tick() => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::ErrTimeout.into());
        }

        for event in initiator.drive(now, show_codes, module_px)? {
            match event {
                PairingEvent::Failed(reason) => println!("initiator failed: {reason}"),
                PairingEvent::Dismissed => dismissed += 1,
                _ => {}
            }
        }
        for event in responder.drive(now, show_codes, module_px)? {
            match event {
                PairingEvent::Failed(reason) => println!("responder failed: {reason}"),
                PairingEvent::Dismissed => dismissed += 1,
                _ => {}
            }
        }

        // the initiator presses "Scan Answer" once the answer is on screen
        if initiator.session.phase() == Phase::ShowingOffer
            && responder.session.phase() == Phase::ShowingAnswer
        {
            initiator.session.begin_answer_scan()?;
        }
        responder.look_at(&initiator)?;
        initiator.look_at(&responder)?;

        if initiator.session.phase() == Phase::Connected
            && responder.session.phase() == Phase::Connected
            && !message_sent
        {
            initiator
                .session
                .handle_write(BytesMut::from(message.as_bytes()))?;
            message_sent = true;
        }
        while let Some(msg) = responder.session.poll_read() {
            let text = String::from_utf8_lossy(&msg).to_string();
            println!("responder received: '{text}'");
            responder
                .session
                .handle_write(BytesMut::from(format!("echo: {text}").as_bytes()))?;
        }
        while let Some(msg) = initiator.session.poll_read() {
            println!("initiator received: '{}'", String::from_utf8_lossy(&msg));
        }

        if dismissed == 2 {
            println!("both peers connected and dismissed");
            break;
        }
        if matches!(initiator.session.phase(), Phase::Failed(_))
            || matches!(responder.session.phase(), Phase::Failed(_))
        {
            break;
        }
    }

    initiator.session.close()?;
    responder.session.close()?;

    Ok(())
}
