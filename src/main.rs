// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! VitalWatch - headless bracelet and monitor clients
//!
//! Runs one client role against an MQTT broker:
//! - `bracelet` publishes simulated vitals every few seconds
//! - `hospital` subscribes and raises the emergency banner
//! - `smartphone` subscribes, shows the latest readings and keeps the event log

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vitalwatch::core::{Event, EventPayload};
use vitalwatch::vitals::publish_topic;
use vitalwatch::{
    BraceletPublisher, Config, DeviceIdentity, EmergencyMonitor, EventBus, EventLog, MetricKind,
    MqttConnector, PubSubSession, ReadingSimulator, Role, SessionConfig, SessionState, VERSION,
};

/// VitalWatch - smart-bracelet health monitoring over MQTT
#[derive(Parser, Debug)]
#[command(name = "vitalwatch")]
#[command(author = "VitalWatch Project")]
#[command(version = VERSION)]
#[command(about = "Smart-bracelet vitals publisher and emergency monitors")]
struct Args {
    /// Client role to run
    #[arg(value_enum)]
    role: RoleArg,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MQTT broker address
    #[arg(long)]
    broker: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    port: Option<String>,

    /// Client identity (generated when omitted)
    #[arg(long)]
    client_id: Option<String>,

    /// Broker username
    #[arg(long)]
    username: Option<String>,

    /// Broker password
    #[arg(long)]
    password: Option<String>,

    /// Subscription topic filter for monitors
    #[arg(long)]
    topic: Option<String>,

    /// Event log file for monitors
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Bracelet publish interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Print display events as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Bracelet,
    Hospital,
    Smartphone,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Bracelet => Role::Bracelet,
            RoleArg::Hospital => Role::Hospital,
            RoleArg::Smartphone => Role::Smartphone,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let role = Role::from(args.role);

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    apply_overrides(&mut config, &args)?;

    // Initialize logging
    let filter = EnvFilter::try_new(config.log_directive(args.debug, args.trace))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("VitalWatch v{} starting as {}", VERSION, role);
    info!("Configuration loaded from {:?}", config_path);

    // Configuration errors surface here, before any connection attempt
    let identity = DeviceIdentity::generate(role);
    let session_config = config.connection.validate(identity)?;
    let device_id = config.bracelet.resolve_device_id(session_config.identity())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(role, config, session_config, device_id, args.json))
}

fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    let connection = &mut config.connection;
    if let Some(broker) = &args.broker {
        connection.broker_address = broker.clone();
    }
    if let Some(port) = &args.port {
        connection.set_port_text(port)?;
    }
    if let Some(client_id) = &args.client_id {
        connection.client_id = Some(client_id.clone());
    }
    if let Some(username) = &args.username {
        connection.username = username.clone();
    }
    if let Some(password) = &args.password {
        connection.password = password.clone();
    }
    if let Some(topic) = &args.topic {
        connection.topic_filter = topic.clone();
    }
    if let Some(log_file) = &args.log_file {
        config.monitor.event_log_path = log_file.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.bracelet.publish_interval_ms = interval_ms;
    }
    Ok(())
}

async fn run(
    role: Role,
    config: Config,
    session_config: SessionConfig,
    device_id: DeviceIdentity,
    json: bool,
) -> Result<()> {
    let bus = Arc::new(EventBus::default());
    let connector = Arc::new(MqttConnector::new(tokio::runtime::Handle::current()));
    let session = Arc::new(PubSubSession::new(role, connector));
    session.add_listener(bus.clone());

    let printer = tokio::spawn(print_events(bus.subscribe_events(), json));
    let connection_events = bus.subscribe_connection();

    let outcome = match role {
        Role::Bracelet => {
            for kind in MetricKind::ALL {
                info!("Publishing {} on {}", kind, publish_topic(device_id.as_str(), kind));
            }

            let publisher = Arc::new(
                BraceletPublisher::new(session.clone(), ReadingSimulator::new(device_id.as_str()))
                    .with_sink(bus.clone()),
            );
            let ticker = publisher.spawn(config.bracelet.publish_interval());
            session.connect(&session_config)?;

            let outcome = wait_for_shutdown(connection_events).await;
            ticker.abort();
            outcome
        }
        Role::Hospital | Role::Smartphone => {
            let mut monitor = EmergencyMonitor::new(
                config.thresholds,
                config.monitor.emergency_policy,
                bus.clone(),
            );
            if config.monitor.logs_emergencies(role) {
                let log = EventLog::open(&config.monitor.event_log_path)?;
                info!("Emergency events logged to {:?}", log.path());
                monitor = monitor.with_event_log(log);
            }
            let monitor = Arc::new(monitor);
            session.set_message_handler(monitor.clone());
            session.connect(&session_config)?;

            let console = (role == Role::Smartphone).then(|| {
                info!("Type 's' and Enter to save a log entry");
                tokio::spawn(save_on_request(monitor.clone()))
            });

            let outcome = wait_for_shutdown(connection_events).await;
            if let Some(console) = console {
                console.abort();
            }
            outcome
        }
    };

    session.disconnect();
    printer.abort();
    info!("VitalWatch shutdown complete");
    outcome
}

/// Wait for Ctrl+C, or fail once the connection attempt is rejected
async fn wait_for_shutdown(mut connection: broadcast::Receiver<SessionState>) -> Result<()> {
    info!("Press Ctrl+C to shutdown");
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal?;
                info!("Shutdown signal received, disconnecting...");
                return Ok(());
            }
            state = connection.recv() => match state {
                Ok(SessionState::Failed) => bail!("connection to broker failed"),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

async fn save_on_request(monitor: Arc<EmergencyMonitor>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().eq_ignore_ascii_case("s") {
            if let Err(e) = monitor.save_log() {
                error!("Saving log failed: {}", e);
            }
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<Event>, json: bool) {
    let mut banner: Option<bool> = None;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Display lagged, {} events skipped", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Could not encode event: {}", e),
            }
            continue;
        }

        match event.payload {
            EventPayload::Metric { kind, value } => {
                println!("Latest {}: {} {}", kind.log_label(), value, kind.unit());
            }
            EventPayload::Emergency(snapshot) => {
                if banner != Some(snapshot.active) {
                    banner = Some(snapshot.active);
                    if snapshot.active {
                        println!("Emergency: Yes");
                    } else {
                        println!("Emergency: Everything is fine");
                    }
                }
            }
            EventPayload::Connection(state) => println!("Connection: {:?}", state),
            EventPayload::Error { message } => println!("Error: {}", message),
        }
    }
}
