use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fras_client::{HttpClient, Registration, WalletAddress};
use fras_core::face::{FaceEncoder, FaceLocator, OnnxFaceDescriber};
use fras_core::hands::HandLandmarker;
use fras_core::{Embedding, FaceDescriber};
use fras_hw::{Camera, FrameFeed, NullPresenter, PreviewWriter};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod reporter;
mod session;

use config::Config;
use engine::{DescriptorHandle, GestureAdapter};
use reporter::StatusReporter;
use session::{Session, SessionError};

#[derive(Parser)]
#[command(name = "fras", about = "Gesture-triggered face recognition attendance")]
struct Cli {
    /// Attendance service base URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,
    /// V4L2 device path (overrides config)
    #[arg(long, global = true)]
    device: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the camera and check in whoever raises a hand
    Watch,
    /// Capture a face and register a student
    Register {
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        name: String,
        /// Reward wallet account id (0.0.xxxx)
        #[arg(long)]
        wallet: Option<String>,
        /// Reward network (e.g. "testnet")
        #[arg(long)]
        network: Option<String>,
    },
    /// Show recent attendance records
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// List video capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(device) = cli.device {
        config.camera_device = device;
    }

    match cli.command {
        Commands::Watch => watch(config).await,
        Commands::Register {
            student_id,
            name,
            wallet,
            network,
        } => register(config, student_id, name, wallet, network).await,
        Commands::History { limit } => history(config, limit).await,
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
            Ok(())
        }
    }
}

fn load_describer(config: &Config) -> Result<OnnxFaceDescriber> {
    let locator = FaceLocator::load(&config.face_locator_path(), config.face_confidence)
        .context("loading face locator")?;
    let encoder = FaceEncoder::load(&config.face_encoder_path()).context("loading face encoder")?;
    Ok(OnnxFaceDescriber::new(locator, encoder))
}

async fn watch(config: Config) -> Result<()> {
    tracing::info!(device = %config.camera_device, server = %config.server_url, "fras starting");
    println!("Loading models...");

    let hands = HandLandmarker::load(&config.hand_model_path(), config.hand_confidence)
        .context("loading hand landmark model")?;
    let gestures = GestureAdapter::spawn(hands)?;
    let descriptor = DescriptorHandle::spawn(load_describer(&config)?)?;
    let client = HttpClient::new(&config.server_url, config.request_timeout())?;

    let camera = Camera::open(&config.camera_device)
        .map_err(|e| SessionError::DeviceUnavailable(e.to_string()))?;
    let feed = match &config.preview_path {
        Some(path) => FrameFeed::start(camera, PreviewWriter::new(path, config.preview_every))?,
        None => FrameFeed::start(camera, NullPresenter)?,
    };

    let session = Session::new(
        gestures,
        descriptor,
        Arc::new(client),
        config.cooldown(),
        config.describe_timeout(),
        StatusReporter::new(std::io::stdout()),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    session.run(feed, shutdown).await?;

    tracing::info!("fras stopped");
    Ok(())
}

async fn register(
    config: Config,
    student_id: String,
    name: String,
    wallet: Option<String>,
    network: Option<String>,
) -> Result<()> {
    let student_id = student_id.trim().to_string();
    let name = name.trim().to_string();
    if student_id.is_empty() || name.is_empty() {
        bail!("student id and name must not be empty");
    }
    let wallet = wallet
        .map(|w| w.parse::<WalletAddress>())
        .transpose()?
        .map(|w| w.to_string());

    let client = HttpClient::new(&config.server_url, config.request_timeout())?;

    println!("Look at the camera...");
    let embedding = tokio::task::spawn_blocking(move || capture_embedding(&config)).await??;

    let reply = client
        .register(&Registration {
            student_id: student_id.clone(),
            name: name.clone(),
            embedding,
            wallet,
            network,
        })
        .await?;

    if !reply.ok {
        bail!(
            "registration rejected: {}",
            reply.detail.unwrap_or_else(|| "no reason given".into())
        );
    }
    println!("Registered {name} ({student_id})");
    Ok(())
}

/// Warm the camera up, then describe the first frame that contains a face.
fn capture_embedding(config: &Config) -> Result<Embedding> {
    let mut describer = load_describer(config)?;
    let camera = Camera::open(&config.camera_device)
        .map_err(|e| SessionError::DeviceUnavailable(e.to_string()))?;

    camera.discard_frames(config.warmup_frames)?;
    let (frames, dark_skipped) = camera.capture_frames(config.frames_per_register)?;
    if dark_skipped > 0 {
        tracing::debug!(dark_skipped, "skipped dark frames");
    }

    for frame in &frames {
        if let Some(raw) = describer.describe_face(&frame.data, frame.width, frame.height)? {
            return Ok(Embedding::new(raw)?);
        }
    }
    bail!("no face found in {} captured frames", frames.len())
}

async fn history(config: Config, limit: u32) -> Result<()> {
    let client = HttpClient::new(&config.server_url, config.request_timeout())?;
    let records = client.attendance_history(limit).await?;
    if records.is_empty() {
        println!("No attendance records");
        return Ok(());
    }
    for r in records {
        let reward = if r.txid.is_some() { " (rewarded)" } else { "" };
        println!(
            "{}  {:<12} {}{reward}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.student_id,
            r.unit
        );
    }
    Ok(())
}
