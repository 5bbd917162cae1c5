use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use liveness_client::detector::CommandDetectorFactory;
use liveness_client::{Config, HttpApi, ManualCapture, WidgetCapture};
use liveness_core::{OperationMode, ReferenceImage, ViewState};
use liveness_hw::{Camera, CameraAccess, V4lCameraAccess};

#[derive(Parser)]
#[command(name = "liveness", about = "Face liveness session client")]
struct Cli {
    /// Backend base URL (overrides LIVENESS_API_BASE_URL)
    #[arg(long, global = true)]
    api: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session through the vendor capture helper
    Widget {
        /// Reference image for identity verification
        #[arg(short, long)]
        reference: Option<PathBuf>,
        /// Operation mode: Passive or PassiveActive
        #[arg(short, long)]
        mode: Option<OperationMode>,
        /// Run the helper without terminal access
        #[arg(long)]
        headless: bool,
    },
    /// Capture a still from the camera and verify it
    Capture {
        /// Operation mode: Passive or PassiveActive
        #[arg(short, long)]
        mode: Option<OperationMode>,
        /// Camera device (overrides LIVENESS_CAMERA_DEVICE)
        #[arg(short, long)]
        device: Option<String>,
        /// Also write the uploaded snapshot to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Write one camera frame to a PNG file
    Snapshot {
        out: PathBuf,
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List camera devices
    Devices {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(api) = cli.api {
        config.api_base_url = api;
    }

    match cli.command {
        Commands::Widget {
            reference,
            mode,
            headless,
        } => run_widget(&config, reference.as_deref(), mode, headless).await,
        Commands::Capture { mode, device, save } => {
            if let Some(device) = device {
                config.camera_device = device;
            }
            run_capture(&config, mode, save.as_deref()).await
        }
        Commands::Snapshot { out, device } => {
            let device = device.unwrap_or(config.camera_device);
            let access = V4lCameraAccess::new(device, config.warmup_frames);
            let mut stream = access.request().await.context("opening camera")?;
            let snapshot = stream.grab().await?.snapshot()?;
            stream.stop();
            std::fs::write(&out, &snapshot.png)
                .with_context(|| format!("writing {}", out.display()))?;
            println!(
                "Wrote {}x{} snapshot to {}",
                snapshot.width,
                snapshot.height,
                out.display()
            );
            Ok(())
        }
        Commands::Devices { json } => {
            let devices = Camera::list_devices();
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No capture devices found");
            } else {
                for d in devices {
                    println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
                }
            }
            Ok(())
        }
    }
}

async fn run_widget(
    config: &Config,
    reference: Option<&Path>,
    mode: Option<OperationMode>,
    headless: bool,
) -> Result<()> {
    let command = config
        .detector_command
        .as_deref()
        .context("no vendor capture helper configured (set LIVENESS_DETECTOR_COMMAND)")?;
    let factory = CommandDetectorFactory::from_command(command)
        .context("LIVENESS_DETECTOR_COMMAND is empty")?;
    let reference = reference.map(load_reference).transpose()?;
    let api = Arc::new(HttpApi::new(config)?);

    let mut widget = WidgetCapture::new(
        api,
        Arc::new(factory),
        mode.unwrap_or(config.operation_mode),
        reference,
        ViewState::default(),
    );
    if headless {
        widget = widget.without_visible_container();
    }

    println!("Capturing... Please follow the instructions.");
    let outcome = widget.start_liveness().await;
    print_view(widget.view())?;
    outcome.context("liveness session failed")?;
    Ok(())
}

async fn run_capture(
    config: &Config,
    mode: Option<OperationMode>,
    save: Option<&Path>,
) -> Result<()> {
    let api = Arc::new(HttpApi::new(config)?);
    let access = V4lCameraAccess::new(config.camera_device.clone(), config.warmup_frames);
    let mut manual = ManualCapture::new(
        api,
        mode.unwrap_or(config.operation_mode),
        ViewState::default(),
    );

    manual.mount(&access).await?;
    let snapshot = manual.capture_frame().await?;
    println!("Captured {}x{} image", snapshot.width, snapshot.height);
    if let Some(path) = save {
        std::fs::write(path, &snapshot.png)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    println!("Processing liveness session...");
    let outcome = manual.start_liveness().await;
    manual.unmount();
    print_view(manual.view())?;
    outcome.context("liveness session failed")?;
    Ok(())
}

fn load_reference(path: &Path) -> Result<ReferenceImage> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reference".to_string());
    Ok(ReferenceImage {
        file_name,
        mime_type: mime_type.to_string(),
        bytes,
    })
}

fn print_view(view: &ViewState) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(view)?);
    Ok(())
}
