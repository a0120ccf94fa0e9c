//! Command line entry point
//!
//! `run` drives one visitor through the booth. The other subcommands
//! expose single steps for setting up and checking a kiosk.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::console::{BoothConsole, TerminalConsole};
use super::flow::{self, FlowSettings, Kiosk, Outcome, SourceOpener};
use crate::api::{ApiClient, Uploader};
use crate::capture::image::timestamped_path;
use crate::capture::{CameraSource, CaptureSession, CapturedImage, FileSource, FrameSource};
use crate::config::{BoothConfig, CameraConfig};
use crate::domain::Route;

#[derive(Parser, Debug)]
#[command(name = "snapbooth")]
#[command(author, version, about = "Photo booth kiosk for the gallery service", long_about = None)]
pub struct Cli {
    /// Base url of the gallery API (overrides the config file)
    #[arg(long = "api", global = true, env = "SNAPBOOTH_API_ENDPOINT")]
    pub api_endpoint: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run a booth session (default)
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Do not ask for consent before using the camera
        #[arg(long)]
        skip_consent: bool,
    },

    /// Capture one frame and save it as PNG
    Capture {
        /// Output file (defaults to a timestamped file in the save location)
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Upload an image file and print its identifier
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Wait for the result of an upload
    Display {
        /// Upload identifier or `/image/{uuid}` route
        #[arg(value_name = "UUID")]
        target: String,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceArgs {
    /// Camera device node (overrides the config file)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Read frames from an image file instead of a camera
    #[arg(long, value_name = "FILE", conflicts_with = "device")]
    pub image: Option<PathBuf>,
}

impl Cli {
    /// Load the config file and apply command line overrides
    pub fn effective_config(&self) -> BoothConfig {
        let mut config = BoothConfig::load(self.config.as_deref());
        if let Some(endpoint) = &self.api_endpoint {
            config.api_endpoint = endpoint.clone();
        }
        if let Some(Commands::Run { source, .. } | Commands::Capture { source, .. }) = &self.command
        {
            if let Some(device) = &source.device {
                config.camera.device = device.clone();
            }
        }
        if let Some(Commands::Run { skip_consent: true, .. }) = &self.command {
            config.consent_required = false;
        }
        config
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.effective_config();
    log::debug!("Effective config: {:?}", config);

    match cli.command.clone().unwrap_or(Commands::Run {
        source: SourceArgs::default(),
        skip_consent: false,
    }) {
        Commands::Run { source, .. } => run_session(&config, source).await,
        Commands::Capture { output, source } => capture_once(&config, source, output),
        Commands::Upload { file } => upload_file(&config, &file).await,
        Commands::Display { target } => display(&config, &target).await,
        Commands::Config { save } => show_config(&cli, &config, save),
    }
}

fn client(config: &BoothConfig) -> Result<Arc<ApiClient>> {
    let client = ApiClient::new(&config.api_endpoint, config.request_timeout())?;
    Ok(Arc::new(client))
}

fn source_opener(camera: CameraConfig, image: Option<PathBuf>) -> SourceOpener {
    Box::new(move || match &image {
        Some(path) => Ok(Box::new(FileSource::new(path.clone())) as Box<dyn FrameSource>),
        None => Ok(Box::new(CameraSource::open(&camera)?) as Box<dyn FrameSource>),
    })
}

async fn run_session(config: &BoothConfig, source: SourceArgs) -> Result<()> {
    let backend = client(config)?;
    let uploader = Uploader::new(backend.clone(), config.retry);
    let opener = source_opener(config.camera.clone(), source.image);
    let mut kiosk = Kiosk::new(
        backend,
        uploader,
        opener,
        TerminalConsole::new(),
        FlowSettings::from(config),
    );

    match kiosk.run().await? {
        Outcome::Declined => log::info!("Visitor declined consent"),
        Outcome::Abandoned => log::info!("Visitor left before uploading"),
        Outcome::Completed { uuid, ready, saved } => {
            log::info!("Session for {} completed after {:?}", uuid, ready.after);
            if let Some(path) = saved {
                log::info!("Result kept at {}", path.display());
            }
        }
    }
    let navigator = kiosk.navigator();
    log::debug!(
        "Visited {}",
        navigator
            .history()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    if let Some(route) = navigator.current() {
        log::info!("Session ended on {}", route);
    }
    Ok(())
}

fn capture_once(config: &BoothConfig, source: SourceArgs, output: Option<PathBuf>) -> Result<()> {
    let mut opener = source_opener(config.camera.clone(), source.image);
    let mut session = CaptureSession::new(opener()?);
    let image = session.capture()?;

    let path = match output {
        Some(path) => path,
        None => timestamped_path(config.save_location.unwrap_or_default(), "")
            .context("No folder available to save the capture")?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    image
        .save(&path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

async fn upload_file(config: &BoothConfig, file: &Path) -> Result<()> {
    let image = CapturedImage::from_file(file)?;
    let uploader = Uploader::new(client(config)?, config.retry);
    let mut console = TerminalConsole::new();

    let uuid = flow::upload_with_progress(&uploader, &mut console, &image).await?;
    console.say("Upload complete.");
    println!("{}", uuid);
    Ok(())
}

/// Accept a bare identifier or an `/image/{uuid}` route
fn parse_target(target: &str) -> Result<String> {
    let target = target.trim();
    if target.starts_with('/') {
        return match Route::from_path(target) {
            Some(Route::Image(uuid)) => Ok(uuid),
            _ => bail!("Not an image route: {}", target),
        };
    }
    if target.is_empty() {
        bail!("Upload identifier must not be empty");
    }
    Ok(target.to_string())
}

async fn display(config: &BoothConfig, target: &str) -> Result<()> {
    let uuid = parse_target(target)?;
    let settings = FlowSettings::from(config);
    let mut console = TerminalConsole::new();

    let (ready, secs) =
        flow::wait_for_result(client(config)?, &uuid, settings.poll, &mut console).await?;
    let saved = flow::keep_copy(
        Some(config.save_location.unwrap_or_default()),
        &ready.image.bytes,
        "_result",
    );
    console.show_result(&ready, secs, saved.as_deref());
    println!("{}", ready.image.url);
    Ok(())
}

fn show_config(cli: &Cli, config: &BoothConfig, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        let path = cli
            .config
            .clone()
            .or_else(BoothConfig::default_path)
            .context("No config directory available")?;
        config.save_to(&path)?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["snapbooth"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "snapbooth",
            "display",
            "/image/abc",
            "--api",
            "https://gallery.test",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.api_endpoint.as_deref(), Some("https://gallery.test"));
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Some(Commands::Display {
                target: "/image/abc".into()
            })
        );
    }

    #[test]
    fn test_device_and_image_conflict() {
        let parsed = Cli::try_parse_from([
            "snapbooth",
            "run",
            "--device",
            "/dev/video2",
            "--image",
            "face.png",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cli = Cli::try_parse_from([
            "snapbooth",
            "--config",
            path.to_str().unwrap(),
            "--api",
            "https://gallery.test",
            "run",
            "--device",
            "/dev/video2",
            "--skip-consent",
        ])
        .unwrap();

        let config = cli.effective_config();
        assert_eq!(config.api_endpoint, "https://gallery.test");
        assert_eq!(config.camera.device, "/dev/video2");
        assert!(!config.consent_required);
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("abc").unwrap(), "abc");
        assert_eq!(parse_target("/image/2024010112-9f8e7d6c").unwrap(), "2024010112-9f8e7d6c");
        assert!(parse_target("/photo/take").is_err());
        assert!(parse_target("  ").is_err());
    }

    #[test]
    fn test_capture_from_file_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("face.png");
        image::RgbaImage::from_pixel(8, 6, image::Rgba([10, 20, 30, 255]))
            .save(&input)
            .unwrap();
        let output = dir.path().join("out").join("shot.png");

        let source = SourceArgs {
            device: None,
            image: Some(input),
        };
        capture_once(&BoothConfig::default(), source, Some(output.clone())).unwrap();

        let saved = image::open(&output).unwrap();
        assert_eq!((saved.width(), saved.height()), (8, 6));
    }
}
