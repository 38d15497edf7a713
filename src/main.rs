//! CLI entry point for `usps-mail`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use base64::Engine as _;
use clap::{CommandFactory, Parser, Subcommand};

use usps_mail::camera::{self, Camera, FrameWriter, LocalFileCamera, MailCamera};
use usps_mail::config::{self, CameraSource, Config};
use usps_mail::mailbox::session::{ImapConnector, SessionSettings};
use usps_mail::model::image::{load_fallback, sniff_content_type};
use usps_mail::model::scan::{ScanHandle, ScanResult, ScanSummary};
use usps_mail::model::sensor::SensorState;
use usps_mail::publish::{self, StatePublisher};
use usps_mail::scanner::MailScanner;
use usps_mail::service::Service;

#[derive(Parser)]
#[command(
    name = "usps-mail",
    version,
    about = "Count today's USPS Informed Delivery mail and packages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $USPS_MAIL_CONFIG, then the user config dir)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan at startup and on every interval, publishing sensor states
    Run,
    /// Run one scan and print the result
    Scan {
        #[arg(long)]
        json: bool,
        /// Embed the images as base64 in the JSON output
        #[arg(long, requires = "json")]
        images: bool,
    },
    /// Run one scan and write a camera frame to a file
    Frame {
        #[arg(short, long)]
        output: PathBuf,
        /// Which frame of the rotation to write (0 is the first)
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
    /// Load and validate the configuration
    CheckConfig,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // These two need no configuration.
    match cli.command {
        Commands::Completions { shell } => return cmd_completions(shell),
        Commands::Manpage => return cmd_manpage(),
        _ => {}
    }

    let config = config::load_config(cli.config.as_deref())?;

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Run => cmd_run(&config),
        Commands::Scan { json, images } => cmd_scan(&config, json, images),
        Commands::Frame { output, index } => cmd_frame(&config, &output, index),
        Commands::CheckConfig => cmd_check_config(&config),
        Commands::Completions { .. } | Commands::Manpage => Ok(()),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, config::LOG_FILE_NAME);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "usps-mail", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Everything a scan cycle needs, wired from the configuration.
struct App {
    scanner: MailScanner<ImapConnector>,
    handle: ScanHandle,
    publisher: Arc<dyn StatePublisher>,
}

impl App {
    fn build(config: &Config) -> anyhow::Result<Self> {
        let settings = SessionSettings::from_config(&config.account)?;
        let publisher = publish::from_config(&config.publish)?;
        let fallback = load_fallback(
            config
                .camera
                .default_image_path(config.config_dir())
                .as_deref(),
        );
        let handle = ScanHandle::new(ScanResult::placeholder(&fallback));
        let scanner = MailScanner::new(
            ImapConnector::new(settings),
            handle.clone(),
            publisher.clone(),
            fallback,
        );
        Ok(Self {
            scanner,
            handle,
            publisher,
        })
    }
}

/// Build the configured camera. The file camera is also returned on its own
/// so the service can route path updates to it.
fn build_camera(
    config: &Config,
    handle: &ScanHandle,
) -> anyhow::Result<(Arc<dyn Camera>, Option<Arc<LocalFileCamera>>)> {
    let name = config.camera.name.as_str();
    match config.camera.source {
        CameraSource::Mail => {
            let camera: Arc<dyn Camera> = Arc::new(MailCamera::new(name, handle.clone()));
            Ok((camera, None))
        }
        CameraSource::File => {
            let path = config
                .camera
                .file_path
                .clone()
                .context("camera.file_path is required when camera.source = \"file\"")?;
            let file_camera = Arc::new(LocalFileCamera::new(name, path));
            let camera: Arc<dyn Camera> = file_camera.clone();
            Ok((camera, Some(file_camera)))
        }
    }
}

/// Run the service loop until the process is stopped.
fn cmd_run(config: &Config) -> anyhow::Result<()> {
    let app = App::build(config)?;
    let (mut service, control) =
        Service::new(app.scanner, config.scan.interval(), app.publisher.clone());

    let mut writer = None;
    if config.camera.enabled {
        let (camera, file_camera) = build_camera(config, &app.handle)?;
        if let Some(file_camera) = file_camera {
            service = service.with_file_camera(file_camera);
        }
        if let Err(e) = app
            .publisher
            .set_state(&SensorState::camera(camera.name(), camera.attributes()))
        {
            tracing::warn!(error = %e, "Could not publish camera state");
        }
        match &config.camera.output_path {
            Some(output) => {
                writer = Some(FrameWriter::spawn(
                    camera,
                    output.clone(),
                    config.camera.refresh(),
                )?);
            }
            None => tracing::info!("camera.output_path not set, frames are not written"),
        }
    }

    let stats = service.run();
    drop(control);
    if let Some(writer) = writer {
        writer.shutdown();
    }
    tracing::info!(?stats, "Exiting");
    Ok(())
}

/// Run one scan and print the counts.
fn cmd_scan(config: &Config, json: bool, with_images: bool) -> anyhow::Result<()> {
    let app = App::build(config)?;
    let summary = app.scanner.scan().context("mail scan failed")?;

    if json {
        print_scan_json(&summary, &app.handle, with_images)?;
    } else {
        print_scan_table(config, &summary);
    }
    Ok(())
}

/// Run one scan and write the `index`-th frame of the rotation.
fn cmd_frame(config: &Config, output: &Path, index: usize) -> anyhow::Result<()> {
    let app = App::build(config)?;
    let (camera, _) = build_camera(config, &app.handle)?;
    if matches!(config.camera.source, CameraSource::Mail) {
        app.scanner.scan().context("mail scan failed")?;
    }

    // Frames before `index` are consumed and discarded.
    for _ in 0..index {
        camera.camera_image();
    }
    if !camera::writer::write_frame(camera.as_ref(), output)? {
        anyhow::bail!("camera '{}' has no image to write", camera.name());
    }
    println!("  Wrote frame {} to {}", index, output.display());
    Ok(())
}

/// Print the resolved configuration without secrets.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    let settings = SessionSettings::from_config(&config.account)?;

    println!();
    println!("  {:<20} {}:{}", "Server", settings.host, settings.port);
    println!("  {:<20} {}", "Account", settings.username);
    println!("  {:<20} {}", "Folder", settings.folder);
    println!("  {:<20} {}s", "Scan interval", config.scan.interval_secs);
    println!("  {:<20} {:?}", "Publish backend", config.publish.backend);
    if config.camera.enabled {
        println!(
            "  {:<20} {} ({:?})",
            "Camera", config.camera.name, config.camera.source
        );
        let fallback = config
            .camera
            .default_image_path(config.config_dir())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string());
        println!("  {:<20} {}", "Placeholder image", fallback);
    } else {
        println!("  {:<20} disabled", "Camera");
    }
    println!(
        "  {:<20} {}",
        "Log file",
        config::log_file_path(config).display()
    );
    println!();
    println!("  Configuration OK");
    Ok(())
}

/// Print a scan summary as a human-readable table.
fn print_scan_table(config: &Config, summary: &ScanSummary) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Account", config.account.email);
    println!(
        "  {:<20} {}",
        "Scanned at",
        summary.scanned_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  {:<20} {}", "Letters", summary.letters);
    println!("  {:<20} {}", "Packages", summary.packages);
    if summary.used_placeholder {
        println!("  {:<20} none (placeholder shown)", "Images");
    } else {
        println!(
            "  {:<20} {} ({})",
            "Images",
            summary.images,
            format_size(summary.image_bytes, BINARY)
        );
    }
    println!("  {:<20} {} ms", "Scan time", summary.elapsed_ms);
    println!();
}

/// Print a scan summary as JSON, optionally with the images inlined.
fn print_scan_json(
    summary: &ScanSummary,
    handle: &ScanHandle,
    with_images: bool,
) -> anyhow::Result<()> {
    let mut output = serde_json::to_value(summary)?;

    if with_images {
        let result = handle.snapshot();
        let images: Vec<serde_json::Value> = result
            .images()
            .iter()
            .enumerate()
            .map(|(i, data)| {
                serde_json::json!({
                    "index": i,
                    "content_type": sniff_content_type(data),
                    "size": data.len(),
                    "data": base64::engine::general_purpose::STANDARD.encode(data),
                })
            })
            .collect();
        output["image_data"] = serde_json::Value::Array(images);
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
