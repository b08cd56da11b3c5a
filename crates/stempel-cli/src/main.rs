// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stempel — QR stamping for PDFs and images
//
// Entry point. Initialises logging, parses the command line, and runs the
// requested command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use stempel_core::config::{FileOverrides, ProcessorConfig, QrOverrides};
use stempel_core::{EccLevel, EncodeMode, PdfMetadata, PixelSize, StampPosition};
use stempel_document::{IconQrGenerator, PdfProcessor};

#[derive(Parser)]
#[command(
    name = "stempel",
    about = "Stamp PDFs with icon-overlaid QR codes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a QR code PNG with an icon in the middle
    Qr {
        /// Text to encode
        data: String,

        /// Icon image placed at the centre
        #[arg(short, long)]
        icon: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        qr: QrArgs,
    },

    /// Stamp a PDF or image, set its properties, and keep its password
    Process {
        /// Input file (.pdf, .jpg, .jpeg, .png)
        file: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stamp image
        #[arg(short, long, conflicts_with = "qr_data")]
        stamp: Option<PathBuf>,

        /// Stamp position: tl, tc, tr, l, c, r, bl, bc, br
        #[arg(short, long)]
        position: Option<StampPosition>,

        /// Password of a protected PDF
        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        subject: Option<String>,

        /// Path to the pdfcpu executable
        #[arg(long)]
        pdfcpu: Option<PathBuf>,

        /// Also write the resulting PDF, base64 encoded, to this file
        #[arg(long)]
        base64_out: Option<PathBuf>,

        /// Generate the stamp as a QR code of this text
        #[arg(long, requires = "qr_icon")]
        qr_data: Option<String>,

        /// Icon for the generated QR stamp
        #[arg(long, requires = "qr_data")]
        qr_icon: Option<PathBuf>,

        #[command(flatten)]
        qr: QrArgs,
    },
}

/// QR generator settings shared by both commands.
#[derive(Args)]
struct QrArgs {
    /// QR image edge length in pixels
    #[arg(long)]
    size: Option<u32>,

    /// Icon edge length in pixels
    #[arg(long)]
    icon_size: Option<u32>,

    /// Error-correction level: low, medium, quartile, high
    #[arg(long)]
    ecc: Option<EccLevel>,

    /// Encoding mode: auto, numeric, alphanumeric, byte
    #[arg(long)]
    mode: Option<EncodeMode>,

    /// Light border in modules
    #[arg(long)]
    quiet_zone: Option<u32>,
}

impl QrArgs {
    fn overrides(&self) -> QrOverrides {
        QrOverrides {
            qr_size: self.size.map(PixelSize::square),
            icon_size: self.icon_size.map(PixelSize::square),
            ecc: self.ecc,
            mode: self.mode,
            quiet_zone: self.quiet_zone,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!("Stempel starting");

    match cli.command {
        Commands::Qr {
            data,
            icon,
            output,
            config,
            qr,
        } => {
            let config = load_config(config)?;
            let generator = IconQrGenerator::new(config.qr.merge(qr.overrides()));
            let written = generator
                .generate(&data, &icon, &output)
                .with_context(|| format!("generating QR code {}", output.display()))?;
            println!("{}", written.display());
        }

        Commands::Process {
            file,
            config,
            stamp,
            position,
            password,
            title,
            author,
            subject,
            pdfcpu,
            base64_out,
            qr_data,
            qr_icon,
            qr,
        } => {
            let mut config = load_config(config)?;
            if let Some(binary) = pdfcpu {
                config.pdfcpu_binary = binary;
            }

            // Holds a generated stamp until processing is done.
            let scratch = tempfile::tempdir().context("creating scratch directory")?;
            let stamp = match (qr_data, qr_icon) {
                (Some(data), Some(icon)) => {
                    let path = scratch.path().join("stamp.png");
                    IconQrGenerator::new(config.qr.merge(qr.overrides()))
                        .generate(&data, &icon, &path)
                        .context("generating QR stamp")?;
                    Some(path)
                }
                _ => stamp,
            };

            let outcome = PdfProcessor::from_config(&file, &config)
                .with_file_options(FileOverrides {
                    password,
                    stamp_image: stamp,
                    stamp_position: position,
                })
                .with_metadata(PdfMetadata {
                    title,
                    author,
                    subject,
                })
                .process_file()
                .with_context(|| format!("processing {}", file.display()))?;

            if let Some(path) = base64_out {
                std::fs::write(&path, &outcome.base64)
                    .with_context(|| format!("writing {}", path.display()))?;
            }

            let summary = serde_json::json!({
                "pdf": outcome.pdf_path,
                "was_protected": outcome.was_protected,
                "sha256": outcome.sha256,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<ProcessorConfig> {
    match path {
        Some(path) => ProcessorConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ProcessorConfig::default()),
    }
}
