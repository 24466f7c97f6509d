//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use imagelab_ops::PreviewFilter;
use imagelab_ops::preview::DEFAULT_PREVIEW_MAX_SIZE;
use imagelab_session::executor::DEFAULT_MAX_OUTPUT_PIXELS;
use imagelab_session::lab::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SESSION_TTL};
use imagelab_session::{LabSettings, PreviewSettings};

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,imagelab_session=debug,tower_http=debug";

/// Browser-facing image editing sandbox.
///
/// Serves uploads, image operations with per-session undo, and downloads
/// over HTTP. Every option can also be set through the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "imagelab-server", version)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "IMAGELAB_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Directory for uploaded, working and preview images.
    #[arg(long, env = "IMAGELAB_STORAGE_DIR", default_value = "./imagelab-data")]
    pub storage_dir: PathBuf,

    /// Largest accepted upload, in bytes.
    #[arg(long, env = "IMAGELAB_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_upload_bytes: usize,

    /// Longest preview side, in pixels.
    #[arg(long, env = "IMAGELAB_PREVIEW_MAX_SIZE", default_value_t = DEFAULT_PREVIEW_MAX_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    pub preview_max_size: u32,

    /// Preview resampling filter (nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, env = "IMAGELAB_PREVIEW_FILTER", value_enum, default_value_t = Filter::Triangle)]
    pub preview_filter: Filter,

    /// Largest result, in pixels, an operation may grow an image to.
    #[arg(long, env = "IMAGELAB_MAX_OUTPUT_PIXELS", default_value_t = DEFAULT_MAX_OUTPUT_PIXELS, value_parser = clap::builder::RangedU64ValueParser::<u64>::new().range(1..))]
    pub max_output_pixels: u64,

    /// Idle seconds after which a session and its files are removed.
    #[arg(long, env = "IMAGELAB_SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL.as_secs())]
    pub session_ttl_secs: u64,

    /// Seconds between expiry sweeps.
    #[arg(long, env = "IMAGELAB_SWEEP_INTERVAL_SECS", default_value_t = 600, value_parser = clap::builder::RangedU64ValueParser::<u64>::new().range(1..))]
    pub sweep_interval_secs: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "IMAGELAB_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

/// Preview resampling filter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

impl From<Filter> for PreviewFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

impl Config {
    /// Settings for the session layer.
    #[must_use]
    pub fn lab_settings(&self) -> LabSettings {
        LabSettings {
            storage_dir: self.storage_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            preview: PreviewSettings {
                max_size: self.preview_max_size,
                filter: self.preview_filter.into(),
            },
            max_output_pixels: self.max_output_pixels,
            session_ttl: Duration::from_secs(self.session_ttl_secs),
        }
    }

    /// Interval between expiry sweeps.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
