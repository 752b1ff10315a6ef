use crate::error::ConfigError;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ConstellationStyle {
    Shape,
    Line,
    Both,
}

impl ConstellationStyle {
    pub(crate) fn fills(self) -> bool {
        matches!(self, ConstellationStyle::Shape | ConstellationStyle::Both)
    }
    pub(crate) fn strokes(self) -> bool {
        matches!(self, ConstellationStyle::Line | ConstellationStyle::Both)
    }
}

/// How constellation members are drawn while the path is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HighlightStyle {
    /// Grow and dissolve.
    Burst,
    /// Grow, shrink back and hold.
    Pulse,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FieldConfig {
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) margin: f64,
    pub(crate) particle_count: usize,
    pub(crate) bin_count: usize,
    /// Vertical rise per particle already stacked in the same bin.
    pub(crate) stack_step: f64,
    /// Samples in `[-sigma_range, sigma_range]` span the margins.
    pub(crate) sigma_range: f64,
    pub(crate) spread: (f64, f64),
    pub(crate) skew: (f64, f64),
    /// Per-frame blend toward the target; not scaled by frame time.
    pub(crate) ease_factor: f64,
    pub(crate) arrival_epsilon: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 3200.0,
            height: 1700.0,
            margin: 100.0,
            particle_count: 25_000,
            bin_count: 50,
            stack_step: 1.0,
            sigma_range: 3.0,
            spread: (0.8, 1.2),
            skew: (-0.3, 0.3),
            ease_factor: 0.05,
            arrival_epsilon: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TimingConfig {
    pub(crate) animation_ms: f64,
    pub(crate) pause_ms: f64,
    /// Time for the path to grow to full length.
    pub(crate) reveal_ms: f64,
    /// Keep building fresh constellations on a frozen field.
    pub(crate) rotate_when_frozen: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            animation_ms: 6000.0,
            pause_ms: 8000.0,
            reveal_ms: 1000.0,
            rotate_when_frozen: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FadeConfig {
    pub(crate) fade_delay_ms: f64,
    pub(crate) fade_duration_ms: f64,
    pub(crate) dim_duration_ms: f64,
    pub(crate) dim_alpha: f64,
    pub(crate) highlight_ms: f64,
    pub(crate) highlight: HighlightStyle,
    pub(crate) peak_size: f64,
    pub(crate) hold_size: f64,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            fade_delay_ms: 2000.0,
            fade_duration_ms: 30_000.0,
            dim_duration_ms: 3000.0,
            dim_alpha: 50.0,
            highlight_ms: 1000.0,
            highlight: HighlightStyle::Burst,
            peak_size: 20.0,
            hold_size: 4.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ConstellationConfig {
    pub(crate) min_candidates: usize,
    pub(crate) path_length: usize,
    /// Consecutive members are farther apart than `width / min_distance_divisor`.
    pub(crate) min_distance_divisor: f64,
    pub(crate) section_mean_frac: f64,
    pub(crate) section_sd_frac: f64,
    pub(crate) section_min_frac: f64,
    pub(crate) section_max_frac: f64,
    /// Probability of re-drawing the section start nearer the centre.
    pub(crate) central_bias: f64,
}

impl Default for ConstellationConfig {
    fn default() -> Self {
        Self {
            min_candidates: 30,
            path_length: 30,
            min_distance_divisor: 15.0,
            section_mean_frac: 0.33,
            section_sd_frac: 0.67,
            section_min_frac: 0.2,
            section_max_frac: 0.9,
            central_bias: 0.5,
        }
    }
}

impl ConstellationConfig {
    pub(crate) fn min_distance(&self, width: f64) -> f64 {
        width / self.min_distance_divisor
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RenderConfig {
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) style: ConstellationStyle,
    pub(crate) dot_size: f64,
    pub(crate) connection_alpha: f64,
    pub(crate) shape_alpha: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps_cap: 30,
            enable_color: true,
            style: ConstellationStyle::Both,
            dot_size: 2.0,
            connection_alpha: 60.0,
            shape_alpha: 30.0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) seed: Option<u64>,
    pub(crate) field: FieldConfig,
    pub(crate) timing: TimingConfig,
    pub(crate) fade: FadeConfig,
    pub(crate) constellation: ConstellationConfig,
    pub(crate) render: RenderConfig,
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn ordered(field: &'static str, (min, max): (f64, f64)) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::EmptyRange { field, min, max })
    }
}

fn within(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl Settings {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.field;
        positive("field.width", f.width)?;
        positive("field.height", f.height)?;
        within("field.margin", f.margin, 0.0, f.width.min(f.height) / 2.0)?;
        if f.bin_count == 0 {
            return Err(ConfigError::ZeroBins);
        }
        positive("field.sigma_range", f.sigma_range)?;
        ordered("field.spread", f.spread)?;
        ordered("field.skew", f.skew)?;
        within("field.ease_factor", f.ease_factor, f64::MIN_POSITIVE, 1.0)?;
        positive("field.arrival_epsilon", f.arrival_epsilon)?;

        let t = &self.timing;
        positive("timing.animation_ms", t.animation_ms)?;
        positive("timing.pause_ms", t.pause_ms)?;
        positive("timing.reveal_ms", t.reveal_ms)?;

        let fd = &self.fade;
        positive("fade.fade_duration_ms", fd.fade_duration_ms)?;
        positive("fade.dim_duration_ms", fd.dim_duration_ms)?;
        positive("fade.highlight_ms", fd.highlight_ms)?;
        within("fade.dim_alpha", fd.dim_alpha, 0.0, 255.0)?;
        positive("fade.peak_size", fd.peak_size)?;
        within("fade.hold_size", fd.hold_size, 0.0, fd.peak_size)?;

        let c = &self.constellation;
        positive("constellation.min_distance_divisor", c.min_distance_divisor)?;
        positive("constellation.path_length", c.path_length as f64)?;
        ordered(
            "constellation.section_frac",
            (c.section_min_frac, c.section_max_frac),
        )?;
        within("constellation.section_max_frac", c.section_max_frac, 0.0, 1.0)?;
        within("constellation.central_bias", c.central_bias, 0.0, 1.0)?;

        within("render.connection_alpha", self.render.connection_alpha, 0.0, 255.0)?;
        within("render.shape_alpha", self.render.shape_alpha, 0.0, 255.0)?;
        Ok(())
    }
}

/* -----------------------------
   Command line
------------------------------ */

#[derive(Parser, Debug, Default)]
#[command(about = "Histogram particle field that periodically draws constellations")]
pub(crate) struct Args {
    /// settings file (JSON); defaults to the per-user config file if present
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// seed for a reproducible run
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// number of particles per run
    #[arg(long)]
    pub(crate) particles: Option<usize>,

    /// logical field width
    #[arg(long)]
    pub(crate) width: Option<f64>,

    /// logical field height
    #[arg(long)]
    pub(crate) height: Option<f64>,

    /// frame cap
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// constellation drawing style
    #[arg(long, value_enum)]
    pub(crate) style: Option<ConstellationStyle>,

    /// monochrome output
    #[arg(long)]
    pub(crate) no_color: bool,

    /// append log records to this file
    #[arg(long)]
    pub(crate) log_file: Option<PathBuf>,

    /// print the effective settings as JSON and exit
    #[arg(long)]
    pub(crate) print_config: bool,
}

impl Args {
    pub(crate) fn apply(&self, s: &mut Settings) {
        if let Some(seed) = self.seed {
            s.seed = Some(seed);
        }
        if let Some(n) = self.particles {
            s.field.particle_count = n;
        }
        if let Some(w) = self.width {
            s.field.width = w;
        }
        if let Some(h) = self.height {
            s.field.height = h;
        }
        if let Some(fps) = self.fps {
            s.render.fps_cap = fps;
        }
        if let Some(style) = self.style {
            s.render.style = style;
        }
        if self.no_color {
            s.render.enable_color = false;
        }
    }
}

/* -----------------------------
   Loading
------------------------------ */

pub(crate) fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "constellation", "Constellation")
        .map(|proj| proj.config_dir().join("settings.json"))
}

pub(crate) fn parse_settings(text: &str) -> Result<Settings> {
    let s: Settings = serde_json::from_str(text).context("settings are not valid JSON")?;
    Ok(s)
}

fn read_settings(path: &Path) -> Result<Settings> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_settings(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Explicit paths must load; the per-user file falls back to defaults.
pub(crate) fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return read_settings(path);
    }
    match default_settings_path() {
        Some(path) if path.exists() => match read_settings(&path) {
            Ok(s) => Ok(s),
            Err(e) => {
                log::warn!("ignoring {}: {e:#}", path.display());
                Ok(Settings::default())
            }
        },
        _ => Ok(Settings::default()),
    }
}

pub(crate) fn resolve(args: &Args) -> Result<Settings> {
    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}
