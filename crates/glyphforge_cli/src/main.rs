//! glyphforge CLI
//!
//! Build glyph atlases from TrueType fonts and inspect fonts and atlas
//! metadata files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glyphforge_text::{AtlasMetadata, CharEncoding, Font, GlyphAtlas};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{CharsetPreset, EncodingSetting, FillRuleSetting, GlyphforgeConfig, ImageFormatSetting};

#[derive(Parser)]
#[command(name = "glyphforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "TrueType glyph atlas builder", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rasterize a charset into an atlas image and metadata file
    Build(BuildArgs),

    /// Show font metrics and which characters a font maps
    Font {
        /// TrueType font file
        font: PathBuf,

        /// Characters to check (defaults to printable ASCII)
        #[arg(short, long)]
        chars: Option<String>,

        /// Face index inside a font collection
        #[arg(long, default_value = "0")]
        face: u32,
    },

    /// Validate and summarise an atlas metadata file
    Metadata {
        /// Metadata text file
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct BuildArgs {
    /// TrueType font file
    font: PathBuf,

    /// Pixel height of the rasterized glyphs
    #[arg(short, long)]
    size: Option<f32>,

    /// Characters to include
    #[arg(long, conflicts_with = "charset_file")]
    charset: Option<String>,

    /// Read the characters to include from a file
    #[arg(long)]
    charset_file: Option<PathBuf>,

    /// Built-in charset used when no explicit charset is given
    #[arg(long, value_enum)]
    preset: Option<CharsetPreset>,

    /// How charset bytes map to characters
    #[arg(short, long, value_enum)]
    encoding: Option<EncodingSetting>,

    /// Store signed distance fields instead of coverage
    #[arg(long)]
    sdf: bool,

    /// Fill rule for overlapping contours
    #[arg(long, value_enum)]
    fill_rule: Option<FillRuleSetting>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Atlas image format
    #[arg(short, long, value_enum)]
    format: Option<ImageFormatSetting>,

    /// Metadata file path (defaults to `<font>.txt` in the output directory)
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// Skip writing the metadata file
    #[arg(long, conflicts_with = "metadata")]
    no_metadata: bool,

    /// Configuration file (defaults to ./glyphforge.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Build(args) => cmd_build(args),
        Commands::Font { font, chars, face } => cmd_font(&font, chars.as_deref(), face),
        Commands::Metadata { file } => cmd_metadata(&file),
    }
}

fn cmd_build(args: BuildArgs) -> Result<()> {
    let mut config = GlyphforgeConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!("effective configuration:\n{}", config.to_toml()?);
    }

    let charset = match &args.charset_file {
        Some(path) => fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
        None => config
            .atlas
            .charset
            .clone()
            .unwrap_or_else(|| config.atlas.preset.chars().to_string())
            .into_bytes(),
    };
    let encoding = CharEncoding::from(config.atlas.encoding);
    let pixel_height = config.atlas.pixel_height;

    info!(
        "Building atlas from {} at {}px ({} encoding{})",
        args.font.display(),
        pixel_height,
        encoding,
        if config.atlas.sdf { ", sdf" } else { "" }
    );

    let atlas = GlyphAtlas::create_with_config(
        &args.font,
        pixel_height,
        Some(charset.as_slice()),
        encoding,
        config.atlas.sdf,
        &config.atlas.atlas_config(),
    )
    .with_context(|| format!("Failed to build atlas from {}", args.font.display()))?;
    atlas.log_info();

    let stem = args
        .font
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("atlas");
    let directory = &config.output.directory;
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create {}", directory.display()))?;

    let image_path = directory.join(format!("{}.{}", stem, config.output.format.extension()));
    match config.output.format {
        ImageFormatSetting::Png => atlas.save_png(&image_path),
        ImageFormatSetting::Bmp => atlas.save_bmp(&image_path),
    }
    .with_context(|| format!("Failed to write {}", image_path.display()))?;
    info!("Atlas image written to {}", image_path.display());

    if config.output.metadata {
        let metadata_path = args
            .metadata
            .clone()
            .unwrap_or_else(|| directory.join(format!("{stem}.txt")));
        atlas
            .save_metadata(&metadata_path)
            .with_context(|| format!("Failed to write {}", metadata_path.display()))?;
        info!("Metadata written to {}", metadata_path.display());
    }

    let placeholders = atlas
        .chars()
        .iter()
        .filter(|c| c.is_blank() && !c.codepoint.is_whitespace())
        .count();
    if placeholders > 0 {
        warn!("{} characters have no drawable glyph", placeholders);
    }

    Ok(())
}

/// Command-line flags win over the configuration file
fn apply_overrides(config: &mut GlyphforgeConfig, args: &BuildArgs) {
    let atlas = &mut config.atlas;
    if let Some(size) = args.size {
        atlas.pixel_height = size;
    }
    if let Some(preset) = args.preset {
        atlas.preset = preset;
        atlas.charset = None;
    }
    if let Some(charset) = &args.charset {
        atlas.charset = Some(charset.clone());
    }
    if let Some(encoding) = args.encoding {
        atlas.encoding = encoding;
    }
    if let Some(fill_rule) = args.fill_rule {
        atlas.fill_rule = fill_rule;
    }
    atlas.sdf |= args.sdf;

    let output = &mut config.output;
    if let Some(directory) = &args.output {
        output.directory = directory.clone();
    }
    if let Some(format) = args.format {
        output.format = format;
    }
    if args.no_metadata {
        output.metadata = false;
    } else if args.metadata.is_some() {
        output.metadata = true;
    }
}

fn cmd_font(path: &Path, chars: Option<&str>, face: u32) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let font = Font::from_data_with_index(data, face)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let metrics = font.metrics();

    println!("{}", path.display());
    println!("==================");
    println!("Face index:    {}", font.face_index());
    println!("Glyphs:        {}", metrics.num_glyphs);
    println!("Units per em:  {}", metrics.units_per_em);
    println!("Ascender:      {}", metrics.ascender);
    println!("Descender:     {}", metrics.descender);
    println!("Line gap:      {}", metrics.line_gap);
    println!("Line height:   {}", metrics.line_height());
    println!();

    let chars: Vec<char> = chars
        .unwrap_or(glyphforge_text::charset::PRINTABLE_ASCII)
        .chars()
        .collect();
    let mut missing = Vec::new();
    for &c in &chars {
        let glyph = font.find_glyph_index(c);
        if glyph == 0 {
            missing.push(c);
            continue;
        }
        tracing::debug!(
            "{:?} (U+{:04X}): glyph {} advance {} lsb {}",
            c,
            c as u32,
            glyph,
            font.glyph_advance(glyph),
            font.glyph_left_side_bearing(glyph)
        );
    }

    println!("Mapped: {}/{}", chars.len() - missing.len(), chars.len());
    if !missing.is_empty() {
        let listed: Vec<String> = missing
            .iter()
            .map(|c| format!("{:?} (U+{:04X})", c, *c as u32))
            .collect();
        println!("Missing: {}", listed.join(", "));
    }

    Ok(())
}

fn cmd_metadata(path: &Path) -> Result<()> {
    let metadata = AtlasMetadata::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    println!("{}", path.display());
    println!("==================");
    println!("Pixel height:  {:.2}", metadata.pixel_height);
    println!("Atlas size:    {}x{}", metadata.atlas_width, metadata.atlas_height);
    println!("Characters:    {}", metadata.chars.len());
    let blank = metadata.chars.iter().filter(|c| c.is_blank()).count();
    println!("Blank entries: {}", blank);

    let out_of_bounds = metadata.out_of_bounds();
    for c in &out_of_bounds {
        warn!(
            "{:?} (U+{:04X}) at ({}, {}) size {}x{} lies outside the atlas",
            c.codepoint, c.codepoint as u32, c.x, c.y, c.width, c.height
        );
    }
    let overlaps = metadata.overlapping_pairs();
    for (a, b) in &overlaps {
        warn!(
            "{:?} (U+{:04X}) overlaps {:?} (U+{:04X})",
            a.codepoint, a.codepoint as u32, b.codepoint, b.codepoint as u32
        );
    }

    if !out_of_bounds.is_empty() || !overlaps.is_empty() {
        anyhow::bail!(
            "{} entries out of bounds, {} overlapping pairs",
            out_of_bounds.len(),
            overlaps.len()
        );
    }
    println!("Layout:        ok");

    Ok(())
}
