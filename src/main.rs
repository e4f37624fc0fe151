use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use bannerly::capture::PixelSize;
use bannerly::catalog::TechCatalog;
use bannerly::config::BannerConfig;
use bannerly::error_codes::{find_coded_error, CodedError, CodedErrorKind};
use bannerly::export::{DirectorySink, ExportedImage, SnapshotExporter};
use bannerly::images::{AssetRoot, ImageSource, LocalImageSource};
use bannerly::layout::{resolve_layout, RenderedBanner};
use bannerly::profile::{load_profile, LoadedProfile};
use bannerly::raster::SkiaRasterizer;
use bannerly::session::BannerSession;
use bannerly::share::{build_share_url, ShareContentMode, ShareTarget};
use bannerly::text::discover_font;
use bannerly::theme::{LayoutChoice, LayoutKind, Theme, Variant};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BANNERLY_GIT_HASH"),
    ")"
);
const SHARE_TARGETS: [ShareTarget; 3] = [
    ShareTarget::Twitter,
    ShareTarget::Facebook,
    ShareTarget::LinkedIn,
];

#[derive(Debug, Parser)]
#[command(name = "bannerly")]
#[command(about = "Render social profile banners from a profile document")]
#[command(version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a profile document
    Check {
        profile: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved banner tree without rasterizing it
    Layout {
        profile: PathBuf,
        #[command(flatten)]
        choice: ChoiceArgs,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Render a profile to `<name>-banner.png`
    Render(RenderArgs),
    /// Print a share link for a rendered banner
    Share {
        target: String,
        image: PathBuf,
        #[arg(long = "site-url")]
        site_url: Option<String>,
        #[arg(long = "image-url")]
        image_url: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the technology catalog
    Catalog {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Upload a rendered banner and print its hosted URL
    #[cfg(feature = "remote")]
    Upload {
        image: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn json(&self) -> bool {
        match self {
            Self::Check { json, .. }
            | Self::Layout { json, .. }
            | Self::Catalog { json, .. } => *json,
            Self::Render(args) => args.json,
            #[cfg(feature = "remote")]
            Self::Upload { json, .. } => *json,
            Self::Share { .. } => false,
        }
    }
}

#[derive(Debug, Args)]
struct ChoiceArgs {
    #[arg(long)]
    variant: Option<String>,
    #[arg(long)]
    layout: Option<String>,
    #[arg(long)]
    theme: Option<String>,
}

impl ChoiceArgs {
    fn apply(&self, base: LayoutChoice) -> Result<LayoutChoice> {
        Ok(LayoutChoice {
            variant: match &self.variant {
                Some(value) => Variant::from_keyword(value)?,
                None => base.variant,
            },
            layout: match &self.layout {
                Some(value) => LayoutKind::from_keyword(value)?,
                None => base.layout,
            },
            theme: match &self.theme {
                Some(value) => Theme::from_keyword(value)?,
                None => base.theme,
            },
        })
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("bannerly=info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let json = cli.command.json();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(&error, json),
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Check { profile, json } => run_check(&profile, json),
        Commands::Layout {
            profile,
            choice,
            config,
            json,
        } => run_layout(&profile, &choice, config.as_deref(), json),
        Commands::Render(args) => run_render(args),
        Commands::Share {
            target,
            image,
            site_url,
            image_url,
            config,
        } => run_share(
            &target,
            &image,
            site_url.as_deref(),
            image_url.as_deref(),
            config.as_deref(),
        ),
        Commands::Catalog {
            search,
            config,
            json,
        } => run_catalog(search.as_deref(), config.as_deref(), json),
        #[cfg(feature = "remote")]
        Commands::Upload {
            image,
            config,
            json,
        } => run_upload(&image, config.as_deref(), json),
    }
}

fn report(error: &anyhow::Error, json: bool) -> ExitCode {
    let coded = find_coded_error(error);
    let exit = coded.as_ref().map(CodedError::exit_code).unwrap_or(1);
    if json {
        let coded = coded.unwrap_or_else(|| CodedError {
            code: "RUNTIME_ERROR",
            message: format!("{error:#}"),
            details: None,
            kind: CodedErrorKind::Failure,
        });
        match serde_json::to_string(&coded.envelope()) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("error: {error:#}"),
        }
    } else {
        match coded {
            Some(coded) => eprintln!("error[{}]: {error:#}", coded.code),
            None => eprintln!("error: {error:#}"),
        }
    }
    ExitCode::from(exit as u8)
}

fn run_check(profile_path: &Path, json: bool) -> Result<()> {
    let loaded = load_profile(profile_path)?;
    loaded.profile.validate()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ok": true,
                "profile": loaded.profile,
                "stack": loaded.stack,
                "choice": loaded.choice,
            }))?
        );
    } else {
        println!(
            "OK: {} ({}, {} stack entries, {}/{}/{})",
            profile_path.display(),
            loaded.profile.name.trim(),
            loaded.stack.len(),
            loaded.choice.variant.keyword(),
            loaded.choice.layout.keyword(),
            loaded.choice.theme.keyword()
        );
    }
    Ok(())
}

fn run_layout(
    profile_path: &Path,
    choice: &ChoiceArgs,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = BannerConfig::load(config_path)?;
    let catalog = load_catalog(&config)?;
    let LoadedProfile {
        profile,
        stack,
        choice: saved,
    } = load_profile(profile_path)?;
    let banner = resolve_layout(&profile, &stack, &catalog, choice.apply(saved)?);

    if json {
        println!("{}", serde_json::to_string_pretty(&banner)?);
    } else {
        print_layout(&banner);
    }
    Ok(())
}

fn print_layout(banner: &RenderedBanner) {
    println!(
        "{} {} {} ({}x{})",
        banner.variant.keyword(),
        banner.layout.keyword(),
        banner.theme.keyword(),
        banner.width,
        banner.height
    );
    println!("background: {}", banner.background);
    println!("title: {}", banner.title().unwrap_or_default());
    println!("subtitle: {}", banner.subtitle().unwrap_or_default());
    println!("stack: {}", banner.stack_icons().join(", "));
    println!(
        "avatar: {}",
        match banner.avatar() {
            Some(avatar) => avatar.image.as_deref().unwrap_or(&avatar.initial).to_owned(),
            None => "-".to_owned(),
        }
    );
    println!("nodes: {}", banner.nodes.len());
}

#[derive(Debug, Args)]
struct RenderArgs {
    profile: PathBuf,
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
    #[command(flatten)]
    choice: ChoiceArgs,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Also print share links for every target
    #[arg(long)]
    share: bool,
    /// Upload the PNG to the configured image host
    #[arg(long)]
    upload: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RenderReport<'a> {
    ok: bool,
    image: &'a ExportedImage,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    share: BTreeMap<&'static str, String>,
}

fn run_render(args: RenderArgs) -> Result<()> {
    let mut config = BannerConfig::load(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    let size = config.export.size;
    config.export.size = PixelSize::new(
        args.width.unwrap_or(size.width),
        args.height.unwrap_or(size.height),
    );
    if config.export.size.width == 0 || config.export.size.height == 0 {
        return Err(
            CodedError::usage("INVALID_ARGUMENT", "--width and --height must be positive").into(),
        );
    }

    let LoadedProfile {
        profile,
        stack,
        choice: saved,
    } = load_profile(&args.profile)?;
    let choice = args.choice.apply(saved)?;

    let catalog = load_catalog(&config)?;
    let font = discover_font(config.font_path.as_deref())?;
    let images = image_source(&config, &args.profile)?;
    let rasterizer = Arc::new(SkiaRasterizer::new(font, images));
    let sink = Arc::new(DirectorySink::new(&config.output_dir));
    let exporter = SnapshotExporter::new(rasterizer, sink, config.export);

    let mut session = BannerSession::new(catalog, exporter, config.site.clone(), config.share_mode);
    session.set_profile(profile);
    session.set_stack(stack);
    session.set_choice(choice);
    session.submit()?;
    let exported = session.export()?.clone();

    if args.upload {
        let hosted = upload_png(&config, &exported)?;
        session.attach_hosted_url(hosted);
    }

    let mut share = BTreeMap::new();
    if args.share {
        for target in SHARE_TARGETS {
            if let Some(url) = session.share_url(target) {
                share.insert(target.keyword(), url.to_string());
            }
        }
    }

    let image = session
        .exported()
        .context("export finished without an image")?;
    if args.json {
        let report = RenderReport {
            ok: true,
            image,
            share,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Wrote {} ({}x{})",
            image.saved_to.display(),
            image.width,
            image.height
        );
        if let Some(hosted) = &image.hosted_url {
            println!("Hosted at {hosted}");
        }
        for (target, url) in &share {
            println!("{target}: {url}");
        }
    }
    Ok(())
}

fn run_share(
    target: &str,
    image_path: &Path,
    site_url: Option<&str>,
    image_url: Option<&str>,
    config_path: Option<&Path>,
) -> Result<()> {
    let target = ShareTarget::from_keyword(target)?;
    let mut config = BannerConfig::load(config_path)?;
    if let Some(site_url) = site_url {
        config.set_site_url(site_url)?;
    }

    let mut image = ExportedImage::from_file(image_path)?;
    let mut mode = config.share_mode;
    if let Some(raw) = image_url {
        let hosted = url::Url::parse(raw).map_err(|error| {
            CodedError::usage("INVALID_ARGUMENT", format!("invalid --image-url '{raw}': {error}"))
        })?;
        image.hosted_url = Some(hosted);
        mode = ShareContentMode::PromoteGeneratedImage;
    }

    let url = build_share_url(target, Some(&image), &config.site, mode)
        .context("no share link could be built")?;
    println!("{url}");
    Ok(())
}

fn run_catalog(search: Option<&str>, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = BannerConfig::load(config_path)?;
    let catalog = load_catalog(&config)?;
    let entries = match search {
        Some(term) => catalog.search(term),
        None => catalog.entries().iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{:<14} {:<16} {}", entry.id, entry.name, entry.icon);
        }
        println!("{} entries", entries.len());
    }
    Ok(())
}

#[cfg(feature = "remote")]
fn run_upload(image_path: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = BannerConfig::load(config_path)?;
    let image = ExportedImage::from_file(image_path)?;
    let hosted = upload_png(&config, &image)?;
    if json {
        println!("{}", json!({ "ok": true, "file": image.file_name, "url": hosted }));
    } else {
        println!("{hosted}");
    }
    Ok(())
}

#[cfg(feature = "remote")]
fn upload_png(config: &BannerConfig, image: &ExportedImage) -> Result<url::Url> {
    use bannerly::config::{UPLOAD_PRESET_ENV, UPLOAD_URL_ENV};
    use bannerly::hosting::HostingClient;

    let upload = config.upload.clone().ok_or_else(|| {
        CodedError::usage(
            "UPLOAD_NOT_CONFIGURED",
            format!(
                "no image host configured; set upload.endpoint and upload.preset \
                 or {UPLOAD_URL_ENV} and {UPLOAD_PRESET_ENV}"
            ),
        )
    })?;
    let client = HostingClient::new(upload)?;
    Ok(client.upload(&image.png, &image.file_name)?)
}

#[cfg(not(feature = "remote"))]
fn upload_png(_config: &BannerConfig, _image: &ExportedImage) -> Result<url::Url> {
    Err(CodedError::usage(
        "REMOTE_DISABLED",
        "uploading needs a build with the `remote` feature",
    )
    .into())
}

fn load_catalog(config: &BannerConfig) -> Result<TechCatalog> {
    match &config.catalog_path {
        Some(path) => TechCatalog::load(path),
        None => Ok(TechCatalog::builtin()),
    }
}

/// Icons and avatars resolve inside `icon_dir`, or next to the profile when
/// none is configured.
fn image_source(config: &BannerConfig, profile_path: &Path) -> Result<Arc<dyn ImageSource>> {
    let root = match &config.icon_dir {
        Some(dir) => Some(AssetRoot::new(dir)?),
        None => {
            let dir = profile_path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            AssetRoot::new(dir).ok()
        }
    };
    let local = LocalImageSource::new(root);

    #[cfg(feature = "remote")]
    {
        let remote = bannerly::images::HttpImageSource::new(local, config.export.timeout)?;
        Ok(Arc::new(remote))
    }
    #[cfg(not(feature = "remote"))]
    {
        let _ = config;
        Ok(Arc::new(local))
    }
}
