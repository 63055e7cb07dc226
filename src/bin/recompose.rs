use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "recompose", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild a `.icon` bundle from a catalog dump and its extracted files.
    Build(BuildArgs),
    /// Score bundles against their reference renderings.
    Score(ScoreArgs),
    /// Export a bundle as a standalone SVG.
    Svg(SvgArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Directory holding the already-extracted layer files.
    #[arg(long)]
    extracted_dir: Option<PathBuf>,

    /// Compiled catalog to extract with `--extractor`.
    #[arg(long, requires = "extractor")]
    car: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct BuildArgs {
    /// Catalog dump (JSON array).
    #[arg(long)]
    catalog: PathBuf,

    /// Name of the icon inside the catalog.
    #[arg(long)]
    icon_name: String,

    #[command(flatten)]
    source: SourceArgs,

    /// Extraction program, run as `<prog> <car> <out_dir>`.
    #[arg(long, env = "RECOMPOSE_EXTRACTOR")]
    extractor: Option<PathBuf>,

    /// Output bundle path (`<name>.icon`).
    #[arg(long)]
    out: PathBuf,

    /// Original app, scored against the rebuilt bundle when no reference was extracted.
    #[arg(long)]
    app_path: Option<PathBuf>,

    /// Score the bundle after building it.
    #[arg(long)]
    score: bool,

    /// Thumbnail program, run as `<prog> <src> <out.png> <size>`.
    #[arg(long, env = "RECOMPOSE_THUMBNAILER")]
    thumbnailer: Option<PathBuf>,

    /// Keep glass groups of vector layers as separate layers.
    #[arg(long)]
    no_flatten: bool,

    /// Keep partial-canvas bitmaps at their catalog size.
    #[arg(long)]
    no_reframe: bool,

    /// Edge of the renderings used for scoring.
    #[arg(long, default_value_t = 1024)]
    render_size: u32,
}

#[derive(Parser, Debug)]
struct ScoreArgs {
    /// Bundle to score; repeat for several.
    #[arg(long = "bundle", required = true)]
    bundles: Vec<PathBuf>,

    /// Original app, rendered when a bundle has no `reference.png`.
    #[arg(long)]
    app_path: Option<PathBuf>,

    /// Thumbnail program, run as `<prog> <src> <out.png> <size>`.
    #[arg(long, env = "RECOMPOSE_THUMBNAILER")]
    thumbnailer: Option<PathBuf>,

    #[arg(long, default_value_t = 1024)]
    render_size: u32,
}

#[derive(Parser, Debug)]
struct SvgArgs {
    #[arg(long)]
    bundle: PathBuf,

    /// Output SVG path; defaults to `<bundle>/preview.svg`.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("recompose=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Build(args) => cmd_build(args),
        Command::Score(args) => cmd_score(args),
        Command::Svg(args) => cmd_svg(args),
    }
}

fn make_renderer(thumbnailer: Option<PathBuf>) -> Box<dyn recompose::Renderer + Send + Sync> {
    match thumbnailer {
        Some(program) => Box::new(recompose::CommandRenderer::new(program)),
        None => Box::new(recompose::NativeRenderer),
    }
}

fn read_catalog_json(path: &Path) -> anyhow::Result<Vec<serde_json::Value>> {
    let f = File::open(path).with_context(|| format!("open catalog '{}'", path.display()))?;
    let r = BufReader::new(f);
    let raw: Vec<serde_json::Value> =
        serde_json::from_reader(r).with_context(|| "parse catalog JSON")?;
    Ok(raw)
}

fn cmd_build(args: BuildArgs) -> anyhow::Result<()> {
    let raw = read_catalog_json(&args.catalog)?;
    let options = recompose::PipelineOptions {
        flatten_vector_groups: !args.no_flatten,
        reframe_bitmaps: !args.no_reframe,
        render_size: args.render_size,
    };
    let renderer = make_renderer(args.thumbnailer);

    let extractor = args.extractor.map(recompose::CommandExtractor::new);
    let source = match (&args.source.extracted_dir, &args.source.car, &extractor) {
        (Some(dir), _, _) => recompose::AssetSource::Directory(dir),
        (None, Some(car), Some(extractor)) => recompose::AssetSource::Catalog { car, extractor },
        _ => anyhow::bail!("--car needs --extractor or RECOMPOSE_EXTRACTOR"),
    };

    let report = recompose::build_bundle(
        &raw,
        &args.icon_name,
        source,
        &args.out,
        renderer.as_ref(),
        &options,
    )?;
    eprintln!("wrote {}", report.bundle.display());
    if !report.discrepancies.is_empty() {
        eprintln!("{} discrepancies:", report.discrepancies.len());
        for record in &report.discrepancies {
            eprintln!("  {}", record.description);
        }
    }

    if args.score || args.app_path.is_some() {
        let score = recompose::score_bundle(
            &report.bundle,
            args.app_path.as_deref(),
            renderer.as_ref(),
            options.render_size,
        )?;
        println!("Visual fidelity score: {}/100", score.total);
    }
    Ok(())
}

fn cmd_score(args: ScoreArgs) -> anyhow::Result<()> {
    let renderer = make_renderer(args.thumbnailer);
    let results: Vec<_> = args
        .bundles
        .par_iter()
        .map(|bundle| {
            let score = recompose::score_bundle(
                bundle,
                args.app_path.as_deref(),
                renderer.as_ref(),
                args.render_size,
            );
            (bundle, score)
        })
        .collect();

    let mut failed = 0usize;
    for (bundle, score) in results {
        match score {
            Ok(score) => println!(
                "{}: Visual fidelity score: {}/100",
                bundle.display(),
                score.total
            ),
            Err(err) => {
                failed += 1;
                eprintln!("{}: {err}", bundle.display());
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} bundles could not be scored", args.bundles.len());
    }
    Ok(())
}

fn cmd_svg(args: SvgArgs) -> anyhow::Result<()> {
    let svg = recompose::render::svg_export::bundle_svg(&args.bundle)?;
    let out = args
        .out
        .unwrap_or_else(|| args.bundle.join("preview.svg"));
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&out, svg).with_context(|| format!("write svg '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}
