use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use letterlens::analysis::AnalysisResult;
use letterlens::audio::ClockOutput;
use letterlens::highlight::InteractionKind;
use letterlens::raster::DocumentSource;
use letterlens::session::{PageView, ResultSession, SessionConfig};
use letterlens::Language;

/// Render a page of an analyzed document with its annotation overlay.
#[derive(Parser, Debug)]
#[command(name = "letterlens", version, about)]
struct Args {
    /// Document to render (PNG/JPEG/GIF/WebP image or PDF)
    document: PathBuf,

    /// Analysis result JSON, as returned by the analysis service
    #[arg(long)]
    analysis: Option<PathBuf>,

    /// 1-based page to render
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Zoom factor (clamped to 0.5..=3.0)
    #[arg(long, default_value_t = 1.0)]
    zoom: f32,

    /// Locate this finding (0-based index into risks+rights+action items)
    /// before rendering, highlighting it on the document
    #[arg(long)]
    focus: Option<usize>,

    /// Explanation language
    #[arg(long, default_value = "english")]
    language: Language,

    /// Output PNG path
    #[arg(short, long, default_value = "page.png")]
    out: PathBuf,

    /// Log file path
    #[arg(long, default_value = "letterlens.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        LevelFilter::Info,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("creating log file {}", args.log_file.display()))?,
    )?;

    let bytes = std::fs::read(&args.document)
        .with_context(|| format!("reading {}", args.document.display()))?;
    let source = DocumentSource::new(bytes, mime_for_path(&args.document))?;

    let config = SessionConfig {
        language: args.language,
        ..SessionConfig::default()
    };
    let mut session = ResultSession::open(source, config, ClockOutput::default())?;
    info!(
        "opened {} ({} page(s))",
        args.document.display(),
        session.page_count()
    );

    if let Some(path) = &args.analysis {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let result = AnalysisResult::from_json(&raw).context("parsing analysis result")?;
        session.deliver_analysis(session.document(), result);
    }

    session.set_page(letterlens::PageIndex(args.page));
    session.set_zoom(args.zoom);

    if let Some(index) = args.focus {
        let findings = session.findings();
        let finding = findings
            .get(index)
            .with_context(|| format!("no finding at index {index}"))?;
        if !finding.locatable() {
            bail!("finding {index} has no location on the document");
        }
        let effects = session.interact(finding, InteractionKind::Locate);
        info!("locate finding {index}: effects {effects:?}");
    }

    let composed = wait_for_page(&mut session)?;
    let image = image::RgbImage::from_raw(composed.width_px, composed.height_px, composed.pixels)
        .context("composed page buffer mismatch")?;
    image
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;

    println!(
        "{} page {} at zoom {:.2} -> {} ({} overlay region(s))",
        args.document.display(),
        session.current_page(),
        session.zoom(),
        args.out.display(),
        composed.regions.len(),
    );

    Ok(())
}

fn wait_for_page(
    session: &mut ResultSession<ClockOutput>,
) -> Result<letterlens::overlay::ComposedPage> {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        session.poll();
        match session.compose_current_page() {
            PageView::Composed(composed) => return Ok(composed),
            PageView::Failed(reason) => bail!("could not render the document: {reason}"),
            PageView::Loading => {
                if Instant::now() > deadline {
                    bail!("rendering timed out");
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        Some("pdf") => Some("application/pdf"),
        _ => None,
    }
}
