//! folio - headless EPUB/CBZ page dumper

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use folio::navigation::parse_nav_xhtml;
use folio::EpubBook;
use folio_reader::{
    BookKind, ComicSession, LibraryItem, LoadOutcome, ReaderConfig, ReaderError, ReaderSession,
};
use folio_render::{FixedAdvanceMetrics, RenderEngine, Viewport};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Paginate an EPUB or decode a CBZ without a display", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio book.epub                 Print the first page
    folio --all book.epub           Print every page of every chapter
    folio -i book.epub              Show metadata and table of contents
    folio --width 600 comic.cbz     Decode the first comic page")]
struct Cli {
    /// Input file (EPUB or CBZ)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Reader settings (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Surface width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Surface height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Walk every page instead of stopping after the first
    #[arg(short, long)]
    all: bool,

    /// Show book metadata and table of contents
    #[arg(short, long)]
    info: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => ReaderConfig::load(path).map_err(|e| e.to_string())?,
        None => ReaderConfig::default(),
    };
    config.viewport = Viewport::new(
        cli.width.unwrap_or(config.viewport.width),
        cli.height.unwrap_or(config.viewport.height),
    );

    let item = LibraryItem::from_path(&cli.input)
        .ok_or_else(|| format!("{}: not an EPUB or CBZ file", cli.input.display()))?;
    match item.kind {
        BookKind::Epub if cli.info => show_info(&item.path),
        BookKind::Epub => dump_epub(&item.path, &config, cli.all).map_err(|e| e.to_string()),
        BookKind::Cbz => dump_cbz(&item.path, &config, cli.all).map_err(|e| e.to_string()),
    }
}

fn show_info(path: &Path) -> Result<(), String> {
    let mut book = EpubBook::open(path).map_err(|e| e.to_string())?;

    let meta = book.metadata().clone();
    println!("File: {}", path.display());
    println!("Title: {}", book.title());
    if let Some(creator) = &meta.creator {
        println!("Author: {creator}");
    }
    if let Some(language) = &meta.language {
        println!("Language: {language}");
    }
    println!("Chapters: {}", book.chapter_paths().len());

    let Some(nav_path) = book.package().nav_path().map(String::from) else {
        return Ok(());
    };
    let nav = book.read_entry(&nav_path).map_err(|e| e.to_string())?;
    if let Ok(Some(toc)) = parse_nav_xhtml(&nav) {
        println!("\nContents:");
        for (depth, point) in toc.flat() {
            println!("  {}{}", "    ".repeat(depth), point.label);
        }
    }
    Ok(())
}

fn dump_epub(path: &Path, config: &ReaderConfig, all: bool) -> Result<(), ReaderError> {
    let engine = RenderEngine::new(
        config.engine_options(),
        Arc::new(FixedAdvanceMetrics::default()),
    );
    let mut session = ReaderSession::open_path(path, engine, config.viewport)?;
    println!("# {}", session.title());
    loop {
        if let Some(view) = session.page_view() {
            print!("{}", view.text);
        }
        println!("-- {} | {} --", session.footer(), session.page_label());
        if !all || !session.next_page()? {
            break;
        }
    }
    Ok(())
}

fn dump_cbz(path: &Path, config: &ReaderConfig, all: bool) -> Result<(), ReaderError> {
    let mut comic = ComicSession::open_path(path, config.loader, config.viewport)?;
    println!("# {}", comic.title());
    if comic.is_empty() {
        println!("{}", comic.page_label());
        return Ok(());
    }
    loop {
        if !comic.wait(Duration::from_secs(30)) {
            println!("{}: still decoding", comic.page_label());
        } else {
            match comic.current() {
                Some(LoadOutcome::Image(page)) => println!(
                    "{}: {}x{}",
                    comic.page_label(),
                    page.image.width(),
                    page.image.height()
                ),
                Some(LoadOutcome::NoImage { reason, .. }) => {
                    println!("{}: no image ({reason})", comic.page_label())
                }
                None => println!("{}", comic.page_label()),
            }
        }
        if !all || !comic.next_page(std::time::Instant::now()) {
            break;
        }
    }
    Ok(())
}
