use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ocr_layer_rust::OcrMode;

#[derive(Parser, Debug)]
#[command(
    name = "ocr-layer-rust",
    version,
    about = "Add a searchable OCR text layer to scanned PDFs and images"
)]
struct Cli {
    /// Scanned PDF or image file
    input: PathBuf,

    /// OCR element granularity (lines, tokens, symbols)
    #[arg(short = 'm', long = "mode")]
    mode: Option<OcrMode>,

    /// Resolution used for both axes
    #[arg(long = "dpi")]
    dpi: Option<f32>,

    /// Horizontal resolution of the page images
    #[arg(long = "dpi-x")]
    dpi_x: Option<f32>,

    /// Vertical resolution of the page images
    #[arg(long = "dpi-y")]
    dpi_y: Option<f32>,

    /// OCR language hint (e.g. en, de)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Draw the recognized text in red instead of invisibly
    #[arg(long = "show-text")]
    show_text: bool,

    /// Outline every recognized element
    #[arg(long = "show-boxes")]
    show_boxes: bool,

    /// Use bold/italic faces from the service's style information
    #[arg(long = "style-info")]
    style_info: bool,

    /// Google Cloud project id
    #[arg(long = "project")]
    project: Option<String>,

    /// Document AI location (e.g. eu, us)
    #[arg(long = "location")]
    location: Option<String>,

    /// Document AI OCR processor id
    #[arg(long = "processor")]
    processor: Option<String>,

    /// OAuth access token (overrides environment variables)
    #[arg(short = 'k', long = "token")]
    token: Option<String>,

    /// Directory for the outputs and page cache (default: next to the input)
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Pages processed at once (0 = one per CPU)
    #[arg(short = 'j', long = "concurrency")]
    concurrency: Option<usize>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_layer_rust::logging::init(cli.verbose)?;

    let report = ocr_layer_rust::run(ocr_layer_rust::Config {
        input: cli.input,
        mode: cli.mode,
        dpi: cli.dpi,
        dpi_x: cli.dpi_x,
        dpi_y: cli.dpi_y,
        lang: cli.lang,
        show_text: cli.show_text,
        show_boxes: cli.show_boxes,
        style_info: cli.style_info,
        project: cli.project,
        location: cli.location,
        processor: cli.processor,
        token: cli.token,
        output_dir: cli.output_dir,
        concurrency: cli.concurrency,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", ocr_layer_rust::format_report(&report));
    Ok(())
}
