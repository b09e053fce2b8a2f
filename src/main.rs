use carousel_dl::{Config, Error, RunSummary, driver, logging};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "carousel-dl")]
#[command(version)]
#[command(about = "Download every image of an Instagram post, carousels included")]
#[command(long_about = "\
Download every image of an Instagram post, carousels included

The post is rendered in headless Chrome, each carousel position is opened
through its ?img_index=N address and the image is saved as

  {output-dir}/{post id}/image_N.jpg

A failed position is reported and skipped; the run still succeeds.
Log verbosity follows RUST_LOG (default: info,carousel_dl=debug).")]
struct Cli {
    /// Post address, e.g. https://www.instagram.com/p/DEcJnGD/
    #[arg(env = "CAROUSEL_DL_POST_URL")]
    post_url: String,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root directory for downloaded images [default: instagram_images]
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// Chrome or Chromium executable to launch
    #[arg(long, value_name = "PATH")]
    chrome_path: Option<PathBuf>,

    /// Navigation timeout in seconds [default: 30]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the run summary (or the failure) as JSON
    #[arg(long)]
    json: bool,

    /// Trace-level logging for carousel-dl
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Configuration file (or defaults) with command-line overrides applied
    fn build_config(&self) -> carousel_dl::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(path) = &self.chrome_path {
            config.browser.chrome_executable = Some(path.clone());
        }
        if let Some(secs) = self.timeout {
            config.browser.navigation_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.build_config() {
        Ok(config) => driver::run(config, &cli.post_url).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => print_summary(&summary, cli.json),
        Err(e) => {
            print_failure(&e, cli.json);
            std::process::exit(1);
        }
    }
}

fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("carousel-dl: could not encode summary: {e}"),
        }
        return;
    }

    println!("{summary}");
    println!(
        "Scraping completed: {} of {} images saved to {}",
        summary.saved(),
        summary.total_images,
        summary.output_dir.display()
    );
}

fn print_failure(error: &Error, json: bool) {
    if json {
        let body = serde_json::json!({
            "error": error.error_code(),
            "message": error.to_string(),
        });
        println!("{body}");
    } else {
        eprintln!("Scraping failed: {error}");
    }
}
