use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use parget::downloader::{DownloadRequest, DownloadStatus, Downloader, ProgressFn};

#[derive(Parser)]
#[command(name = "parget")]
#[command(about = "A segmented parallel http download tool")]
#[command(version = "1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Get {
        #[arg(help = "source url")]
        url: String,
        #[arg(short, long, help = "destination directory", default_value = ".")]
        output: PathBuf,
        #[arg(short, long, help = "file name, defaults to the last url path segment")]
        name: Option<String>,
        #[arg(short, long, help = "worker count, 0 picks the cpu count", default_value_t = 0)]
        workers: usize,
        #[arg(long, help = "print the terminal item as json")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Get {
            url,
            output,
            name,
            workers,
            json,
        }) => {
            let file_name = match name {
                Some(name) => name,
                None => file_name_from_url(&url),
            };

            let request = DownloadRequest {
                url,
                save_path: output,
                file_name,
                workers,
            };

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.cancel();
                }
            });

            let item = Downloader::new()
                .download(request, Some(progress_bar()), cancel)
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            }

            match item.status {
                DownloadStatus::Downloaded => {
                    if !json {
                        println!(
                            "Saved {}",
                            item.save_path.join(&item.file_name).display()
                        );
                    }
                }
                _ => {
                    eprintln!(
                        "Download failed: {}",
                        item.error_message.as_deref().unwrap_or("unknown error")
                    );
                    std::process::exit(1);
                }
            }
        }

        None => {
            println!("Use --help for available commands");
        }
    }

    Ok(())
}

fn file_name_from_url(url: &str) -> String {
    let base = url.split(['?', '#']).next().unwrap_or(url);
    base.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// Renders the engine's percent reports as a terminal progress bar
fn progress_bar() -> ProgressFn {
    let bar = Mutex::new((tqdm::pbar(Some(100)), 0usize));
    Arc::new(move |percent| {
        let mut guard = bar.lock().unwrap();
        let percent = percent as usize;
        if percent > guard.1 {
            let delta = percent - guard.1;
            guard.1 = percent;
            let _ = guard.0.update(delta);
        }
    })
}
