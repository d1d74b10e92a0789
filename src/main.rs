//! ferry: interactive client for a ferry-fs server

use anyhow::Context;
use clap::Parser;
use ferry_fs::config::DEFAULT_PORT;
use ferry_fs::{protocol, Client, Error};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ferry", version, about = "Manage files on a ferry-fs server")]
struct Args {
    /// Server host
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Local folder for downloads and uploads, created if missing
    #[arg(long, default_value = "ClientFiles")]
    local_dir: PathBuf,

    /// Per-read/per-write deadline in seconds; 0 disables it
    #[arg(long, default_value_t = 0)]
    timeout_secs: u64,
}

const HELP: &[(&str, &str)] = &[
    ("list", "List files on the server"),
    ("delete <filename>", "Remove a file on the server"),
    ("rename <oldname> <newname>", "Rename a file on the server"),
    ("download <filename>", "Download a file from the server"),
    ("upload <filename>", "Upload a file from the local folder"),
    ("local", "List files in the local folder"),
    ("help", "Show this menu"),
    ("quit", "Exit the client"),
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&args.local_dir)
        .await
        .with_context(|| format!("creating {}", args.local_dir.display()))?;

    let timeout = (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));
    let mut client = Client::connect((args.host.as_str(), args.port), timeout)
        .await
        .with_context(|| format!("connecting to {}:{}", args.host, args.port))?;

    println!("Connected to ferry-fs at {}:{}", args.host, args.port);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            client.quit().await?;
            break;
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        let outcome = match words.as_slice() {
            [] => continue,
            ["quit"] => {
                client.quit().await?;
                println!("Goodbye!");
                break;
            }
            ["help"] => {
                print_help();
                Ok(())
            }
            ["local"] => list_local(&args.local_dir).await,
            ["list"] => list_remote(&mut client).await,
            ["delete", name] => client.delete(name).await.map(|msg| println!("{msg}")),
            ["rename", old, new] => client.rename(old, new).await.map(|msg| println!("{msg}")),
            ["download", name] => download(&mut client, &args.local_dir, name).await,
            ["upload", name] => upload(&mut client, &args.local_dir, name).await,
            _ => {
                println!("Unknown command: {line} (type 'help')");
                continue;
            }
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(Error::Remote(msg)) => println!("ERROR: {msg}"),
            Err(e) => println!("{e}"),
        }
    }

    Ok(())
}

fn print_help() {
    println!("Available commands:");
    for (usage, desc) in HELP {
        println!("  {usage:<28} : {desc}");
    }
    println!();
}

async fn list_remote(client: &mut Client<TcpStream>) -> ferry_fs::Result<()> {
    let names = client.list().await?;
    if names.is_empty() {
        println!("No files found on server.");
    }
    for (i, name) in names.iter().enumerate() {
        println!("{}. {name}", i + 1);
    }
    Ok(())
}

async fn list_local(dir: &Path) -> ferry_fs::Result<()> {
    let names = ferry_fs::FileStore::new(dir).list().await?;
    if names.is_empty() {
        println!("No files found in {}.", dir.display());
    }
    for (i, name) in names.iter().enumerate() {
        println!("{}. {name}", i + 1);
    }
    Ok(())
}

fn transfer_bar(name: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(name.to_string());
    bar
}

/// Download into `<name>.part`, renamed into place only once complete
async fn download(client: &mut Client<TcpStream>, dir: &Path, name: &str) -> ferry_fs::Result<()> {
    protocol::validate_filename(name)?;
    let target = dir.join(name);
    let partial = dir.join(format!("{name}.part"));

    let mut file = tokio::fs::File::create(&partial).await?;
    let bar = transfer_bar(name);
    let res = client
        .download(name, &mut file, |done, total| {
            bar.set_length(total);
            bar.set_position(done);
        })
        .await;
    drop(file);

    match res {
        Ok(size) => {
            bar.finish_and_clear();
            tokio::fs::rename(&partial, &target).await?;
            println!("File downloaded successfully to: {} ({size} bytes)", target.display());
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn upload(client: &mut Client<TcpStream>, dir: &Path, name: &str) -> ferry_fs::Result<()> {
    protocol::validate_filename(name)?;
    let path = dir.join(name);
    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta,
        _ => return Err(Error::NotFound(path.display().to_string())),
    };

    let mut file = tokio::fs::File::open(&path).await?;
    let bar = transfer_bar(name);
    let res = client
        .upload(name, meta.len(), &mut file, |done, total| {
            bar.set_length(total);
            bar.set_position(done);
        })
        .await;

    match res {
        Ok(msg) => {
            bar.finish_and_clear();
            println!("{msg}");
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e)
        }
    }
}
