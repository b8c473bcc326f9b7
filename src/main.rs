use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use canvas::render::scene;
use hexkeep::api::StoreError;
use hexkeep::api::http::HttpMapStore;
use hexkeep::config::HostConfig;
use hexkeep::dispatch::Host;
use hexkeep::svg::{BackgroundImage, to_svg};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("map {0} did not open")]
    NotOpen(i64),
    #[error("missing user; pass --user")]
    MissingUser,
}

#[derive(Parser, Debug)]
#[command(name = "hexkeep", about = "Hex map campaign tracker CLI")]
struct Cli {
    #[arg(long, env = "HEXKEEP_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "HEXKEEP_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Act as this user (username or id).
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a stored map to an SVG file.
    Export {
        #[arg(long)]
        map_id: i64,
        #[arg(long)]
        out: PathBuf,
        /// Natural background size; widens the exported extent.
        #[arg(long, requires = "image_height")]
        image_width: Option<f64>,
        #[arg(long, requires = "image_width")]
        image_height: Option<f64>,
        /// Background image URL to reference from the SVG.
        #[arg(long, requires = "image_width")]
        image_href: Option<String>,
    },
    /// Show the detail panel for one hex.
    Hex {
        #[arg(long)]
        map_id: i64,
        #[arg(long)]
        col: u32,
        #[arg(long)]
        row: u32,
    },
    /// Print the map's share code, optionally creating one.
    ShareLink {
        #[arg(long)]
        map_id: i64,
        #[arg(long)]
        create: bool,
    },
    /// Resolve `--user` and print their role.
    Whoami,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let mut config = HostConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(token) = cli.token {
        config = config.with_auth_token(token);
    }
    tracing::info!(base_url = %config.base_url, "hexkeep starting");

    let store = HttpMapStore::new(&config)?;
    let mut host = Host::new(store, config.retry);
    if let Some(user) = &cli.user {
        host.sign_in(user).await?;
    }

    match cli.command {
        Command::Export { map_id, out, image_width, image_height, image_href } => {
            let image = image_width.zip(image_height);
            run_export(&mut host, map_id, out, image, image_href).await
        }
        Command::Hex { map_id, col, row } => run_hex(&mut host, map_id, col, row).await,
        Command::ShareLink { map_id, create } => run_share_link(&mut host, map_id, create).await,
        Command::Whoami => {
            let person = host.user().ok_or(CliError::MissingUser)?;
            print_json(&serde_json::to_value(person)?)
        }
    }
}

async fn run_export(
    host: &mut Host<HttpMapStore>,
    map_id: i64,
    out: PathBuf,
    image: Option<(f64, f64)>,
    image_href: Option<String>,
) -> Result<(), CliError> {
    host.open_map(map_id).await?;
    let session = host.session_mut().ok_or(CliError::NotOpen(map_id))?;
    if let Some((w, h)) = image {
        session.set_image_size(w, h);
    }
    let background = image
        .zip(image_href)
        .map(|((width, height), href)| BackgroundImage { href, width, height });

    let frame = scene(session);
    let svg = to_svg(&frame, background.as_ref());
    tokio::fs::write(&out, svg).await.map_err(|source| CliError::Write { path: out.clone(), source })?;

    print_json(&json!({
        "mapID": map_id,
        "out": out.display().to_string(),
        "hexes": frame.hexes.len(),
        "width": frame.map_w,
        "height": frame.map_h,
    }))
}

async fn run_hex(host: &mut Host<HttpMapStore>, map_id: i64, col: u32, row: u32) -> Result<(), CliError> {
    host.open_map(map_id).await?;
    host.handle(|s| s.select(col, row)).await;

    let notices = host.take_notices();
    let session = host.session().ok_or(CliError::NotOpen(map_id))?;
    let Some(detail) = session.detail() else {
        return print_json(&json!({ "mapID": map_id, "notices": notices }));
    };

    let dm_controls = detail.dm_controls.map(|c| {
        json!({ "visibility": c.visibility, "explored": c.explored, "controlled": c.controlled })
    });
    print_json(&json!({
        "mapID": map_id,
        "col": detail.coord.col,
        "row": detail.coord.row,
        "name": detail.name,
        "status": detail.status,
        "resources": detail.resources,
        "notes": detail.notes,
        "dmControls": dm_controls,
        "notices": notices,
    }))
}

async fn run_share_link(host: &mut Host<HttpMapStore>, map_id: i64, create: bool) -> Result<(), CliError> {
    host.open_map(map_id).await?;
    let code = host.share_link(create).await?;
    print_json(&json!({ "mapID": map_id, "linkCode": code }))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
