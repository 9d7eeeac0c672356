#[cfg(not(target_os = "linux"))]
compile_error!("xmirror requires Linux and an X11 server");

mod cli;
mod error;
mod event_loop;
mod geometry;
mod linux;
mod mirror;
mod replicator;

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use cli::{Cli, Commands, MirrorOptions};
use error::MirrorError;
use geometry::{OutputSource, Rect};
use linux::{
    DamageTracker, PointerInterceptor, RandrOutputs, Session, ShmTransfer, X11CursorSource,
    X11Pointer,
};
use mirror::CursorMirror;
use replicator::FrameReplicator;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mirror(opts) => run_mirror(&opts),
        Commands::List { display, json } => list_monitors(&display, json),
    }
}

#[derive(Serialize)]
struct MonitorListing {
    index: usize,
    #[serde(flatten)]
    region: Rect,
    outputs: Vec<String>,
}

fn list_monitors(display: &str, json: bool) -> Result<()> {
    let session = Session::connect(display)?;
    let regions = linux::list_regions(&session)?;
    let outputs = RandrOutputs::new(&session).outputs().unwrap_or_else(|e| {
        log::warn!("cannot read RandR outputs of {display}: {e}");
        Vec::new()
    });

    let listing: Vec<MonitorListing> = regions
        .iter()
        .enumerate()
        .map(|(index, region)| MonitorListing {
            index,
            region: *region,
            outputs: outputs
                .iter()
                .filter(|o| o.geometry.as_ref() == Some(region))
                .map(|o| o.name.clone())
                .collect(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("Monitors on {display}:");
    for m in &listing {
        println!(
            "  [{index}] {region}{names}",
            index = m.index,
            region = m.region,
            names = if m.outputs.is_empty() {
                String::new()
            } else {
                format!(" ({})", m.outputs.join(", "))
            }
        );
    }
    Ok(())
}

fn run_mirror(opts: &MirrorOptions) -> Result<()> {
    if opts.source == opts.dest {
        return Err(MirrorError::SameDisplay(opts.source.clone()).into());
    }

    let src = Arc::new(Session::open(&opts.source)?);
    let dst = Arc::new(Session::open(&opts.dest)?);

    let src_region = resolve_monitor(&src, &opts.source_monitor)
        .context("Failed to resolve source monitor")?;
    let dst_region = resolve_monitor(&dst, &opts.dest_monitor)
        .context("Failed to resolve destination monitor")?;
    log::info!(
        "mirroring {} {} -> {} {}",
        opts.source,
        src_region,
        opts.dest,
        dst_region
    );

    // The cursor mirror reads cursor images on its own connection so that it
    // never competes with the event loop
    let pointer = X11Pointer::new(Arc::clone(&dst)).context("Failed to set up destination pointer")?;
    let cursor_source = X11CursorSource::new(src.try_clone()?);
    let mirror = Arc::new(CursorMirror::new(
        pointer,
        cursor_source,
        src_region,
        dst_region,
        !opts.no_wiggle,
    )?);

    let transfer = ShmTransfer::new(Arc::clone(&src), Arc::clone(&dst), &src_region)
        .context("Failed to set up shared frame buffer")?;
    let mut replicator = FrameReplicator::new(transfer, src_region, dst_region);

    let damage = DamageTracker::attach(&src, src.root())?;

    let motion_mirror = Arc::clone(&mirror);
    let interceptor = PointerInterceptor::start(&src, move |x, y| motion_mirror.mouse_moved(x, y))
        .context("Failed to start pointer interception")?;
    supervise(interceptor)?;

    src.select_cursor_input(src.root())?;

    ctrlc::set_handler(|| {
        log::info!("interrupted, stopping");
        std::process::exit(0);
    })
    .context("Failed to set Ctrl+C handler")?;

    event_loop::run(&*src, &*dst, &damage, &mut replicator, &*mirror)
        .context("Mirroring stopped")?;
    Ok(())
}

fn resolve_monitor(session: &Session, selector: &geometry::MonitorSelector) -> Result<Rect> {
    let regions = linux::list_regions(session)?;
    let region = geometry::resolve(&RandrOutputs::new(session), &regions, selector)
        .with_context(|| format!("monitor {} on {}", selector, session.name()))?;
    Ok(region)
}

/// A lost pointer connection cannot be recovered; take the process down
fn supervise(interceptor: PointerInterceptor) -> Result<()> {
    thread::Builder::new()
        .name("pointer-supervisor".to_string())
        .spawn(move || {
            match interceptor.join() {
                Ok(()) => log::error!("pointer interception ended"),
                Err(e) => log::error!("pointer interception failed: {e}"),
            }
            std::process::exit(1);
        })
        .context("Failed to spawn supervisor thread")?;
    Ok(())
}
