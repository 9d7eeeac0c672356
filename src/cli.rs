use clap::{Args, Parser, Subcommand};

use crate::geometry::MonitorSelector;

#[derive(Parser)]
#[command(name = "xmirror")]
#[command(about = "Mirror a monitor of one X display onto another, cursor included")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror a source monitor onto a destination monitor until interrupted
    Mirror(MirrorOptions),

    /// List the monitors and RandR outputs of a display
    List {
        /// Display name
        #[arg(default_value = ":0")]
        display: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct MirrorOptions {
    /// Source display name
    #[arg(short, long, default_value = ":0")]
    pub source: String,

    /// Destination display name
    #[arg(short, long, default_value = ":1")]
    pub dest: String,

    /// Source monitor: index or RandR output name (default: first)
    #[arg(short = 'x', long, default_value = "")]
    pub source_monitor: MonitorSelector,

    /// Destination monitor: index or RandR output name (default: first)
    #[arg(short = 'D', long, default_value = "")]
    pub dest_monitor: MonitorSelector,

    /// Do not wiggle the destination pointer while it is off the mirrored
    /// monitor (the screensaver may kick in, but several mirrors can share a
    /// destination)
    #[arg(short = 'w', long)]
    pub no_wiggle: bool,
}
