//! panotile CLI - inspect tiled images and drive panoramas headlessly.
//!
//! ```text
//! panotile describe <BASE>            print an image descriptor
//! panotile simulate <BASE>            auto-rotate a cube panorama
//! panotile config get|set|list|path   manage config.ini
//! ```

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use console::style;

use commands::common::{FileSystemArg, RendererArg};
use commands::config::ConfigCommands;
use commands::describe::DescribeArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "panotile")]
#[command(about = "Tile cache and LOD engine for zoomable images and cube panoramas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an image descriptor and print what it describes
    Describe {
        /// Base URL of the image (defaults to source.base_path)
        base: Option<String>,

        /// Tile layout (defaults to source.filesystem)
        #[arg(short, long, value_enum)]
        filesystem: Option<FileSystemArg>,

        /// Sub-path under the base, e.g. a cube face ("f", "r", ...)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Print the descriptor as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open a cube panorama and auto-rotate it without a display
    Simulate {
        /// Base URL of the panorama (defaults to source.base_path)
        base: Option<String>,

        /// Tile layout (defaults to source.filesystem)
        #[arg(short, long, value_enum)]
        filesystem: Option<FileSystemArg>,

        /// Renderer backend
        #[arg(short, long, value_enum, default_value_t = RendererArg::Mesh)]
        renderer: RendererArg,

        /// Stop after this many frames (runs until Ctrl+C otherwise)
        #[arg(long)]
        frames: Option<u64>,

        /// Frames per second
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Viewport width in pixels
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Viewport height in pixels
        #[arg(long, default_value = "720")]
        height: u32,
    },

    /// View or change settings in config.ini
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Describe {
            base,
            filesystem,
            prefix,
            json,
        } => commands::describe::run(DescribeArgs {
            base,
            filesystem,
            prefix,
            json,
        }),
        Commands::Simulate {
            base,
            filesystem,
            renderer,
            frames,
            fps,
            width,
            height,
        } => commands::simulate::run(SimulateArgs {
            base,
            filesystem,
            renderer,
            frames,
            fps,
            width,
            height,
        }),
        Commands::Config { command } => commands::config::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from([
            "panotile",
            "simulate",
            "http://pano.test/p",
            "--renderer",
            "compositor",
            "--frames",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate {
                base,
                renderer,
                frames,
                fps,
                ..
            } => {
                assert_eq!(base.as_deref(), Some("http://pano.test/p"));
                assert_eq!(renderer, RendererArg::Compositor);
                assert_eq!(frames, Some(10));
                assert_eq!(fps, 30);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["panotile", "config", "set", "lod.enabled", "false"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { .. }
            }
        ));
    }
}
