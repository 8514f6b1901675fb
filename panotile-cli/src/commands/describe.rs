//! Describe command - load and print an image descriptor.

use console::style;
use panotile::face::max_divisions;
use panotile::filesystem::{open_file_system, TileFileSystem, TileSource};

use super::common::{resolve_source, FileSystemArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the describe command.
pub struct DescribeArgs {
    pub base: Option<String>,
    pub filesystem: Option<FileSystemArg>,
    pub prefix: Option<String>,
    pub json: bool,
}

/// Run the describe command.
pub fn run(args: DescribeArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("describe");

    let (base, kind) = resolve_source(args.base, args.filesystem, runner.config())?;
    let loader = runner.loader()?;
    let source = runner.block_on(open_file_system(kind, &base, args.prefix.as_deref(), &loader))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&source.descriptor)?);
        return Ok(());
    }

    print_descriptor(&base, &kind.to_string(), &source);
    Ok(())
}

fn print_descriptor(base: &str, kind: &str, source: &TileSource) {
    let d = &source.descriptor;
    let divisions = max_divisions(d.width.max(d.height), d.tile_size, d.overlap);

    println!("{}", style("Image Descriptor").bold());
    println!("================");
    println!();
    println!("  Source:       {} ({})", base, kind);
    println!("  Size:         {} x {} px", d.width, d.height);
    println!("  Tile size:    {} px (overlap {})", d.tile_size, d.overlap);
    println!("  Zoom levels:  {} .. 0 ({} levels)", d.min_zoom, 1 - d.min_zoom);
    println!("  Divisions:    {}", divisions);
    if d.poster_size > 0 {
        println!("  Poster:       {} px at zoom {:.2}", d.poster_size, d.poster_zoom_level());
    } else {
        println!("  Poster:       {}", style("unknown size").dim());
    }
    println!();
    println!("  First tile:   {}", source.file_system.image_url(0, 0, 0));
    println!("  Poster URL:   {}", source.file_system.poster_url());
}
