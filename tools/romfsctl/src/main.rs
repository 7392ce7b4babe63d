mod image;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use romfs::flash::SliceFlash;
use romfs::{Dir, FileType, Mode, Romfs};

use image::FlashImage;

#[derive(Debug, Parser)]
#[command(name = "romfsctl")]
#[command(about = "ROMFS flash image maintenance CLI")]
struct Cli {
    /// Flash image file the commands operate on.
    #[arg(long, global = true, default_value = "romfs.img")]
    image: PathBuf,
    /// Media offset where the entry table region starts.
    #[arg(long, global = true, default_value_t = 0x10000, value_parser = parse_number)]
    base: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the image if needed and write a blank filesystem.
    Format(FormatArgs),
    /// List every file, walking subdirectories.
    List,
    /// Print the free data space.
    Free,
    /// Copy a host file into the image.
    Push(PushArgs),
    /// Copy a file out of the image.
    Pull(PullArgs),
    /// Delete a file.
    Delete(PathArg),
    /// Create a directory.
    Mkdir(MkdirArgs),
    /// Remove an empty directory.
    Rmdir(PathArg),
}

#[derive(Debug, Args)]
struct FormatArgs {
    /// Image size in MiB when the image file does not exist yet.
    #[arg(long, default_value_t = 16)]
    size_mib: u32,
}

#[derive(Debug, Args)]
struct PushArgs {
    src: PathBuf,
    dest: String,
}

#[derive(Debug, Args)]
struct PullArgs {
    src: String,
    dest: PathBuf,
}

#[derive(Debug, Args)]
struct PathArg {
    path: String,
}

#[derive(Debug, Args)]
struct MkdirArgs {
    path: String,
    /// Create missing parent directories as well.
    #[arg(short, long)]
    parents: bool,
}

fn parse_number(raw: &str) -> Result<u32, String> {
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("{raw}: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Format(args) => {
            let mut img = FlashImage::open_or_create(
                &cli.image,
                cli.base,
                args.size_mib as usize * 1024 * 1024,
            )?;
            img.mount()?.format().context("formatting")?;
            img.save()
        }
        Commands::List => {
            let mut img = FlashImage::open(&cli.image, cli.base)?;
            for row in list_rows(&mut img.mount()?) {
                println!("{row}");
            }
            Ok(())
        }
        Commands::Free => {
            let mut img = FlashImage::open(&cli.image, cli.base)?;
            let free = img.mount()?.free_bytes();
            println!("{} ({} bytes) free", human_size(free), free);
            Ok(())
        }
        Commands::Push(args) => {
            let data = fs::read(&args.src)
                .with_context(|| format!("reading {}", args.src.display()))?;
            let mut img = FlashImage::open(&cli.image, cli.base)?;
            push(&mut img.mount()?, &data, &args.dest)?;
            img.save()
        }
        Commands::Pull(args) => {
            let mut img = FlashImage::open(&cli.image, cli.base)?;
            let data = pull(&mut img.mount()?, &args.src)?;
            fs::write(&args.dest, data)
                .with_context(|| format!("writing {}", args.dest.display()))
        }
        Commands::Delete(args) => {
            let mut img = FlashImage::open(&cli.image, cli.base)?;
            img.mount()?
                .delete_path(&args.path)
                .with_context(|| format!("deleting {}", args.path))?;
            img.save()
        }
        Commands::Mkdir(args) => {
            let mut img = FlashImage::open(&cli.image, cli.base)?;
            img.mount()?
                .mkdir_path(&args.path, args.parents)
                .with_context(|| format!("creating {}", args.path))?;
            img.save()
        }
        Commands::Rmdir(args) => {
            let mut img = FlashImage::open(&cli.image, cli.base)?;
            img.mount()?
                .rmdir_path(&args.path)
                .with_context(|| format!("removing {}", args.path))?;
            img.save()
        }
    }
}

fn push(fs: &mut Romfs<SliceFlash<'_>>, data: &[u8], dest: &str) -> Result<()> {
    if fs.stat_path(dest).is_ok() {
        fs.delete_path(dest)
            .with_context(|| format!("replacing {dest}"))?;
    }
    let mut file = fs
        .create_path(dest, Mode::empty(), FileType::Misc, true)
        .with_context(|| format!("creating {dest}"))?;
    let accepted = fs.write(&mut file, data)?;
    fs.close(file).with_context(|| format!("closing {dest}"))?;
    if accepted < data.len() {
        bail!("short write: only {accepted} of {} bytes fit", data.len());
    }
    Ok(())
}

fn pull(fs: &mut Romfs<SliceFlash<'_>>, src: &str) -> Result<Vec<u8>> {
    let mut file = fs
        .open_path(src)
        .with_context(|| format!("opening {src}"))?;
    let mut data = vec![0u8; file.size() as usize];
    let got = fs.read(&mut file, &mut data)?;
    data.truncate(got);
    Ok(data)
}

/// One line per entry: type/permission flags, size, then the full path.
fn list_rows(fs: &mut Romfs<SliceFlash<'_>>) -> Vec<String> {
    let mut rows = Vec::new();
    walk(fs, &Dir::root(), "", &mut rows);
    rows
}

fn walk(fs: &mut Romfs<SliceFlash<'_>>, dir: &Dir, prefix: &str, rows: &mut Vec<String>) {
    let children: Vec<(String, bool, bool, u32, Mode)> = fs
        .list_with_system(dir)
        .map(|e| {
            (
                e.name().to_string(),
                e.is_dir(),
                e.is_system(),
                e.size(),
                e.mode(),
            )
        })
        .collect();

    for (name, is_dir, system, size, mode) in children {
        let path = format!("{prefix}/{name}");
        let flags = format!(
            "{}{}{}",
            if is_dir { 'd' } else { '-' },
            if mode.contains(Mode::READ_ONLY) { 'r' } else { 'w' },
            if system { 's' } else { '-' },
        );
        rows.push(format!("{flags} {size:>10} {path}"));
        if is_dir {
            if let Ok(child) = fs.open_dir(dir, &name) {
                walk(fs, &child, &path, rows);
            }
        }
    }
}

fn human_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
