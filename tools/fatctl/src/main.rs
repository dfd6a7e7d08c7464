use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fatvol::{
    mount, DirHandle, FatFileSystem, FatType, FileDisk, MountOptions, SuperFloppyFormatter,
};

#[derive(Debug, Parser)]
#[command(name = "fatctl")]
#[command(about = "Create and inspect FAT volume images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a super-floppy FAT image file.
    Format(FormatArgs),
    /// Print geometry and space usage.
    Info(ImageArgs),
    /// List a directory inside the image.
    Ls(LsArgs),
    /// Show or change the volume label.
    Label(LabelArgs),
}

#[derive(Debug, Args)]
struct FormatArgs {
    image: PathBuf,
    /// Image size in MiB; required when the file does not exist yet.
    #[arg(long = "size-mib")]
    size_mib: Option<u64>,
    /// 12, 16 or 32; derived from the size when omitted.
    #[arg(long = "fat-type")]
    fat_type: Option<u8>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long = "volume-id")]
    volume_id: Option<u32>,
}

#[derive(Debug, Args)]
struct ImageArgs {
    image: PathBuf,
}

#[derive(Debug, Args)]
struct LsArgs {
    image: PathBuf,
    /// Directory path inside the volume, e.g. /docs/reports.
    #[arg(default_value = "/")]
    path: String,
}

#[derive(Debug, Args)]
struct LabelArgs {
    image: PathBuf,
    /// New label; omit to print the current one.
    #[arg(long)]
    set: Option<String>,
    #[arg(long, conflicts_with = "set")]
    clear: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Format(args) => run_format(args),
        Commands::Info(args) => run_info(args),
        Commands::Ls(args) => run_ls(args),
        Commands::Label(args) => run_label(args),
    }
}

fn open_image(path: &Path, read_only: bool) -> Result<FatFileSystem<FileDisk>> {
    let dev = FileDisk::open(path, read_only)
        .with_context(|| format!("opening image {}", path.display()))?;
    let options = if read_only {
        MountOptions::read_only()
    } else {
        MountOptions::default()
    };
    mount(dev, options).with_context(|| format!("mounting {}", path.display()))
}

fn run_format(args: FormatArgs) -> Result<()> {
    let dev = if args.image.exists() {
        FileDisk::open(&args.image, false)
            .with_context(|| format!("opening image {}", args.image.display()))?
    } else {
        let size_mib = args
            .size_mib
            .ok_or_else(|| anyhow!("--size-mib is required to create a new image"))?;
        FileDisk::create(&args.image, size_mib * 1024 * 1024)
            .with_context(|| format!("creating image {}", args.image.display()))?
    };

    let mut formatter = SuperFloppyFormatter::new(dev).context("initializing formatter")?;
    if let Some(fat_type) = args.fat_type {
        let fat_type = match fat_type {
            12 => FatType::Fat12,
            16 => FatType::Fat16,
            32 => FatType::Fat32,
            other => bail!("unknown FAT type {}", other),
        };
        formatter = formatter.fat_type(fat_type).context("selecting FAT type")?;
    }
    if let Some(label) = &args.label {
        formatter = formatter.volume_label(label);
    }
    if let Some(id) = args.volume_id {
        formatter = formatter.volume_id(id);
    }

    let mut fs = formatter.format().context("formatting")?;
    println!(
        "formatted {} as {:?}, {} bytes free",
        args.image.display(),
        fs.fat_type(),
        fs.free_space()
    );
    fs.close().context("closing volume")?;
    Ok(())
}

fn run_info(args: ImageArgs) -> Result<()> {
    let fs = open_image(&args.image, true)?;
    let bs = fs.boot_sector();

    println!("type:                {:?}", fs.fat_type());
    println!("dialect:             {:?}", fs.dialect());
    println!("OEM name:            {}", bs.oem_name());
    println!("bytes per sector:    {}", bs.bytes_per_sector());
    println!("sectors per cluster: {}", bs.sectors_per_cluster());
    println!("reserved sectors:    {}", bs.nr_reserved_sectors());
    println!("FAT copies:          {}", bs.nr_fats());
    println!("sectors per FAT:     {}", bs.sectors_per_fat());
    println!("sector count:        {}", bs.sector_count());
    println!(
        "label:               {}",
        fs.volume_label()?.unwrap_or_else(|| "(none)".to_string())
    );
    println!("free space:          {} bytes", fs.free_space());
    println!("usable space:        {} bytes", fs.usable_space());
    Ok(())
}

fn resolve_dir(fs: &mut FatFileSystem<FileDisk>, path: &str) -> Result<DirHandle> {
    let mut dir = fs.root();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        dir = fs
            .open_dir(dir, segment)
            .with_context(|| format!("entering {}", segment))?;
    }
    Ok(dir)
}

fn run_ls(args: LsArgs) -> Result<()> {
    let mut fs = open_image(&args.image, true)?;
    let dir = resolve_dir(&mut fs, &args.path)?;

    for entry in fs.list_dir(dir)? {
        let kind = if entry.is_directory { "<dir>" } else { "     " };
        let modified = entry
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "----".to_string());
        println!("{} {:>10}  {}  {}", kind, entry.size, modified, entry.name);
    }
    Ok(())
}

fn run_label(args: LabelArgs) -> Result<()> {
    if args.set.is_none() && !args.clear {
        let fs = open_image(&args.image, true)?;
        match fs.volume_label()? {
            Some(label) => println!("{}", label),
            None => println!("(none)"),
        }
        return Ok(());
    }

    let mut fs = open_image(&args.image, false)?;
    fs.set_volume_label(args.set.as_deref())
        .context("setting label")?;
    fs.close().context("closing volume")?;
    Ok(())
}
