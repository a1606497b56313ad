//! Subcommand implementations
//!
//! Every command writes its report to the given writer so the binary can
//! pass standard output and tests can capture it.

use crate::{Cli, Commands, MountArgs};
use anyhow::{Context, Result, bail};
use packfs_formats::pack::{EntryKind, PackOpenOptions, PackReader, build_pack};
use packfs_vfs::{LayeredFileSystem, MountPlan};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Chunk size for streaming `cat` output
const CAT_CHUNK: usize = 64 * 1024;

/// Run the parsed command line, writing output to `out`
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    match cli.command {
        Commands::Build { source, output } => build(&source, &output, out),
        Commands::Verify { pack } => verify(&pack, out),
        Commands::Ls { mounts, path } => ls(&mounts, &path, out),
        Commands::Cat { mounts, path } => cat(&mounts, &path, out),
        Commands::Stat { mounts, path } => stat(&mounts, &path, out),
    }
}

fn build(source: &Path, output: &Path, out: &mut impl Write) -> Result<()> {
    let summary = build_pack(source, output)
        .with_context(|| format!("failed to pack {}", source.display()))?;

    writeln!(
        out,
        "Packed {} entries ({} files, {} directories, {} payload bytes) into {}",
        summary.entry_count,
        summary.file_count,
        summary.directory_count,
        summary.payload_bytes,
        output.display()
    )?;
    writeln!(
        out,
        "Archive size {} bytes, checksum {:08x}",
        summary.archive_size, summary.checksum
    )?;
    Ok(())
}

fn verify(pack: &Path, out: &mut impl Write) -> Result<()> {
    // Structural checks on open, then one checksum pass
    let reader = PackReader::open(pack, &PackOpenOptions::default())
        .with_context(|| format!("{} failed verification", pack.display()))?;
    let checksum = reader
        .verify_checksum()
        .with_context(|| format!("{} failed verification", pack.display()))?;

    writeln!(
        out,
        "{}: OK, {} entries, {} bytes, checksum {:08x}",
        pack.display(),
        reader.entry_count(),
        reader.file_len(),
        checksum
    )?;
    Ok(())
}

/// Mount everything `args` names, plan first and flags after
fn layered(args: &MountArgs) -> Result<LayeredFileSystem> {
    let mut plan = match &args.plan {
        Some(path) => MountPlan::load(path)
            .with_context(|| format!("failed to load mount plan {}", path.display()))?,
        None => MountPlan::default(),
    };
    if args.verify_checksum {
        plan.config = plan.config.with_verify_checksum(true);
    }
    if args.no_mmap {
        plan.config = plan.config.with_mmap(false);
    }
    plan.mounts.extend(args.mounts.iter().cloned());

    if plan.mounts.is_empty() {
        bail!("nothing mounted; pass --mount os:<dir> or --mount pack:<file>, or --plan");
    }

    info!("Mounting {} sources", plan.mounts.len());
    let vfs = LayeredFileSystem::from_plan(&plan).context("failed to mount sources")?;
    Ok(vfs)
}

fn ls(args: &MountArgs, path: &str, out: &mut impl Write) -> Result<()> {
    let vfs = layered(args)?;
    let dir = vfs
        .open_directory(path)
        .with_context(|| format!("cannot list {path}"))?;

    for entry in dir.entries() {
        match entry.kind {
            EntryKind::Directory => writeln!(out, "{:>12}  {}/", "-", entry.name)?,
            EntryKind::File => writeln!(out, "{:>12}  {}", entry.size, entry.name)?,
        }
    }
    Ok(())
}

fn cat(args: &MountArgs, path: &str, out: &mut impl Write) -> Result<()> {
    let vfs = layered(args)?;
    let file = vfs
        .open_file(path)
        .with_context(|| format!("cannot open {path}"))?;

    let mut buf = vec![0u8; CAT_CHUNK];
    let mut offset = 0u64;
    loop {
        let n = file
            .read_at(offset, &mut buf)
            .with_context(|| format!("failed reading {path} at {offset}"))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        offset += n as u64;
    }
    out.flush()?;
    Ok(())
}

fn stat(args: &MountArgs, path: &str, out: &mut impl Write) -> Result<()> {
    let vfs = layered(args)?;
    let stat = vfs
        .stat(path)
        .with_context(|| format!("cannot stat {path}"))?;
    let mount = &vfs.mounts()[stat.mount];

    writeln!(out, "path:  {path}")?;
    writeln!(
        out,
        "mount: {} ({} {})",
        stat.mount,
        mount.kind(),
        mount.label()
    )?;
    match stat.kind {
        EntryKind::File => {
            writeln!(out, "kind:  file")?;
            writeln!(out, "size:  {}", stat.size)?;
        }
        EntryKind::Directory => {
            writeln!(out, "kind:  directory")?;
            writeln!(out, "children: {}", stat.size)?;
        }
    }
    Ok(())
}
