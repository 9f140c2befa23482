use std::io::Write;
use std::path::Path;

use anyhow::Context as _;
use colored::Colorize;
use serde_json::json;
use wordstore_cdb::{write_dump, CdbReader, CdbResult, CdbWriter};
use wordstore_overlay::{OverlayStore, DUMP_SUFFIX};
use wordstore_persist::{sibling, AtomicPersister};
use wordstore_store::{HashFileStore, MutableStore, OpenMode, ReadableStore, StoreError};

use crate::cli::*;
use crate::config::CliConfig;

/// Settings shared by every command.
pub struct Context {
    pub config: CliConfig,
    pub format: OutputFormat,
}

impl Context {
    fn persister(&self) -> AtomicPersister {
        AtomicPersister::new(self.config.persist.clone())
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context {
        config: CliConfig::load(cli.config.as_deref())?,
        format: cli.format,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Dump(args) => cmd_dump(&ctx, args, &mut out),
        Command::Get(args) => cmd_get(&ctx, args, &mut out),
        Command::Stats(args) => cmd_stats(&ctx, args, &mut out),
        Command::Edit(args) => cmd_edit(&ctx, args, &mut out),
        Command::Compile(args) => cmd_compile(&ctx, args, &mut out),
    }
}

fn open_index(ctx: &Context, path: &Path) -> anyhow::Result<CdbReader> {
    let bytes = ctx
        .persister()
        .load(path)
        .with_context(|| format!("cannot load index {}", path.display()))?;
    CdbReader::from_bytes(bytes).with_context(|| format!("invalid index {}", path.display()))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn cmd_dump(ctx: &Context, args: DumpArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let reader = open_index(ctx, &args.index)?;
    let records = reader.iter().collect::<CdbResult<Vec<_>>>()?;
    match ctx.format {
        OutputFormat::Text => write_dump(out, records)?,
        OutputFormat::Json => {
            let items: Vec<_> = records
                .iter()
                .map(|(k, v)| json!({ "key": lossy(k), "value": lossy(v) }))
                .collect();
            serde_json::to_writer_pretty(&mut *out, &items)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn cmd_get(ctx: &Context, args: GetArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let reader = open_index(ctx, &args.index)?;
    let Some(value) = reader.get(args.key.as_bytes())? else {
        return Err(StoreError::NotFound(args.key).into());
    };
    match ctx.format {
        OutputFormat::Text => {
            out.write_all(value)?;
            writeln!(out)?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", json!({ "key": args.key, "value": lossy(value) }))?;
        }
    }
    Ok(())
}

fn cmd_stats(ctx: &Context, args: StatsArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let reader = open_index(ctx, &args.index)?;
    match ctx.format {
        OutputFormat::Text => {
            writeln!(out, "{} {}", "Index:".bold(), args.index.display())?;
            writeln!(out, "  Records: {}", reader.len().to_string().cyan())?;
            writeln!(out, "  Size:    {} bytes", reader.size_bytes())?;
        }
        OutputFormat::Json => {
            let stats = json!({
                "index": args.index.display().to_string(),
                "records": reader.len(),
                "bytes": reader.size_bytes(),
            });
            writeln!(out, "{stats}")?;
        }
    }
    Ok(())
}

fn cmd_edit(ctx: &Context, args: EditArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let sets = args
        .set
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .with_context(|| format!("--set expects KEY=VALUE, got {pair:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut store =
        OverlayStore::open_compiled(&args.index, ctx.persister(), ctx.config.overlay.clone())?;
    for (key, value) in &sets {
        store.set(key.as_bytes(), value.as_bytes())?;
    }
    for key in &args.delete {
        store.delete(key.as_bytes())?;
    }
    let changed = store.is_dirty();
    store.close()?;

    let records = store.layer().reader().map_or(0, CdbReader::len);
    match ctx.format {
        OutputFormat::Text if changed => writeln!(
            out,
            "{} {}: {} set, {} deleted, {} records",
            "✓".green().bold(),
            args.index.display(),
            sets.len(),
            args.delete.len(),
            records
        )?,
        OutputFormat::Text => writeln!(out, "No changes.")?,
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({
                "index": args.index.display().to_string(),
                "set": sets.len(),
                "deleted": args.delete.len(),
                "records": records,
            })
        )?,
    }
    Ok(())
}

fn cmd_compile(ctx: &Context, args: CompileArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let source = HashFileStore::open(&args.hashfile, OpenMode::ReadOnly)
        .with_context(|| format!("cannot open {}", args.hashfile.display()))?;

    let mut writer = CdbWriter::new();
    for entry in source.iter()? {
        let (key, value) = entry?;
        writer.add(&key, &value)?;
    }
    let count = writer.len();
    let bytes = writer.finish_to_bytes()?;

    let persister = ctx.persister();
    persister.save(&args.index, &bytes)?;
    if ctx.config.overlay.backup_dump {
        let reader = CdbReader::from_bytes(bytes)?;
        let mut dump = Vec::new();
        write_dump(&mut dump, reader.iter().collect::<CdbResult<Vec<_>>>()?)?;
        persister.save(&sibling(&args.index, DUMP_SUFFIX), &dump)?;
    }

    match ctx.format {
        OutputFormat::Text => writeln!(
            out,
            "{} Compiled {} records into {}",
            "✓".green().bold(),
            count,
            args.index.display()
        )?,
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({ "index": args.index.display().to_string(), "records": count })
        )?,
    }
    Ok(())
}
