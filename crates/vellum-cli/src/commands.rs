use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;
use vellum_sdk::{
    Checkpoint, CheckpointId, CompareTarget, ContentHash, DiffLine, DiffResult, Engine,
    EngineConfig, FileKey, Trigger,
};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let engine = open_engine(&cli)?;
    let format = cli.format;
    let result = match cli.command {
        Command::Checkpoint(args) => cmd_checkpoint(&engine, args, format),
        Command::Bookmark(args) => cmd_bookmark(&engine, args, format),
        Command::List(args) => cmd_list(&engine, args, format),
        Command::Restore(args) => cmd_restore(&engine, args),
        Command::Compare(args) => cmd_compare(&engine, args, format),
        Command::Label(args) => cmd_label(&engine, args, format),
        Command::Delete(args) => cmd_delete(&engine, args),
        Command::Gc(args) => cmd_gc(&engine, args, format),
        Command::Stats => cmd_stats(&engine, format),
        Command::Verify(args) => cmd_verify(&engine, args, format),
        Command::Recover(args) => cmd_recover(&engine, args, format),
        Command::Discard(args) => cmd_discard(&engine, args),
        Command::Wal(args) => cmd_wal(&engine, args),
    };
    engine.shutdown();
    result
}

fn open_engine(cli: &Cli) -> anyhow::Result<Engine> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    debug!(root = %config.root.display(), "opening storage");
    Engine::open(config).context("opening vellum storage")
}

fn parse_key(key: &str) -> anyhow::Result<FileKey> {
    FileKey::new(key).with_context(|| format!("invalid document key {key:?}"))
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Accept a full checkpoint id or any unique prefix of one.
fn resolve_id(engine: &Engine, key: &FileKey, id: &str) -> anyhow::Result<CheckpointId> {
    if let Ok(id) = id.parse::<CheckpointId>() {
        return Ok(id);
    }
    let listing = engine.list_checkpoints(key)?;
    let matches: Vec<_> = listing
        .checkpoints
        .into_iter()
        .filter(|cp| cp.id.to_string().starts_with(id))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => bail!("no checkpoint of {key} matches {id:?}"),
        _ => bail!("{id:?} is ambiguous ({} checkpoints match)", matches.len()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_checkpoint_line(cp: &Checkpoint) {
    let storage = if cp.delta.is_some() {
        "delta".cyan()
    } else {
        "full".blue()
    };
    let kind = if cp.is_bookmark() {
        "bookmark".magenta().bold()
    } else {
        cp.trigger.as_str().normal()
    };
    print!(
        "{}  {}  {:<16} {:<5} {:>8}B  {:+}",
        cp.id.short_id().yellow(),
        cp.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        kind,
        storage,
        cp.stats.after_size,
        cp.stats.change_size,
    );
    if let Some(label) = &cp.label {
        print!("  {}", label.bold());
    }
    println!();
    if let Some(description) = &cp.description {
        println!("    {}", description.dimmed());
    }
}

fn cmd_checkpoint(engine: &Engine, args: CheckpointArgs, format: OutputFormat) -> anyhow::Result<()> {
    let trigger: Trigger = args.trigger.parse()?;
    let key = parse_key(args.key.as_deref().unwrap_or(&args.path.to_string_lossy()))?;
    let content = read_text(&args.path)?;
    let cp = engine.create_checkpoint(&key, &content, trigger)?;
    if format == OutputFormat::Json {
        return print_json(&cp);
    }
    println!("{} Checkpoint {} for {}", "✓".green().bold(), cp.id.short_id().yellow(), key.as_str().bold());
    print_checkpoint_line(&cp);
    Ok(())
}

fn cmd_bookmark(engine: &Engine, args: BookmarkArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(args.key.as_deref().unwrap_or(&args.path.to_string_lossy()))?;
    let content = read_text(&args.path)?;
    let cp = engine.create_bookmark(&key, &content, args.label, args.description)?;
    if format == OutputFormat::Json {
        return print_json(&cp);
    }
    println!("{} Bookmark {} for {}", "✓".green().bold(), cp.id.short_id().yellow(), key.as_str().bold());
    Ok(())
}

fn cmd_list(engine: &Engine, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let listing = engine.list_checkpoints(&key)?;
    if format == OutputFormat::Json {
        #[derive(Serialize)]
        struct Listing<'a> {
            checkpoints: &'a [Checkpoint],
            warnings: &'a [vellum_sdk::CorruptCheckpoint],
        }
        return print_json(&Listing {
            checkpoints: &listing.checkpoints,
            warnings: &listing.warnings,
        });
    }

    if listing.checkpoints.is_empty() {
        println!("No checkpoints for {}.", key.as_str().bold());
    }
    // newest first
    for cp in listing.checkpoints.iter().rev() {
        print_checkpoint_line(cp);
    }
    for warning in &listing.warnings {
        let at = match (&warning.id, warning.line) {
            (Some(id), _) => id.short_id(),
            (None, Some(line)) => format!("line {line}"),
            (None, None) => "?".into(),
        };
        println!("{} {}: {}", "warning:".yellow().bold(), at, warning.reason);
    }
    Ok(())
}

fn cmd_restore(engine: &Engine, args: RestoreArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let id = resolve_id(engine, &key, &args.id)?;
    let content = engine.restore_content(&key, &id)?;
    match args.output {
        Some(path) => {
            fs::write(&path, &content).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} Restored {} to {}", "✓".green().bold(), id.short_id().yellow(), path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn cmd_compare(engine: &Engine, args: CompareArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let from = resolve_id(engine, &key, &args.from)?;
    let target = match (&args.to, &args.file) {
        (Some(to), None) => CompareTarget::Checkpoint(resolve_id(engine, &key, to)?),
        (None, Some(path)) => CompareTarget::Content(read_text(path)?),
        _ => bail!("give either a second checkpoint or --file"),
    };
    let diff = engine.compare(&key, &from, &target)?;
    if format == OutputFormat::Json {
        return print_json(&diff);
    }
    print_diff(&diff);
    Ok(())
}

fn print_diff(diff: &DiffResult) {
    if diff.is_empty() {
        println!("No changes.");
        return;
    }
    for hunk in &diff.hunks {
        println!(
            "{}",
            format!(
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            )
            .cyan()
        );
        for line in &hunk.lines {
            match line {
                DiffLine::Context(text) => println!(" {text}"),
                DiffLine::Removed(text) => println!("{}", format!("-{text}").red()),
                DiffLine::Added(text) => println!("{}", format!("+{text}").green()),
            }
        }
    }
    println!(
        "{} additions, {} deletions",
        diff.additions.len().to_string().green(),
        diff.deletions.len().to_string().red()
    );
}

fn cmd_label(engine: &Engine, args: LabelArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let id = resolve_id(engine, &key, &args.id)?;
    let cp = engine.label_checkpoint(&key, &id, args.label, args.description)?;
    if format == OutputFormat::Json {
        return print_json(&cp);
    }
    match &cp.label {
        Some(label) => println!("{} Labeled {} {}", "✓".green().bold(), id.short_id().yellow(), label.bold()),
        None => println!("{} Cleared label of {}", "✓".green().bold(), id.short_id().yellow()),
    }
    Ok(())
}

fn cmd_delete(engine: &Engine, args: CheckpointRefArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let id = resolve_id(engine, &key, &args.id)?;
    engine.delete_checkpoint(&key, &id)?;
    println!("{} Deleted checkpoint {}", "✓".green().bold(), id.short_id().yellow());
    println!("  Run {} to reclaim its storage.", "vellum gc".bold());
    Ok(())
}

fn cmd_gc(engine: &Engine, args: GcArgs, format: OutputFormat) -> anyhow::Result<()> {
    let keep = args
        .keep
        .iter()
        .map(|hex| hex.parse::<ContentHash>().with_context(|| format!("invalid hash {hex:?}")))
        .collect::<anyhow::Result<HashSet<_>>>()?;
    let report = engine.run_gc(&keep)?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    println!(
        "{} GC: {} checkpoints pruned, {} blobs removed, {} reachable.",
        "✓".green().bold(),
        report.pruned,
        report.removed.to_string().bold(),
        report.reachable
    );
    Ok(())
}

fn cmd_stats(engine: &Engine, format: OutputFormat) -> anyhow::Result<()> {
    let stats = engine.get_storage_stats()?;
    if format == OutputFormat::Json {
        return print_json(&stats);
    }
    println!("Storage root: {}", engine.config().root.display().to_string().bold());
    println!("  Blobs:        {} ({} bytes)", stats.blob_count, stats.blob_bytes);
    println!("  Documents:    {}", stats.documents);
    println!(
        "  Checkpoints:  {} ({} bookmarks, {} delta)",
        stats.checkpoints, stats.bookmarks, stats.delta_checkpoints
    );
    if stats.corrupt_records > 0 {
        println!("  Corrupt:      {}", stats.corrupt_records.to_string().red().bold());
    }
    println!("  Pending WAL:  {}", stats.pending_wal);
    Ok(())
}

fn cmd_verify(engine: &Engine, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let keys = match &args.key {
        Some(key) => vec![parse_key(key)?],
        None => engine.documents()?,
    };

    #[derive(Serialize)]
    struct Problem {
        file_key: FileKey,
        #[serde(flatten)]
        problem: vellum_sdk::CorruptCheckpoint,
    }

    let mut problems = Vec::new();
    for key in keys {
        for problem in engine.verify_history(&key)? {
            problems.push(Problem {
                file_key: key.clone(),
                problem,
            });
        }
    }

    if format == OutputFormat::Json {
        print_json(&problems)?;
    } else if problems.is_empty() {
        println!("{} All checkpoints reconstruct cleanly", "✓".green().bold());
    } else {
        for p in &problems {
            let at = p
                .problem
                .id
                .as_ref()
                .map(|id| id.short_id())
                .or_else(|| p.problem.line.map(|l| format!("line {l}")))
                .unwrap_or_default();
            println!("{} {} {}: {}", "✗".red().bold(), p.file_key.as_str().bold(), at, p.problem.reason);
        }
    }

    if !problems.is_empty() {
        bail!("{} corrupt checkpoint(s) found", problems.len());
    }
    Ok(())
}

fn cmd_recover(engine: &Engine, args: RecoverArgs, format: OutputFormat) -> anyhow::Result<()> {
    let entries = engine.scan_for_recovery()?;
    if format == OutputFormat::Json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("Nothing to recover.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{} {} (last edited {}, {} bytes)",
            "●".yellow(),
            entry.file_key.as_str().bold(),
            entry.updated_at.format("%Y-%m-%d %H:%M:%S"),
            entry.content.len()
        );
        if args.show {
            println!("{}", entry.content);
        }
    }
    println!("\nRestore by saving the content, or drop it with {}.", "vellum discard <key>".bold());
    Ok(())
}

fn cmd_discard(engine: &Engine, args: KeyArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    if engine.discard_recovery(&key)? {
        println!("{} Discarded recovery entry for {}", "✓".green().bold(), key.as_str().bold());
    } else {
        println!("No recovery entry for {}.", key.as_str().bold());
    }
    Ok(())
}

fn cmd_wal(engine: &Engine, args: WalArgs) -> anyhow::Result<()> {
    match args.action {
        WalAction::Start { key, path } => {
            let key = parse_key(&key)?;
            engine.start_wal(&key, &read_text(&path)?);
            println!("{} Logging {}", "✓".green().bold(), key.as_str().bold());
        }
        WalAction::Update { key, path } => {
            let key = parse_key(&key)?;
            engine.update_wal(&key, &read_text(&path)?);
            println!("{} Updated log for {}", "✓".green().bold(), key.as_str().bold());
        }
        WalAction::Stop { key } => {
            let key = parse_key(&key)?;
            engine.stop_wal(&key);
            println!("{} Stopped logging {}", "✓".green().bold(), key.as_str().bold());
        }
    }
    Ok(())
}
