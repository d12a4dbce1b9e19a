use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use log::{debug, info};
use nobifinder_core::{FinderError, MemberKind, resolve_target_file};
use nobifinder_usages::Config;
use std::io::{BufWriter, Write};
use std::process;
use std::time::Instant;

const EXIT_FOUND: i32 = 0;
const EXIT_NOT_FOUND: i32 = 1;
const EXIT_ERROR: i32 = 2;

fn init_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn list_members<W: Write>(writer: &mut W, cfg: &Config) -> Result<()> {
    let target = resolve_target_file(&cfg.target)?;
    writeln!(writer, "{}", target.fqn.bold())?;
    for (label, kind) in [("Methods", MemberKind::Method), ("Fields", MemberKind::Field)] {
        let names = target.members_of(kind);
        let listed = if names.is_empty() { "(none)".dimmed().to_string() } else { names.join(", ") };
        writeln!(writer, "  {}: {}", label, listed)?;
    }
    writer.flush()?;
    Ok(())
}

fn run(mut cfg: Config) -> Result<i32> {
    // stdio is blocked by LineWriter, use a BufWriter to reduce syscalls.
    // See https://github.com/rust-lang/rust/issues/60673
    let mut stdout = BufWriter::new(std::io::stdout());

    cfg.initialize()?;
    if cfg.list_members {
        list_members(&mut stdout, &cfg)?;
        return Ok(EXIT_FOUND);
    }

    let start = Instant::now();
    let num_threads =
        if cfg.max_workers == 0 { rayon::current_num_threads() } else { cfg.max_workers };
    info!("Searching {} usages (using {} threads)", cfg.mode, num_threads);
    debug!("Config: root={:?}, target={:?}, member={:?}", cfg.root, cfg.target, cfg.member);

    let (json, with_lines, limit) = (cfg.json, cfg.with_lines, cfg.limit);
    let result = nobifinder_usages::run_usage_search(cfg)?;
    debug!("Found {} files with usages", result.results.len());
    let elapsed_ms = start.elapsed().as_millis();

    if json {
        nobifinder_usages::print_json(&mut stdout, &result, with_lines)?;
    } else {
        nobifinder_usages::print_usage_table(&mut stdout, &result, with_lines, limit)?;
        if !result.results.is_empty() {
            writeln!(stdout)?;
            nobifinder_usages::print_summary(&mut stdout, &result)?;
        }
        writeln!(
            stdout,
            "\n{} Finished in {}ms on {} files (using {} threads).",
            "●".bright_blue(),
            elapsed_ms.to_string().cyan(),
            result.stats.files_scanned.to_string().cyan(),
            num_threads.to_string().cyan()
        )?;
    }
    stdout.flush()?;

    Ok(if result.results.is_empty() { EXIT_NOT_FOUND } else { EXIT_FOUND })
}

fn main() {
    let cfg = Config::parse();
    init_logger(cfg.verbose);
    if cfg.no_color {
        colored::control::set_override(false);
    }
    debug!("Parsed CLI arguments: {:?}", cfg);

    let code = match run(cfg) {
        Ok(code) => code,
        Err(err) => {
            debug!("Fatal error: {:?}", err);
            eprintln!("{} {:#}", "error:".red().bold(), err);
            if matches!(
                err.downcast_ref::<FinderError>(),
                Some(FinderError::UnknownMember { .. } | FinderError::MissingMember(_))
            ) {
                eprintln!("{} run with --list-members to see what the target declares", "hint:".dimmed());
            }
            EXIT_ERROR
        }
    };
    process::exit(code);
}
