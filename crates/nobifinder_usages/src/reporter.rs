use std::{
    collections::BTreeSet,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};

use colored::Colorize;
use log::{debug, trace};
use serde::Serialize;

use nobifinder_core::{FileResult, SearchMode, UsageHit};

use crate::types::{ScanStats, SearchResult};

const SNIPPET_WIDTH: usize = 80;

/// Relativize a path to the current working directory for clickable links
fn relativize_to_cwd(root: &Path, relative_to_root: &Path) -> String {
    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(_) => {
            debug!("Failed to get current directory");
            return posix(relative_to_root);
        }
    };
    trace!("Relativizing {:?} from root {:?} to cwd {:?}", relative_to_root, root, cwd);

    let abs_path = root.join(relative_to_root);
    match make_relative(&abs_path, &cwd) {
        Some(rel_path) => posix(&rel_path),
        None => {
            trace!("Could not relativize {:?}, using root-relative path", relative_to_root);
            posix(relative_to_root)
        }
    }
}

/// Create a relative path from `base` to `target`
fn make_relative(target: &Path, base: &Path) -> Option<PathBuf> {
    use std::path::Component;

    let mut target_components = target.components();
    let mut base_components = base.components();

    let mut common_prefix_len = 0;
    let mut target_parts = Vec::new();
    let mut base_parts = Vec::new();

    loop {
        match (target_components.next(), base_components.next()) {
            (Some(t), Some(b)) if t == b => {
                common_prefix_len += 1;
            }
            (Some(t), Some(b)) => {
                target_parts.push(t);
                base_parts.push(b);
                break;
            }
            (Some(t), None) => {
                target_parts.push(t);
                break;
            }
            (None, Some(b)) => {
                base_parts.push(b);
                break;
            }
            (None, None) => return Some(PathBuf::from(".")),
        }
    }

    target_parts.extend(target_components);
    base_parts.extend(base_components);

    if common_prefix_len == 0 && target.components().next() != base.components().next() {
        return None;
    }

    let mut result = PathBuf::new();
    for _ in &base_parts {
        result.push("..");
    }
    for component in target_parts {
        match component {
            Component::Normal(p) => result.push(p),
            Component::ParentDir => result.push(".."),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if result.as_os_str().is_empty() { Some(PathBuf::from(".")) } else { Some(result) }
}

/// Path with `/` separators regardless of platform.
fn posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn truncate(snippet: &str, width: usize) -> String {
    if snippet.chars().count() <= width {
        return snippet.to_string();
    }
    let mut cut: String = snippet.chars().take(width).collect();
    cut.push_str("...");
    cut
}

fn members_of(result: &FileResult) -> String {
    let members: BTreeSet<&str> = result.hits().iter().filter_map(|h| h.member.as_deref()).collect();
    members.into_iter().collect::<Vec<_>>().join(",")
}

fn line_list(result: &FileResult) -> String {
    result.hits().iter().map(|h| h.line.to_string()).collect::<Vec<_>>().join(",")
}

pub fn print_no_usage_message<W: Write>(writer: &mut W) -> io::Result<()> {
    debug!("No usage found");
    writeln!(writer, "No usage found.")?;
    writer.flush()?;
    Ok(())
}

/// Table of files with hits, optionally followed by each hit.
pub fn print_usage_table<W: Write>(
    writer: &mut W,
    result: &SearchResult,
    with_lines: bool,
    limit: Option<usize>,
) -> io::Result<()> {
    debug!("Printing usage table for {} files", result.results.len());
    if result.results.is_empty() {
        return print_no_usage_message(writer);
    }

    let total = result.results.len();
    let shown = &result.results[..limit.map_or(total, |l| l.min(total))];
    if shown.len() < total {
        writeln!(writer, "Showing first {} of {} files", shown.len(), total)?;
    }

    let paths: Vec<String> =
        shown.iter().map(|r| relativize_to_cwd(&result.root, &r.path)).collect();
    let path_width = paths.iter().map(|p| p.chars().count()).max().unwrap_or(0).max("Path".len());
    let count_width = "Matches".len();
    let member_mode = result.mode != SearchMode::Class;

    let mut header = format!("{:<path_width$} {:<count_width$}", "Path", "Matches");
    if with_lines {
        header.push_str(" Lines");
    }
    if member_mode {
        header.push_str(" Member(s)");
    }
    writeln!(writer, "{}", header.bold())?;
    writeln!(writer, "{}", "-".repeat(header.len()).dimmed())?;

    for (file, path) in shown.iter().zip(&paths) {
        trace!("Printing {} with {} hits", path, file.count());
        let mut row = format!(
            "{} {}",
            format!("{:<path_width$}", path).green(),
            format!("{:<count_width$}", file.count())
        );
        if with_lines {
            row.push_str(&format!(" {}", line_list(file).blue()));
        }
        if member_mode {
            row.push_str(&format!(" {}", members_of(file).yellow()));
        }
        writeln!(writer, "{}", row.trim_end())?;

        if with_lines {
            for hit in file.hits() {
                print_hit(writer, hit)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

fn print_hit<W: Write>(writer: &mut W, hit: &UsageHit) -> io::Result<()> {
    let position = format!("{}:{}", hit.line, hit.column);
    let label = match &hit.member {
        Some(member) => format!("{} {}", hit.kind, member),
        None => hit.kind.to_string(),
    };
    writeln!(
        writer,
        "  {:>8}  {}  {}",
        position.cyan(),
        label.yellow(),
        truncate(&hit.snippet, SNIPPET_WIDTH)
    )
}

/// One-line statistics after the table.
pub fn print_summary<W: Write>(writer: &mut W, result: &SearchResult) -> io::Result<()> {
    let ScanStats { files_scanned, files_skipped, syntax_fallbacks } = result.stats;
    let mut line = format!(
        "{} {} in {} files ({} scanned",
        result.total_hits().to_string().bold(),
        if result.total_hits() == 1 { "usage" } else { "usages" },
        result.results.len().to_string().bold(),
        files_scanned
    );
    if files_skipped > 0 {
        line.push_str(&format!(", {} skipped", files_skipped.to_string().yellow()));
    }
    if syntax_fallbacks > 0 {
        line.push_str(&format!(", {} syntax fallbacks", syntax_fallbacks.to_string().yellow()));
    }
    line.push(')');
    writeln!(writer, "{line}")?;
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonTarget<'a> {
    package: &'a str,
    class_name: &'a str,
    fqn: &'a str,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: String,
    count: usize,
    package: Option<&'a str>,
    line_hits: &'a [UsageHit],
}

#[derive(Serialize)]
struct JsonReport<'a> {
    target: JsonTarget<'a>,
    mode: SearchMode,
    members: &'a [String],
    results: Vec<JsonFile<'a>>,
    stats: ScanStats,
}

fn json_report(result: &SearchResult, with_lines: bool) -> JsonReport<'_> {
    JsonReport {
        target: JsonTarget {
            package: &result.target.package,
            class_name: &result.target.class_name,
            fqn: &result.target.fqn,
        },
        mode: result.mode,
        members: &result.members,
        results: result
            .results
            .iter()
            .map(|file| JsonFile {
                path: posix(&file.path),
                count: file.count(),
                package: file.package.as_deref(),
                line_hits: if with_lines { file.hits() } else { &[] },
            })
            .collect(),
        stats: result.stats,
    }
}

/// Pretty-printed JSON document; paths are relative to the root.
pub fn print_json<W: Write>(writer: &mut W, result: &SearchResult, with_lines: bool) -> io::Result<()> {
    debug!("Printing JSON for {} files", result.results.len());
    serde_json::to_writer_pretty(&mut *writer, &json_report(result, with_lines))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
