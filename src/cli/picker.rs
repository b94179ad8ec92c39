//! Interactive datafile picker.
//!
//! Used when `mcreep fit` is run without datafiles: lists `*.txt` files under
//! the current directory and lets the user choose one, all, or type a path.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Default directory recursion depth for finding datafiles.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Extension of datafiles offered by the picker.
const DATAFILE_EXTENSION: &str = "txt";

/// Prompt the user to select datafiles from the current directory tree.
///
/// Accepts a number from the list, `a` for all listed files, or an explicit
/// path; `q` cancels.
pub fn prompt_for_datafiles() -> Result<Vec<PathBuf>, AppError> {
    let files = discover_datafiles();
    if files.is_empty() {
        return Err(AppError::input(
            "No .txt datafiles found. Provide them with `mcreep fit <FILES>...`.",
        ));
    }

    println!("Found {} datafile(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {}", idx + 1, pretty_path(path));
    }

    loop {
        print!(
            "Select a file by number (1-{}), `a` for all, or type a path (q to quit): ",
            files.len()
        );
        io::stdout()
            .flush()
            .map_err(|e| AppError::input(format!("Failed to write prompt: {e}")))?;

        let mut input = String::new();
        let bytes = io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::input(format!("Failed to read input: {e}")))?;

        if bytes == 0 {
            return Err(AppError::input(
                "No input received. Provide datafiles with `mcreep fit <FILES>...`.",
            ));
        }

        let input = input.trim();
        if input.eq_ignore_ascii_case("q") {
            return Err(AppError::input("Canceled."));
        }
        if input.eq_ignore_ascii_case("a") {
            return Ok(files);
        }

        if let Ok(choice) = input.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return Ok(vec![files[choice - 1].clone()]);
            }
            println!("Invalid choice: {choice}. Enter a number between 1 and {}.", files.len());
            continue;
        }

        match validate_datafile_path(Path::new(input)) {
            Ok(path) => return Ok(vec![path]),
            Err(err) => println!("{err}"),
        }
    }
}

/// Validate that `path` points to an existing file.
pub fn validate_datafile_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::input(format!("Datafile not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(AppError::input(format!(
            "Expected a file, got a directory: {}",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

/// Discover `*.txt` files under the current directory (deterministic order).
///
/// Shared by the text prompt and the TUI.
pub fn discover_datafiles() -> Vec<PathBuf> {
    find_datafiles(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_datafiles(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_datafiles_inner(root, 0, max_depth, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn find_datafiles_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                find_datafiles_inner(&path, depth + 1, max_depth, out);
            }
            continue;
        }

        if file_type.is_file() && is_datafile(&path) && !is_report(&path) {
            out.push(path);
        }
    }
}

fn is_datafile(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DATAFILE_EXTENSION))
}

// Our own final reports are text files too.
fn is_report(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with("mcreep_results"))
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

pub fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_txt_files_and_skips_reports_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("b.txt"), "0 1\n").unwrap();
        fs::write(root.join("a.TXT"), "0 1\n").unwrap();
        fs::write(root.join("notes.csv"), "x").unwrap();
        fs::write(root.join("mcreep_results.txt"), "x").unwrap();
        fs::create_dir(root.join("target")).unwrap();
        fs::write(root.join("target").join("c.txt"), "0 1\n").unwrap();
        fs::create_dir(root.join("data")).unwrap();
        fs::write(root.join("data").join("d.txt"), "0 1\n").unwrap();

        let found: Vec<String> = find_datafiles(root, 2)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(found.len(), 3);
        assert!(found.contains(&"a.TXT".to_string()));
        assert!(found.contains(&"d.txt".to_string()));
        assert!(!found.contains(&"c.txt".to_string()));
    }

    #[test]
    fn validate_rejects_missing_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            validate_datafile_path(&dir.path().join("nope.txt")).unwrap_err().exit_code(),
            2
        );
        assert!(validate_datafile_path(dir.path()).is_err());
    }
}
