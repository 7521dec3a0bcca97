//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the display core and daemon MUST NOT call
//! sleep methods. The clock advances on `tokio::time::interval`, and every
//! other wait is on I/O or a channel.
//! **Exceptions**: test code

use std::fs;
use std::path::Path;

use architectural_enforcement::{rust_sources, workspace_root, PRODUCTION_DIRS};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let root = workspace_root();
    let mut violations = Vec::new();
    let mut scanned = 0;

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        assert!(path.exists(), "missing source directory {}", path.display());
        for file in rust_sources(&path) {
            scanned += 1;
            check_file(&file, &mut violations);
        }
    }

    assert!(scanned > 0, "no production sources were scanned");

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE: test code, periodic work via tokio::time::interval()");
        eprintln!("❌ FORBIDDEN: sleep in polling loops or as synchronization");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();
    let test_module_start = test_module_line(&lines);

    for (idx, line) in lines.iter().enumerate() {
        if test_module_start.is_some_and(|start| idx >= start) {
            break;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        if is_sleep_call(code_part) && !is_in_test_function(&lines, idx) {
            violations.push(format!(
                "{}:{} - {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    }
}

fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(")
}

/// Index of the `#[cfg(test)]` attribute that opens the test module
fn test_module_line(lines: &[&str]) -> Option<usize> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        let next = lines.get(idx + 1).map_or("", |l| l.trim());
        (line.trim() == "#[cfg(test)]" && next.starts_with("mod ")).then_some(idx)
    })
}

/// Check if line is inside a test function
fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    // Scan backwards for #[test] or #[tokio::test]
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }

        if line.starts_with("fn ") || line.starts_with("pub fn ") || line.starts_with("async fn ") {
            // the attribute sits directly above the signature
            let above = i.checked_sub(1).map_or("", |j| lines[j].trim());
            return above.starts_with("#[test]") || above.starts_with("#[tokio::test");
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || line.starts_with("impl ") {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_violation_detection() {
        let code = vec![
            "fn bad_function() {",
            "    tokio::time::sleep(Duration::from_millis(10)).await;",
            "}",
        ];
        assert!(is_sleep_call(code[1]));
        assert!(!is_in_test_function(&code, 1));
    }

    #[test]
    fn test_sleep_in_test_function_allowed() {
        let code = vec![
            "#[tokio::test]",
            "async fn waits() {",
            "    tokio::time::sleep(Duration::from_millis(10)).await;",
            "}",
        ];
        assert!(is_in_test_function(&code, 2));
    }

    #[test]
    fn test_module_boundary_found() {
        let code = vec!["fn a() {}", "", "#[cfg(test)]", "mod tests {", "}"];
        assert_eq!(test_module_line(&code), Some(2));
    }

    #[test]
    fn test_interval_is_not_sleep() {
        assert!(!is_sleep_call("let mut ticker = tokio::time::interval(period);"));
        assert!(!is_sleep_call("ticker.tick().await;"));
    }
}
