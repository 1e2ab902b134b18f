//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code in the router and CLI MUST NOT block the runtime.
//! **Required**: `tokio::fs`, `tokio::net`, and async `reqwest`, not `std::fs`,
//! `std::net`, `std::process`, or `reqwest::blocking`.

use architectural_enforcement::production_sources;

const FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs", "Blocking file I/O"),
    ("std::net", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
];

const FORBIDDEN_IN_ASYNC: &[(&str, &str)] = &[
    ("std::io::stdin()", "Blocking stdin in async"),
    ("std::thread::sleep", "Thread sleep in async"),
];

#[test]
fn test_no_blocking_io_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (line_number, code) in file.production_lines() {
            for (pattern, what) in FORBIDDEN {
                if code.contains(pattern) {
                    violations.push(file.violation(line_number, what));
                }
            }
            for (pattern, what) in FORBIDDEN_IN_ASYNC {
                if code.contains(pattern) && file.is_in_async_function(line_number) {
                    violations.push(file.violation(line_number, what));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse tokio::fs, tokio::net, tokio::time::sleep, and async reqwest instead.");

        panic!("Found {} blocking I/O violation(s) in production code", violations.len());
    }
}
