//! Integration Test: Untracked Spawn Prohibition
//!
//! **Policy**: background work (replication, secondary deletes) MUST go
//! through `BackgroundTasks` so shutdown can drain it and its outcome is
//! counted. A bare `tokio::spawn` detaches the task from both.

use architectural_enforcement::production_sources;

/// The tracker itself owns the `JoinSet`
const ALLOWED: &[&str] = &["routing/tasks.rs"];

#[test]
fn test_no_untracked_spawn_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        let path = file.path.to_string_lossy().replace('\\', "/");
        if ALLOWED.iter().any(|allowed| path.ends_with(allowed)) {
            continue;
        }
        for (line_number, code) in file.production_lines() {
            if code.contains("tokio::spawn") || code.contains("tokio::task::spawn") {
                violations.push(file.violation(line_number, "Untracked spawn"));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\nDetached tasks found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nSpawn through BackgroundTasks::spawn so shutdown can drain the task.");

        panic!("Found {} untracked spawn(s) in production code", violations.len());
    }
}
