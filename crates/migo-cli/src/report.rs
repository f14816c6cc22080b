use migo_db::{MigrationReport, Outcome, StatusReport};

/// Print one line per file followed by a summary.
pub fn print_apply(report: &MigrationReport) {
    for line in apply_lines(report) {
        println!("{line}");
    }
}

pub fn print_status(status: &StatusReport) {
    for line in status_lines(status) {
        println!("{line}");
    }
}

fn apply_lines(report: &MigrationReport) -> Vec<String> {
    let mut lines: Vec<String> = report.files.iter().map(|r| r.to_string()).collect();

    let failed = report.failed().count();
    let deferred = report
        .files
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Deferred(_)))
        .count();

    if report.files.is_empty() && report.cancelled.is_none() {
        lines.push("Nothing to migrate".to_string());
    } else {
        lines.push(format!(
            "{} migrated, {failed} failed, {deferred} deferred",
            report.applied_count()
        ));
    }

    if let Some(reason) = &report.cancelled {
        lines.push(format!("Stopped early: {reason}"));
    }
    lines
}

fn status_lines(status: &StatusReport) -> Vec<String> {
    let id_w = status
        .applied
        .iter()
        .map(|r| r.id.to_string().len())
        .chain(status.pending.iter().map(|f| f.id.to_string().len()))
        .max()
        .unwrap_or(1);

    let mut lines = Vec::new();
    lines.push(format!("Applied ({})", status.applied.len()));
    for r in &status.applied {
        lines.push(format!("  {:>id_w$}  {}  {}", r.id, r.migrated_at, r.name));
    }

    lines.push(format!("Pending ({})", status.pending.len()));
    for f in &status.pending {
        lines.push(format!("  {:>id_w$}  {}", f.id, f.file_name));
    }

    if !status.rollback_files.is_empty() {
        let names: Vec<&str> = status
            .rollback_files
            .iter()
            .map(|f| f.file_name.as_str())
            .collect();
        lines.push(format!("Rollback files (not run): {}", names.join(", ")));
    }
    lines
}
