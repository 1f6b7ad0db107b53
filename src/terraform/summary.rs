//! Lossy text scans over `terraform plan` output. Display aids only; the
//! exit code decides classification.

const MAX_RESOURCE_CHANGES: usize = 10;

/// Pull the plan's change-count summary plus up to ten resource-change
/// entries out of the raw output. Falls back to a generic sentence when no
/// summary line is present.
pub fn extract_plan_summary(plan_output: &str) -> String {
    let lines: Vec<&str> = plan_output.lines().collect();
    let mut summary = Vec::new();
    let mut changes = Vec::new();
    let mut capture_changes = false;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if line.contains("Plan:")
            || line.contains("No changes")
            || line.contains("to add")
            || line.contains("to change")
            || line.contains("to destroy")
        {
            summary.push(trimmed);
        }

        if line.contains("Terraform will perform the following actions:") {
            capture_changes = true;
            continue;
        }

        if capture_changes
            && changes.len() < MAX_RESOURCE_CHANGES
            && (trimmed.starts_with('#')
                || trimmed.starts_with('~')
                || trimmed.starts_with('+')
                || trimmed.starts_with('-'))
        {
            changes.push(trimmed);
        }

        if line.contains("will be")
            && (line.contains("created")
                || line.contains("destroyed")
                || line.contains("updated")
                || line.contains("replaced"))
            && changes.len() < MAX_RESOURCE_CHANGES
        {
            changes.push(trimmed);
        }

        // Section divider ends the action list.
        if capture_changes && (line.contains("─────────────") || i > lines.len().saturating_sub(10)) {
            capture_changes = false;
        }
    }

    let mut result = if summary.is_empty() {
        "Drift detected in Terraform configuration".to_string()
    } else {
        summary.join("\n")
    };

    if !changes.is_empty() {
        result.push_str("\n\nResource Changes Detected:");
        for change in &changes {
            result.push_str("\n  ");
            result.push_str(change);
        }
        if changes.len() == MAX_RESOURCE_CHANGES {
            result.push_str("\n  ... (more changes, see full plan for details)");
        }
    }

    result
}

/// First `limit` lines of plan output worth showing on the console,
/// skipping blanks and refresh boilerplate.
pub fn relevant_lines(plan_output: &str, limit: usize) -> Vec<&str> {
    let mut relevant = Vec::new();

    for line in plan_output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with("Refreshing")
            || trimmed.starts_with("Reading...")
            || trimmed.starts_with("Read complete")
        {
            continue;
        }
        relevant.push(line);
        if relevant.len() >= limit {
            break;
        }
    }

    relevant
}
