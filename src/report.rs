use std::fmt::Write;

use crate::aggregate::{ActivityEntry, CompanyBucket, SummaryMetrics};

pub fn build_report(
    company: Option<&str>,
    window_days: i64,
    metrics: &SummaryMetrics,
    companies: &[CompanyBucket],
    feed: &[ActivityEntry],
) -> String {
    let mut output = String::new();
    let scope_label = company.unwrap_or("all companies");

    let _ = writeln!(output, "# Drug Shortage Risk Report");
    let _ = writeln!(
        output,
        "Generated for {} (activity window {} days)",
        scope_label, window_days
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total issues: {}", metrics.total_issues);
    let _ = writeln!(
        output,
        "- Shortages: {} ({} active)",
        metrics.total_shortages, metrics.active_shortages
    );
    let _ = writeln!(
        output,
        "- Enforcement actions: {} ({} ongoing, {} Class I)",
        metrics.total_enforcements, metrics.ongoing_recalls, metrics.class_i_recalls
    );
    let _ = writeln!(
        output,
        "- Companies affected: {}",
        metrics.total_companies_affected
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Companies");

    if companies.is_empty() {
        let _ = writeln!(output, "No companies with recorded issues.");
    } else {
        for bucket in companies.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) score {:.2} [{}]: {} shortages, {} recalls",
                bucket.company_name,
                bucket.issue_type,
                bucket.risk_score,
                bucket.risk_level,
                bucket.shortage_count,
                bucket.enforcement_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Activity");

    if feed.is_empty() {
        let _ = writeln!(output, "No activity recorded in this window.");
    } else {
        for entry in feed.iter().take(10) {
            let _ = writeln!(
                output,
                "- {:?} on {}: {} / {} ({})",
                entry.activity_type, entry.issue_date, entry.company, entry.drug_name, entry.status
            );
        }
    }

    output
}
