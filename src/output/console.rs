use crate::analysis::{Analysis, RiskLevel, TyposquatMatch, VulnerableDependency};
use crate::fix::{FixResult, FixStatus};
use crate::ScanReport;

fn risk_tag(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Critical => "[CRITICAL]",
        RiskLevel::High => "[HIGH]    ",
        RiskLevel::Medium => "[MEDIUM]  ",
        RiskLevel::Low => "[LOW]     ",
    }
}

/// Render a full scan: vulnerabilities, then suspicious names, then a totals line.
pub fn render_scan(report: &ScanReport) -> String {
    let mut output = render_analysis(&report.analysis);
    if !report.typosquats.is_empty() {
        output.push_str(&render_typosquats(&report.typosquats));
    }
    output.push_str(&format!(
        "  Scanned {} gem(s): {} vulnerability(ies), {} suspicious name(s)\n\n",
        report.dependencies.len(),
        report.analysis.vulnerability_count(),
        report.typosquats.len(),
    ));
    output
}

/// Vulnerabilities grouped by severity (critical first), then gem name.
pub fn render_analysis(analysis: &Analysis) -> String {
    let mut output = String::new();

    if !analysis.has_vulnerabilities() {
        output.push_str("\n  No vulnerabilities found.\n\n");
        return output;
    }

    let mut sorted: Vec<&VulnerableDependency> = analysis.vulnerable_dependencies.iter().collect();
    sorted.sort_by(|a, b| {
        b.severity()
            .cmp(&a.severity())
            .then_with(|| a.dependency.name.cmp(&b.dependency.name))
    });

    output.push_str(&format!(
        "\n  {} vulnerability(ies) found, {} high/critical:\n\n",
        analysis.vulnerability_count(),
        analysis.high_severity_count()
    ));

    for vd in sorted {
        output.push_str(&format!(
            "  {} {} {} {}\n",
            vd.severity().tag(),
            vd.dependency.name,
            vd.dependency.version,
            vd.vulnerability.id
        ));
        if !vd.vulnerability.summary.is_empty() {
            output.push_str(&format!("           {}\n", vd.vulnerability.summary));
        }
        output.push_str(&format!("           fix: {}\n", vd.recommended_fix));
        output.push('\n');
    }

    output
}

pub fn render_typosquats(matches: &[TyposquatMatch]) -> String {
    let mut output = String::new();

    if matches.is_empty() {
        output.push_str("\n  No suspicious gem names found.\n\n");
        return output;
    }

    output.push_str(&format!("\n  {} suspicious gem name(s):\n\n", matches.len()));
    for m in matches {
        output.push_str(&format!(
            "  {} {} {} resembles {} (similarity {:.2}, {} downloads)\n",
            risk_tag(m.risk_level),
            m.gem_name,
            m.version,
            m.suspected_target,
            m.similarity_score,
            m.target_downloads
        ));
    }
    output.push('\n');
    output
}

pub fn render_fix(result: &FixResult) -> String {
    let mut output = format!("\n  {}\n", result.message);

    if !result.fixes.is_empty() {
        let heading = match result.status {
            FixStatus::DryRun => "Planned",
            _ => "Applied",
        };
        output.push_str(&format!("\n  {}:\n", heading));
        for fix in &result.fixes {
            output.push_str(&format!(
                "    {} {} -> {} ({})\n",
                fix.gem_name, fix.current_version, fix.target_version, fix.vulnerability_id
            ));
        }
    }

    if !result.failures.is_empty() {
        output.push_str("\n  Failed:\n");
        for failure in &result.failures {
            output.push_str(&format!(
                "    {} -> {}: {}\n",
                failure.fix.gem_name, failure.fix.target_version, failure.error
            ));
        }
    }

    if let Some(path) = &result.backup_path {
        output.push_str(&format!("\n  Backup: {}\n", path.display()));
    }
    if result.relocked == Some(false) {
        output.push_str("  Warning: relock failed; run `bundle install` manually.\n");
    }
    output.push('\n');
    output
}
