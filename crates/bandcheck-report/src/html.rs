//! HTML results page.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use bandcheck_core::band::BandTable;
use bandcheck_core::report::AttemptReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Generate the results page for one attempt, with `table` drawn as a band scale.
pub fn generate_html(report: &AttemptReport, table: &BandTable) -> String {
    let mut html = String::new();
    let result = &report.result;

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>bandcheck results: {}</title>\n",
        html_escape(&report.test.name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&report.test.name)));
    html.push_str(&format!(
        "<p class=\"meta\">{} | {} questions | time {} | {}</p>\n",
        report.test.module,
        report.test.question_count,
        format_duration(report.time_taken_secs),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<div class=\"cards\">\n");
    html.push_str(&format!(
        "<div class=\"card\"><span class=\"label\">Score</span><span class=\"value\">{}/{}</span></div>\n",
        result.correct, result.total
    ));
    html.push_str(&format!(
        "<div class=\"card\"><span class=\"label\">Percentage</span><span class=\"value\">{}%</span></div>\n",
        result.percentage
    ));
    html.push_str(&format!(
        "<div class=\"card band\"><span class=\"label\">Band</span><span class=\"value\">{}</span></div>\n",
        report.band
    ));
    html.push_str("</div>\n");

    if let Some(saved) = &report.saved {
        if !saved.success {
            html.push_str(&format!(
                "<p class=\"warning\">Score was not saved: {}</p>\n",
                html_escape(saved.error.as_deref().unwrap_or("unknown error"))
            ));
        }
    }

    html.push_str(&generate_band_scale(table, result.correct, result.total));
    html.push_str("</section>\n");

    // Per-question results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Answers</h2>\n");
    html.push_str("<label><input type=\"checkbox\" id=\"only-wrong\" onchange=\"filterWrong(this.checked)\"> Show only incorrect</label>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th>Question</th><th>Type</th><th>Your answer</th><th>Correct answer</th><th>Result</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for o in &result.outcomes {
        let class = if o.correct { "pass" } else { "fail" };
        let mark = if o.correct { "&#10003;" } else { "&#10007;" };
        let given = match &o.given {
            Some(g) if !g.trim().is_empty() => html_escape(g),
            _ => "<em>no answer</em>".to_string(),
        };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            class,
            html_escape(&o.question_id),
            o.kind,
            given,
            html_escape(&o.expected),
            mark
        ));
    }

    html.push_str("</tbody></table>\n");

    if !result.ignored.is_empty() {
        html.push_str(&format!(
            "<p class=\"meta\">Ignored answers for unknown questions: {}</p>\n",
            html_escape(&result.ignored.join(", "))
        ));
    }
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the results page to a file.
pub fn write_html_report(report: &AttemptReport, table: &BandTable, path: &Path) -> Result<()> {
    let html = generate_html(report, table);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

/// Horizontal scale of the table's thresholds with the learner's position marked.
fn generate_band_scale(table: &BandTable, correct: u32, total: u32) -> String {
    let width = 600usize;
    let left = 20usize;
    let bar_y = 40usize;
    let bar_height = 16usize;
    let reference = table.reference_total.max(1) as usize;

    let x_for = |count: usize| left + count.min(reference) * width / reference;

    let position = if total == 0 {
        0
    } else {
        (correct.min(total) as usize) * reference / total as usize
    };

    let mut svg = format!(
        "<svg width=\"{}\" height=\"90\" xmlns=\"http://www.w3.org/2000/svg\" class=\"band-scale\">\n",
        width + 2 * left
    );
    svg.push_str(&format!(
        "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"var(--border)\" rx=\"4\"/>\n",
        left, bar_y, width, bar_height
    ));
    svg.push_str(&format!(
        "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#3b82f6\" rx=\"4\"/>\n",
        left,
        bar_y,
        x_for(position) - left,
        bar_height
    ));

    for step in table.steps() {
        let x = x_for(step.min_correct as usize);
        svg.push_str(&format!(
            "  <line x1=\"{x}\" y1=\"{}\" x2=\"{x}\" y2=\"{}\" stroke=\"currentColor\" stroke-width=\"1\"/>\n",
            bar_y - 4,
            bar_y + bar_height + 4
        ));
        svg.push_str(&format!(
            "  <text x=\"{x}\" y=\"{}\" font-size=\"10\" fill=\"currentColor\" text-anchor=\"middle\">{}</text>\n",
            bar_y - 8,
            step.band
        ));
    }

    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" text-anchor=\"middle\">{}/{}</text>\n",
        x_for(position),
        bar_y + bar_height + 20,
        position,
        reference
    ));
    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.cards { display: flex; gap: 1rem; margin: 1rem 0; }
.card { border: 1px solid var(--border); border-radius: 8px; padding: 1rem 1.5rem; display: flex; flex-direction: column; }
.card .label { font-size: 0.8rem; color: #6b7280; text-transform: uppercase; }
.card .value { font-size: 2rem; font-weight: bold; }
.card.band .value { color: #3b82f6; }
.warning { color: #b45309; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function filterWrong(only) {
  const rows = document.querySelectorAll('#results tbody tr');
  rows.forEach(r => { r.style.display = only && r.classList.contains('pass') ? 'none' : ''; });
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use bandcheck_core::band::Band;
    use bandcheck_core::model::{AnswerKey, AnswerSet, TestModule};
    use bandcheck_core::report::TestSummary;
    use bandcheck_core::scoring::compute_score;
    use bandcheck_core::traits::SaveOutcome;

    fn make_test_report() -> AttemptReport {
        let key = AnswerKey::from_entries(
            "sample-reading",
            "Sample <Reading>",
            TestModule::AcademicReading,
            [("1", "TRUE"), ("2", "B"), ("3a", "books"), ("3b", "activities")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
            vec![],
        );
        let answers: AnswerSet = [("1", "true"), ("3a", "books"), ("3b", "a & b")]
            .into_iter()
            .collect();
        let result = compute_score(&answers, &key);
        AttemptReport {
            id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            test: TestSummary::from(&key),
            result,
            band: Band::from_f64(3.5).unwrap(),
            time_taken_secs: 3725,
            saved: None,
        }
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report();
        let html = generate_html(&report, &BandTable::academic_reading());

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Sample &lt;Reading&gt;"));
        assert!(html.contains("1/3"));
        assert!(html.contains("3.5"));
        assert!(html.contains("62:05"));
        assert!(html.contains("<em>no answer</em>"));
        assert!(html.contains("a &amp; b"));
        assert!(html.contains("<svg"));
    }

    #[test]
    fn unsaved_score_is_flagged() {
        let mut report = make_test_report();
        report.saved = Some(SaveOutcome::failed("network error: refused"));
        let html = generate_html(&report, &BandTable::academic_reading());
        assert!(html.contains("Score was not saved: network error: refused"));

        report.saved = Some(SaveOutcome::saved());
        let html = generate_html(&report, &BandTable::academic_reading());
        assert!(!html.contains("Score was not saved"));
    }

    #[test]
    fn band_scale_scales_to_reference() {
        let svg = generate_band_scale(&BandTable::listening(), 2, 4);
        assert!(svg.contains(">20/40<"));
        let svg = generate_band_scale(&BandTable::listening(), 0, 0);
        assert!(svg.contains(">0/40<"));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_html_report(&report, &BandTable::academic_reading(), &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
