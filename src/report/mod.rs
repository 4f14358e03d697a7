// src/report/mod.rs — Meeting report rendering
//
// Turns a finished run and its steps into shareable output: a markdown
// transcript, a minimal standalone HTML page, machine-readable JSON, or a
// CSV of the step ledger.

use serde_json::json;

use crate::core::types::{ChainStep, MeetingRun};
use crate::infra::errors::RoundtableError;
use crate::provider::KnownProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Html,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Result<Self, RoundtableError> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(RoundtableError::validation(format!(
                "unsupported report format '{other}'. Options: markdown, html, json, csv"
            ))),
        }
    }
}

pub fn render(
    format: ReportFormat,
    run: &MeetingRun,
    steps: &[ChainStep],
) -> Result<String, RoundtableError> {
    match format {
        ReportFormat::Markdown => Ok(render_markdown(run, steps)),
        ReportFormat::Html => Ok(render_html(run, steps)),
        ReportFormat::Json => render_json(run, steps),
        ReportFormat::Csv => Ok(render_csv(steps)),
    }
}

pub fn render_markdown(run: &MeetingRun, steps: &[ChainStep]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", run.definition.name));
    if !run.definition.description.trim().is_empty() {
        out.push_str(&format!("{}\n\n", run.definition.description));
    }
    out.push_str(&format!("**Objective:** {}\n\n", run.definition.objective));
    out.push_str(&format!(
        "**Status:** {} | **Total cost:** {} | **Started:** {}\n\n",
        run.status,
        run.total_cost,
        run.created_at.to_rfc3339(),
    ));
    if let Some(ref reason) = run.error_reason {
        out.push_str(&format!("> Run ended with an error: {reason}\n\n"));
    }

    let mut iteration = 0u8;
    for step in steps.iter().filter(|s| !s.is_synthesis) {
        if step.iteration != iteration {
            iteration = step.iteration;
            out.push_str(&format!("## Round {iteration}\n\n"));
        }
        out.push_str(&format!(
            "### {} ({})\n\n",
            step.persona,
            provider_name(&step.provider)
        ));
        match step.output {
            Some(ref text) => out.push_str(&format!("{text}\n\n")),
            None => out.push_str(&format!(
                "_no output ({})_\n\n",
                step.error_reason.as_deref().unwrap_or("incomplete")
            )),
        }
    }

    if let Some(synthesis) = steps.iter().find(|s| s.is_synthesis) {
        out.push_str("## Synthesis\n\n");
        match synthesis.output {
            Some(ref text) => out.push_str(&format!("{text}\n")),
            None => out.push_str("_synthesis did not complete_\n"),
        }
    }
    out
}

pub fn render_html(run: &MeetingRun, steps: &[ChainStep]) -> String {
    let mut body = String::new();
    body.push_str(&format!("<h1>{}</h1>\n", escape_html(&run.definition.name)));
    if !run.definition.description.trim().is_empty() {
        body.push_str(&format!(
            "<p>{}</p>\n",
            escape_html(&run.definition.description)
        ));
    }
    body.push_str(&format!(
        "<p><strong>Objective:</strong> {}</p>\n",
        escape_html(&run.definition.objective)
    ));
    body.push_str(&format!(
        "<p>Status: {} · Total cost: {}</p>\n",
        run.status, run.total_cost
    ));

    let mut iteration = 0u8;
    for step in steps.iter().filter(|s| !s.is_synthesis) {
        if step.iteration != iteration {
            iteration = step.iteration;
            body.push_str(&format!("<h2>Round {iteration}</h2>\n"));
        }
        body.push_str(&format!(
            "<h3>{} ({})</h3>\n",
            escape_html(&step.persona),
            escape_html(&provider_name(&step.provider))
        ));
        if let Some(ref text) = step.output {
            body.push_str(&format!("<pre>{}</pre>\n", escape_html(text)));
        }
    }
    if let Some(synthesis) = steps.iter().find(|s| s.is_synthesis) {
        body.push_str("<h2>Synthesis</h2>\n");
        if let Some(ref text) = synthesis.output {
            body.push_str(&format!("<pre>{}</pre>\n", escape_html(text)));
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(&run.definition.name),
        body
    )
}

pub fn render_json(run: &MeetingRun, steps: &[ChainStep]) -> Result<String, RoundtableError> {
    let doc = json!({
        "run": run,
        "steps": steps,
        "exported_at": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    });
    serde_json::to_string_pretty(&doc)
        .map_err(|e| RoundtableError::Persistence(format!("report serialization failed: {e}")))
}

/// Step ledger as CSV. Fields with commas, quotes, or newlines are quoted
/// with doubled inner quotes per RFC 4180.
pub fn render_csv(steps: &[ChainStep]) -> String {
    let mut out = String::from(
        "run_id,sequence,iteration,provider,persona,status,tokens_used,cost_usd,latency_ms,is_synthesis,output\n",
    );
    for step in steps {
        let fields = [
            step.run_id.clone(),
            step.sequence.to_string(),
            step.iteration.to_string(),
            step.provider.clone(),
            step.persona.clone(),
            step.status.to_string(),
            step.tokens_used.map(|t| t.to_string()).unwrap_or_default(),
            step.cost.map(|c| c.to_string()).unwrap_or_default(),
            step.latency_ms.map(|l| l.to_string()).unwrap_or_default(),
            step.is_synthesis.to_string(),
            step.output.clone().unwrap_or_default(),
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Proper display name for known providers; raw ids pass through.
fn provider_name(id: &str) -> String {
    match KnownProvider::from_id(id) {
        Some(provider) => provider.display_name().to_string(),
        None => id.to_string(),
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
