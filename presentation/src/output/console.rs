//! Console output formatter for consensus responses

use colored::Colorize;
use verity_application::{HealthReport, RunConsensusError};
use verity_domain::{ConsensusResponse, OutputFormat, ProviderId};

/// Longest evidence excerpt shown in full output
const EXCERPT_PREVIEW: usize = 160;

/// Formats consensus responses for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Render `response` in the requested format
    pub fn render(response: &ConsensusResponse, format: OutputFormat) -> String {
        match format {
            OutputFormat::Full => Self::format(response),
            OutputFormat::Answer => Self::format_answer_only(response),
            OutputFormat::Json => Self::format_json(response),
        }
    }

    /// Answer, scores, evidence and the full reasoning trace
    pub fn format(response: &ConsensusResponse) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Verity Consensus"));
        output.push('\n');

        output.push_str(&format!("{}\n{}\n\n", "Answer:".cyan().bold(), response.final_answer));

        if let Some(rep) = &response.representative_model {
            output.push_str(&format!("{} {}\n", "Representative:".cyan().bold(), rep));
        }
        output.push_str(&format!(
            "{} {}\n",
            "Agreeing providers:".cyan().bold(),
            join_ids(&response.contributing_models)
        ));
        if !response.contradicting_models.is_empty() {
            output.push_str(&format!(
                "{} {}\n",
                "Contradicted by evidence:".red().bold(),
                join_ids(&response.contradicting_models)
            ));
        }

        output.push_str(&Self::section_header("Scores"));
        output.push_str(&format!(
            "\n  model consensus  {}\n  web validation   {}\n  composite        {}\n",
            score(response.model_consensus_score),
            score(response.web_validation_score),
            score(response.composite_confidence).bold()
        ));

        if !response.evidence_used.is_empty() {
            output.push_str(&Self::section_header("Evidence"));
            for (url, excerpt) in &response.evidence_used {
                output.push_str(&format!(
                    "\n{}\n  {}\n",
                    url.yellow(),
                    preview(excerpt, EXCERPT_PREVIEW)
                ));
            }
        }

        let trace = &response.reasoning_trace;
        output.push_str(&Self::section_header("Reasoning"));
        output.push_str(&format!("\n{} {}\n", "Decided by:".cyan().bold(), trace.tie_break));
        for cluster in &trace.clusters {
            let marker = if trace.winning_fingerprint.as_deref() == Some(cluster.fingerprint.as_str()) {
                "*".green().bold().to_string()
            } else {
                " ".to_string()
            };
            output.push_str(&format!(
                "{} [{}] members={} confidence={:.4} trust={:.4} tfidf={:.4}\n",
                marker,
                short_fingerprint(&cluster.fingerprint),
                join_ids(&cluster.members),
                cluster.avg_confidence,
                cluster.trust_weight,
                cluster.tfidf_alignment
            ));
        }

        if !trace.per_model_scores.is_empty() {
            output.push_str(&format!("\n{}\n", "Per-provider scores:".cyan().bold()));
            for (provider, value) in &trace.per_model_scores {
                output.push_str(&format!("  {:<20} {:.4}\n", provider, value));
            }
        }

        let facts = &trace.fact_summary;
        output.push_str(&format!(
            "\n{} {} supported, {} contradicted, {} unknown\n",
            "Facts:".cyan().bold(),
            facts.supported.to_string().green(),
            facts.contradicted.to_string().red(),
            facts.unknown
        ));
        for fact in &trace.validated_facts {
            output.push_str(&format!(
                "  [{}] {} ({}, {:.2})\n",
                fact.verdict,
                fact.fact,
                fact.provider,
                fact.confidence
            ));
        }

        let meta = &response.meta;
        output.push_str(&Self::section_header("Run"));
        output.push_str(&format!(
            "\n  cache: {}  providers: {}/{} succeeded  policy: {}\n",
            meta.cache, meta.succeeded, meta.dispatched, meta.policy
        ));
        for (name, ms) in &meta.latencies {
            output.push_str(&format!("  {:<28} {} ms\n", name, ms));
        }

        output.push_str(&Self::footer());
        output
    }

    /// The response contract as pretty JSON
    pub fn format_json(response: &ConsensusResponse) -> String {
        serde_json::to_string_pretty(response).unwrap_or_else(|_| "{}".to_string())
    }

    /// Final answer with its composite confidence
    pub fn format_answer_only(response: &ConsensusResponse) -> String {
        format!(
            "{}\n\n{} {}\n",
            response.final_answer,
            "confidence:".dimmed(),
            score(response.composite_confidence)
        )
    }

    /// One line per provider health probe
    pub fn format_health(reports: &[HealthReport]) -> String {
        let mut output = Self::section_header("Provider health");
        output.push('\n');
        for report in reports {
            let status = if report.healthy {
                "ok".green().bold()
            } else {
                "down".red().bold()
            };
            output.push_str(&format!(
                "  {:<20} {:<5} {:>6} ms {}\n",
                report.provider.as_str(),
                status,
                report.latency_ms,
                report.detail.as_deref().unwrap_or("")
            ));
        }
        output
    }

    /// Failure line with its stable reason code
    pub fn format_error(error: &RunConsensusError) -> String {
        format!("{} {} ({})", "Error:".red().bold(), error, error.code())
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.cyan().bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n", format!("-- {} --", title).yellow().bold())
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

fn join_ids(ids: &[ProviderId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(ProviderId::as_str).collect::<Vec<_>>().join(", ")
}

fn score(value: f64) -> colored::ColoredString {
    let text = format!("{:.4}", value);
    if value >= 0.7 {
        text.green()
    } else if value >= 0.4 {
        text.yellow()
    } else {
        text.red()
    }
}

fn short_fingerprint(fingerprint: &str) -> &str {
    match fingerprint.char_indices().nth(12) {
        Some((idx, _)) => &fingerprint[..idx],
        None => fingerprint,
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
