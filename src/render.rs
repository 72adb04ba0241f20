//! Markdown rendering of results for CLI output and tool responses.

use kb_index_core::models::SearchMatch;

use crate::index_manager::UpdateReport;
use crate::ingest::PendingUrlRequest;

pub fn search_results(matches: &[SearchMatch]) -> String {
    if matches.is_empty() {
        return "No similar results found.".to_string();
    }

    let mut out = String::from("## Semantic Search Results\n\n");
    for (i, m) in matches.iter().enumerate() {
        let source = serde_json::json!({
            "source": m.metadata.source,
            "score": m.score,
        });
        let source = serde_json::to_string_pretty(&source).unwrap_or_default();
        out.push_str(&format!(
            "**Result {}:**\n\n{}\n\n**Source:**\n```json\n{}\n```\n\n",
            i + 1,
            m.text.trim(),
            source
        ));
    }
    out.push_str("> Results are ordered by distance; lower scores are closer matches.\n");
    out
}

pub fn pending_requests(requests: &[PendingUrlRequest]) -> String {
    if requests.is_empty() {
        return "No pending URL requests.".to_string();
    }
    requests
        .iter()
        .map(|r| {
            format!(
                "- {} [{}] {} → {} ({})",
                r.id,
                r.suggested_at.format("%Y-%m-%d %H:%M"),
                r.url,
                r.knowledge_base,
                r.reason
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn update_report(report: &UpdateReport) -> String {
    let mut out = format!(
        "  files scanned: {}\n  files indexed: {}\n  files unchanged: {}\n  files failed: {}\n  chunks added: {}",
        report.files_scanned,
        report.files_changed,
        report.files_skipped,
        report.files_failed,
        report.chunks_added
    );
    if report.rebuilt {
        out.push_str("\n  index rebuilt from all files");
    }
    out
}
