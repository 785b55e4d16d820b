//! Terminal output formatting

use ragbot_core::{Answer, CollectionInfo, Role, Turn, TurnContent};
use std::fmt::Write;

/// Answer text followed by its sources, if any
pub fn answer(answer: &Answer) -> String {
    let mut out = answer.response.clone();
    let sources = answer.sources();
    if sources.is_empty() {
        return out;
    }

    out.push_str("\n\nView Sources\n");
    for (i, source) in sources.iter().enumerate() {
        let _ = writeln!(
            out,
            "  Source {} (Similarity: {}%)\n  {}",
            i + 1,
            source.similarity,
            source.content
        );
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn turn(turn: &Turn) -> String {
    match (&turn.role, &turn.content) {
        (Role::Assistant, TurnContent::Answer(a)) => format!("assistant: {}", answer(a)),
        (role, _) => format!("{role}: {}", turn.text()),
    }
}

pub fn history(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "(no turns yet)".to_string();
    }
    turns.iter().map(turn).collect::<Vec<_>>().join("\n\n")
}

pub fn collection(info: &CollectionInfo) -> String {
    let schema = serde_json::to_string_pretty(&info.schema).unwrap_or_else(|_| "{}".to_string());
    let dimension = info
        .dimension
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "Collection: {}\nMetric: {}\nDimension: {}\nSize: {}\nSchema:\n{}",
        info.name,
        info.metric,
        dimension,
        info.size_label(),
        schema
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_core::{Metric, Passage};

    #[test]
    fn test_sources_block() {
        let a = Answer::with_sources(
            "Milvus is a vector database.",
            vec![
                Passage {
                    content: "first".to_string(),
                    similarity: 88.0,
                },
                Passage {
                    content: "second".to_string(),
                    similarity: 75.25,
                },
            ],
        );

        assert_eq!(
            answer(&a),
            "Milvus is a vector database.\n\nView Sources\n  Source 1 (Similarity: 88%)\n  first\n  Source 2 (Similarity: 75.25%)\n  second"
        );
    }

    #[test]
    fn test_plain_answer_has_no_sources_block() {
        assert_eq!(answer(&Answer::plain("no luck")), "no luck");
    }

    #[test]
    fn test_history() {
        assert_eq!(history(&[]), "(no turns yet)");
        let turns = vec![Turn::user("hi"), Turn::assistant(Answer::plain("hello"))];
        assert_eq!(history(&turns), "user: hi\n\nassistant: hello");
    }

    #[test]
    fn test_collection_unknown_size() {
        let info = CollectionInfo {
            name: "docs".to_string(),
            dimension: None,
            metric: Metric::Cosine,
            schema: serde_json::json!({}),
            entity_count: None,
        };
        let text = collection(&info);
        assert!(text.contains("Size: Unknown"));
        assert!(text.contains("Dimension: Unknown"));
        assert!(text.contains("Metric: COSINE"));
    }
}
