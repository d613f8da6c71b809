use lumen_parser::{extract_placeholder_ids, ContentRewriter, Segment, TagScanner};
use proptest::prelude::*;

fn block() -> impl Strategy<Value = (String, String)> {
    ("[a-z][a-z0-9-]{0,8}", "[a-zA-Z0-9 .,;=(){}\n]{0,40}").prop_map(|(id, body)| {
        let tag = format!(r#"<antArtifact identifier="{id}" type="text/markdown">{body}</antArtifact>"#);
        (id, tag)
    })
}

fn prose() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?\n*#-]{0,30}"
}

fn turn() -> impl Strategy<Value = (Vec<String>, String)> {
    prop::collection::vec((prose(), block()), 0..5).prop_flat_map(|parts| {
        prose().prop_map(move |tail| {
            let mut ids = Vec::new();
            let mut text = String::new();
            for (lead, (id, tag)) in &parts {
                text.push_str(lead);
                text.push_str(tag);
                ids.push(id.clone());
            }
            text.push_str(&tail);
            (ids, text)
        })
    })
}

#[test]
fn scan_without_tags_is_empty() {
    let scan = TagScanner::default().scan("just prose with <b>html</b>");
    assert!(scan.is_empty());
    assert!(!scan.has_trailing_open());
}

proptest! {
    #[test]
    fn prop_scan_is_pure((_, text) in turn()) {
        let scanner = TagScanner::default();
        prop_assert_eq!(scanner.scan(&text), scanner.scan(&text));
    }

    #[test]
    fn prop_one_placeholder_per_closed_block((ids, text) in turn()) {
        let scan = TagScanner::default().scan(&text);
        let rewritten = ContentRewriter::new().rewrite(&text, &scan);

        let found: Vec<String> = extract_placeholder_ids(rewritten.as_str())
            .into_iter()
            .map(String::from)
            .collect();
        prop_assert_eq!(&found, &ids);
        prop_assert_eq!(rewritten.placeholders().len(), ids.len());
    }

    #[test]
    fn prop_every_prefix_scans_a_subset((ids, text) in turn(), cut in 0usize..400) {
        let cut = cut.min(text.len());
        let scanner = TagScanner::default();
        let partial = scanner.scan(&text[..cut]);

        // A prefix can only have finished blocks that the full text also has.
        prop_assert!(partial.len() <= ids.len());
        for (span, id) in partial.spans.iter().zip(&ids) {
            prop_assert_eq!(span.id.as_str(), id.as_str());
        }
    }

    #[test]
    fn prop_segments_cover_every_placeholder((ids, text) in turn()) {
        let scan = TagScanner::default().scan(&text);
        let rewritten = ContentRewriter::new().rewrite(&text, &scan);
        let cards = rewritten
            .segments()
            .into_iter()
            .filter(|s| matches!(s, Segment::Artifact(_)))
            .count();
        prop_assert_eq!(cards, ids.len());
    }
}
