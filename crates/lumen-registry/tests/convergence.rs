use lumen_parser::TagScanner;
use lumen_registry::ArtifactRegistry;
use proptest::prelude::*;

/// Comparable registry state, ignoring timestamps
fn state(registry: &ArtifactRegistry) -> Vec<(String, String, String, bool, String)> {
    registry
        .list()
        .map(|a| {
            (
                a.id().to_string(),
                a.hash().to_string(),
                a.title().to_string(),
                a.is_closed(),
                a.kind().display_label().to_string(),
            )
        })
        .collect()
}

fn ingest(registry: &mut ArtifactRegistry, scanner: &TagScanner, text: &str) {
    let scan = scanner.scan(text);
    registry.upsert_all(scanner.drafts(&scan));
}

fn turn() -> impl Strategy<Value = String> {
    let block = (
        prop_oneof![Just("a"), Just("b"), Just("c")],
        prop_oneof![Just("text/html"), Just("text/markdown"), Just("application/vnd.ant.code")],
        "[a-z0-9 =;\n]{0,24}",
    )
        .prop_map(|(id, ty, body)| format!(r#"<artifact identifier="{id}" type="{ty}">{body}</artifact>"#));
    prop::collection::vec(("[a-zA-Z .\n]{0,12}", block), 1..5).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(lead, block)| lead + &block)
            .collect::<String>()
    })
}

proptest! {
    #[test]
    fn prop_streaming_converges_to_direct_scan(text in turn(), step in 1usize..20) {
        let scanner = TagScanner::default();

        let mut streamed = ArtifactRegistry::new();
        let mut end = 0;
        while end < text.len() {
            end = (end + step).min(text.len());
            ingest(&mut streamed, &scanner, &text[..end]);
        }

        let mut direct = ArtifactRegistry::new();
        ingest(&mut direct, &scanner, &text);

        prop_assert_eq!(state(&streamed), state(&direct));
    }

    #[test]
    fn prop_growing_content_keeps_identity(body in "[a-z ]{1,40}", cut in 1usize..40) {
        let cut = cut.min(body.len());
        let scanner = TagScanner::default();
        let mut registry = ArtifactRegistry::new();

        ingest(&mut registry, &scanner, &format!(r#"<artifact id="x">{}</artifact>"#, &body[..cut]));
        let created = registry.get("x").map(|a| a.created_at());

        ingest(&mut registry, &scanner, &format!(r#"<artifact id="x">{body}</artifact>"#));
        prop_assert_eq!(registry.len(), 1);
        prop_assert_eq!(registry.get("x").map(|a| a.created_at()), created);
    }
}
