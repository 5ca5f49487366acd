// tests/curate_annotation.rs
use research_digest::{Curator, MemoryBacklog};
use serde_json::json;

#[test]
fn list_wrapped_annotation_is_unwrapped_and_counts_as_valid() {
    let values = vec![json!({
        "title": "Wrapped",
        "link": "https://a.test/wrapped",
        "published": "2025-01-07T08:00:00Z",
        "type": "blog",
        "annotation": [{ "relevance_score": 9 }]
    })];
    let curator = Curator::new(MemoryBacklog::default());
    let sel = curator.curate_values(values, false).unwrap();
    assert_eq!(sel.items.len(), 1);
    assert_eq!(sel.items[0].score(), 9);
    assert_eq!(sel.detailed_items.len(), 1);
}

#[test]
fn unusable_annotations_score_zero_and_are_dropped() {
    let values = vec![
        json!({ "link": "https://a.test/none", "published": "2025-01-07T08:00:00Z" }),
        json!({ "link": "https://a.test/null", "published": "2025-01-07T08:00:00Z", "annotation": null }),
        json!({ "link": "https://a.test/empty", "published": "2025-01-07T08:00:00Z", "annotation": [] }),
        json!({ "link": "https://a.test/text", "published": "2025-01-07T08:00:00Z", "annotation": "9" }),
        json!({ "link": "https://a.test/ok", "published": "2025-01-07T08:00:00Z",
                "processed": { "relevance_score": "7", "category": "Top News" } }),
        json!(["not", "an", "item"]),
    ];
    let curator = Curator::new(MemoryBacklog::default());
    let sel = curator.curate_values(values, false).unwrap();
    assert_eq!(sel.items.len(), 1);
    assert_eq!(sel.items[0].link(), "https://a.test/ok");
    assert!(curator.store().snapshot().is_empty());
}
