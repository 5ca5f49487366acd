// tests/curate_regular.rs
use std::collections::HashSet;

use research_digest::{
    AnnotatedItem, Annotation, BacklogStore, Category, Curator, DigestMode, ItemKind,
    MemoryBacklog, RawItem, SignalType,
};

fn item(link: &str, score: i64, category: Category) -> AnnotatedItem {
    let kind = if category == Category::TopPaper {
        ItemKind::Paper
    } else {
        ItemKind::Blog
    };
    AnnotatedItem::new(
        RawItem {
            title: format!("title {link}"),
            link: link.to_string(),
            summary: String::new(),
            source: "Test Feed".into(),
            published: "2025-01-07T08:00:00Z".parse().unwrap(),
            kind,
        },
        Annotation {
            relevance_score: score,
            category: Some(category),
            ..Annotation::default()
        },
    )
}

const CATS: [Category; 4] = [
    Category::TopNews,
    Category::TopPaper,
    Category::TopRepo,
    Category::TopVideo,
];

fn links(items: &[AnnotatedItem]) -> Vec<&str> {
    items.iter().map(|i| i.link()).collect()
}

#[test]
fn simple_regular_day() {
    // scores 10..1 twice, categories rotating
    let items: Vec<AnnotatedItem> = (0..20)
        .map(|i| {
            let score = 10 - (i % 10) as i64;
            item(&format!("https://t.test/{i}"), score, CATS[i % 4])
        })
        .collect();

    let store = MemoryBacklog::default();
    let curator = Curator::new(store);
    let sel = curator.curate(items, false).unwrap();

    assert_eq!(sel.mode, DigestMode::Regular);
    assert!(sel.trending.is_none());
    // 7 valid scores (10..4) per round
    assert_eq!(sel.items.len(), 14);
    assert!(sel.items.iter().all(|i| i.score() >= 4));
    let scores: Vec<i64> = sel.items.iter().map(|i| i.score()).collect();
    assert_eq!(scores, vec![10, 10, 9, 9, 8, 8, 7, 7, 6, 6, 5, 5, 4, 4]);
    // ties keep arrival order
    assert_eq!(sel.items[0].link(), "https://t.test/0");
    assert_eq!(sel.items[1].link(), "https://t.test/10");

    assert!(curator.store().snapshot().is_empty());
    assert_eq!(curator.store().save_count(), 1);
}

#[test]
fn leftovers_go_to_backlog_ahead_of_older_entries() {
    let today: Vec<AnnotatedItem> = (0..20)
        .map(|i| item(&format!("https://t.test/{i}"), 5 + (i % 2) as i64, Category::TopNews))
        .collect();
    let older = vec![
        item("https://old.test/a", 9, Category::TopNews),
        item("https://t.test/3", 9, Category::TopNews),
        item("https://old.test/junk", 1, Category::TopNews),
    ];
    let curator = Curator::new(MemoryBacklog::new(older));
    let sel = curator.curate(today, false).unwrap();

    assert_eq!(sel.items.len(), 15);
    let backlog = curator.store().snapshot();
    let chosen: HashSet<&str> = links(&sel.items).into_iter().collect();
    // 5 leftovers from today, then the surviving old entry
    assert_eq!(backlog.len(), 6);
    assert!(backlog[..5].iter().all(|i| i.link().starts_with("https://t.test/")));
    assert!(backlog.iter().all(|i| !chosen.contains(i.link())));
    assert_eq!(backlog[5].link(), "https://old.test/a");
    // the stored copy of a link seen today is dropped
    assert!(chosen.contains("https://t.test/3"));
    assert!(backlog.iter().all(|i| i.link() != "https://t.test/3"));
}

#[test]
fn backlog_is_capped() {
    let today: Vec<AnnotatedItem> = (0..130)
        .map(|i| item(&format!("https://t.test/{i}"), 6, Category::TopNews))
        .collect();
    let older: Vec<AnnotatedItem> = (0..50)
        .map(|i| item(&format!("https://old.test/{i}"), 6, Category::TopNews))
        .collect();
    let curator = Curator::new(MemoryBacklog::new(older));
    curator.curate(today, false).unwrap();

    let backlog = curator.store().snapshot();
    assert_eq!(backlog.len(), 100);
    // newest leftovers win the space
    assert_eq!(backlog[0].link(), "https://t.test/15");
    assert!(backlog.iter().all(|i| i.link().starts_with("https://t.test/")));
}

#[test]
fn detailed_and_signals_are_disjoint_and_signals_hold_no_papers() {
    let mut today = vec![
        item("https://n.test/1", 10, Category::TopNews),
        item("https://arxiv.org/abs/1", 9, Category::TopPaper),
        item("https://arxiv.org/abs/2", 6, Category::TopPaper),
        item("https://github.com/o/r", 7, Category::TopRepo),
        item("https://youtu.be/x", 9, Category::TopVideo),
    ];
    let mut rel = item("https://n.test/rel", 5, Category::TopNews);
    rel.annotation.signal_type = Some(SignalType::Release);
    today.push(rel);
    today.push(item("https://n.test/plain", 5, Category::TopNews));

    let curator = Curator::new(MemoryBacklog::default());
    let sel = curator.curate(today, false).unwrap();

    assert_eq!(
        links(&sel.detailed_items),
        vec![
            "https://n.test/1",
            "https://arxiv.org/abs/1",
            "https://youtu.be/x",
            "https://github.com/o/r"
        ]
    );
    assert_eq!(
        links(&sel.signals),
        vec!["https://n.test/rel", "https://n.test/plain"]
    );
    let detailed: HashSet<&str> = links(&sel.detailed_items).into_iter().collect();
    assert!(sel.signals.iter().all(|s| !detailed.contains(s.link())));
    assert!(sel.signals.iter().all(|s| !s.is_paper()));
    assert!(sel.detailed_items.len() + sel.signals.len() <= 15);
}

#[test]
fn duplicate_links_keep_first_occurrence() {
    let today = vec![
        item("https://n.test/dup", 5, Category::TopNews),
        item("https://n.test/dup", 10, Category::TopNews),
    ];
    let curator = Curator::new(MemoryBacklog::default());
    let sel = curator.curate(today, false).unwrap();
    assert_eq!(sel.items.len(), 1);
    assert_eq!(sel.items[0].score(), 5);
}

#[test]
fn empty_day_still_rewrites_backlog() {
    let older = vec![
        item("https://old.test/keep", 7, Category::TopNews),
        item("https://old.test/drop", 3, Category::TopNews),
    ];
    let curator = Curator::new(MemoryBacklog::new(older));
    let sel = curator.curate(Vec::new(), false).unwrap();
    assert!(sel.items.is_empty());
    assert!(sel.detailed_items.is_empty() && sel.signals.is_empty());
    assert_eq!(links(&curator.store().load().unwrap()), vec!["https://old.test/keep"]);
}
