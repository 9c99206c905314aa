//! End-to-end linking over an on-disk knowledge base.
//!
//! Hyperlink propagation → greedy alias matching → pronoun coreference,
//! reading and writing JSONL the way the CLI does.

use kblink::io::{read_articles, write_article};
use kblink::{
    Article, CorefLinkerKind, EntityDatabase, Error, HyperlinkLinkerKind, LinkerConfig, LinkerKind,
    LinkingSystem, MappingName, PrecomputedAnnotator, Span, TsvSource,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const TEXT: &str = "Barack Obama was born in Hawaii. Obama moved to Washington. He met Michelle Obama there.";

fn write_kb(dir: &Path) {
    let files = [
        (
            "entities.tsv",
            "Q76\tBarack Obama\t300\nQ13133\tMichelle Obama\t200\nQ61\tWashington, D.C.\t250\n",
        ),
        (
            "aliases.tsv",
            "Barack Obama\tQ76\nObama\tQ76\nMichelle Obama\tQ13133\nWashington\tQ61\n",
        ),
        (
            "wikipedia_wikidata.tsv",
            "Barack Obama\tQ76\nMichelle Obama\tQ13133\nWashington, D.C.\tQ61\n",
        ),
        ("redirects.tsv", "Obama\tBarack Obama\n"),
        (
            "link_frequencies.tsv",
            "Obama\tBarack Obama\t50\nWashington\tWashington, D.C.\t30\nMichelle Obama\tMichelle Obama\t10\n",
        ),
        ("gender.tsv", "Q76\tmale\nQ13133\tfemale\n"),
        ("names.tsv", "Q76\tBarack Obama\nQ13133\tMichelle Obama\n"),
        ("types.tsv", "Q76\tQ5\nQ13133\tQ5\n"),
        ("unigrams.tsv", "washington\t5\n"),
    ];
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
}

fn annotations() -> PrecomputedAnnotator {
    let line = r#"{"id": 1,
        "sentences": [[0, 32], [33, 59], [60, 88]],
        "tokens": [
            {"span": [0, 6], "text": "Barack", "tag": "NNP", "dep": "compound"},
            {"span": [7, 12], "text": "Obama", "tag": "NNP", "dep": "nsubjpass"},
            {"span": [33, 38], "text": "Obama", "tag": "NNP", "dep": "nsubj"},
            {"span": [48, 58], "text": "Washington", "tag": "NNP", "dep": "pobj"},
            {"span": [60, 62], "text": "He", "tag": "PRP", "dep": "nsubj"},
            {"span": [67, 75], "text": "Michelle", "tag": "NNP", "dep": "compound"},
            {"span": [76, 81], "text": "Obama", "tag": "NNP", "dep": "dobj"}
        ]}"#
    .replace('\n', " ");
    PrecomputedAnnotator::from_reader(line.as_bytes()).unwrap()
}

fn span(start: usize, end: usize) -> Span {
    Span::new(start, end).unwrap()
}

fn article_line() -> String {
    format!(
        r#"{{"id": 1, "title": "Barack Obama", "text": "{}", "hyperlinks": [[[67, 81], "Michelle Obama"]]}}"#,
        TEXT
    )
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_kb(dir.path());
    let db = Arc::new(EntityDatabase::new(TsvSource::new(dir.path())));
    let system = LinkingSystem::builder(LinkerKind::AliasMatcher)
        .hyperlink(HyperlinkLinkerKind::HyperlinkReference)
        .coref(CorefLinkerKind::KbCoref)
        .annotator(annotations())
        .build(Arc::clone(&db))
        .unwrap();
    for mapping in MappingName::ALL {
        assert!(db.is_loaded(mapping), "{} should be loaded", mapping);
    }

    let input = format!("{}\n", article_line());
    let mut output = Vec::new();
    let report = system
        .run(read_articles(input.as_bytes()), |a| write_article(&mut output, a))
        .unwrap();
    assert_eq!(report.articles, 1);
    assert_eq!(report.mentions, 5);
    assert_eq!(report.unresolved, 0);
    assert!(report.failures.is_empty());

    let linked: Vec<Article> = read_articles(output.as_slice())
        .collect::<kblink::Result<_>>()
        .unwrap();
    let article = &linked[0];
    let expect = [
        ((0, 12), "Q76", "HRL Reference"),
        ((33, 38), "Q76", "HRL Reference"),
        ((48, 58), "Q61", "Alias Prior"),
        ((60, 62), "Q76", "KB Coref"),
        ((67, 81), "Q13133", "HRL: Hyperlink"),
    ];
    assert_eq!(article.mention_count(), expect.len());
    for ((start, end), id, linked_by) in expect {
        let mention = article.mention(&span(start, end)).unwrap();
        assert_eq!(mention.entity_id(), Some(id), "span [{}, {})", start, end);
        assert_eq!(mention.linked_by(), Some(linked_by), "span [{}, {})", start, end);
    }
    let he = article.mention(&span(60, 62)).unwrap();
    assert_eq!(he.referenced_span, Some(span(0, 12)));
}

#[test]
fn test_alias_matcher_alone_uses_prior() {
    let dir = tempfile::tempdir().unwrap();
    write_kb(dir.path());
    let db = Arc::new(EntityDatabase::new(TsvSource::new(dir.path())));
    let system = LinkingSystem::builder(LinkerKind::AliasMatcher)
        .build(Arc::clone(&db))
        .unwrap();
    assert!(!db.is_loaded(MappingName::Gender));

    let (article, outcome) = system.process(Article::new(1, "", TEXT)).unwrap();
    assert_eq!(outcome.added, 4);
    let spans: Vec<Span> = article.mentions().map(|m| m.span()).collect();
    assert_eq!(spans, vec![span(0, 12), span(33, 38), span(48, 58), span(67, 81)]);
    assert!(article.mention(&span(60, 62)).is_none());
}

#[test]
fn test_malformed_kb_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_kb(dir.path());
    fs::write(dir.path().join("aliases.tsv"), "Obama\tQ76\nbroken row\n").unwrap();
    let db = Arc::new(EntityDatabase::new(TsvSource::new(dir.path())));
    let err = LinkingSystem::builder(LinkerKind::AliasMatcher)
        .build(db)
        .unwrap_err();
    assert!(err.is_fatal());
    match err {
        Error::DataLoad { mapping, line, .. } => {
            assert_eq!(mapping, MappingName::Aliases);
            assert_eq!(line, 2);
        }
        other => panic!("expected a data load error, got {other}"),
    }
}

#[test]
fn test_config_file_drives_uppercase_mode() {
    let dir = tempfile::tempdir().unwrap();
    write_kb(dir.path());
    fs::write(dir.path().join("aliases.tsv"), "Barack Obama\tQ76\nObama\tQ76\n").unwrap();
    let config_path = dir.path().join("kblink.toml");
    fs::write(
        &config_path,
        format!(
            "kb_dir = {:?}\nuppercase_only = true\nmax_alias_tokens = 1\n",
            dir.path().display().to_string()
        ),
    )
    .unwrap();
    let config = LinkerConfig::from_file(&config_path).unwrap();
    assert!(config.uppercase_only);

    let db = Arc::new(EntityDatabase::new(TsvSource::new(&config.kb_dir)));
    let system = LinkingSystem::builder(LinkerKind::AliasMatcher)
        .config(config)
        .build(db)
        .unwrap();
    // One-token matches only: "Barack Obama" is out of reach, "Obama" is not.
    let (article, _) = system.process(Article::new(1, "", TEXT)).unwrap();
    let spans: Vec<Span> = article.mentions().map(|m| m.span()).collect();
    assert_eq!(spans, vec![span(7, 12), span(33, 38), span(76, 81)]);
}
