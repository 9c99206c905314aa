//! JSONL article streams.
//!
//! Input and output share one record per line:
//!
//! ```json
//! {"id": 1, "title": "Paris", "text": "Paris is ...",
//!  "hyperlinks": [[[0, 5], "Paris"]], "title_synonyms": [[0, 5]],
//!  "entity_mentions": [{"span": [0, 5], "recognized_by": "Hyperlinks Only",
//!                       "id": "Q90", "linked_by": "Hyperlinks Only", "candidates": ["Q90"]}]}
//! ```

use crate::error::{Error, Result};
use kblink_core::Article;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Articles from a JSONL reader, one per non-empty line.
///
/// A malformed line yields an error for that line only; iteration continues.
pub fn read_articles<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Article>> {
    reader.lines().enumerate().filter_map(|(i, line)| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(
            Article::from_json(&line)
                .map_err(|e| Error::invalid_input(format!("line {}: {}", i + 1, e))),
        ),
        Err(e) => Some(Err(Error::Io(e))),
    })
}

/// Articles from a JSONL file.
pub fn open_articles(path: impl AsRef<Path>) -> Result<impl Iterator<Item = Result<Article>>> {
    let file = File::open(path.as_ref())?;
    Ok(read_articles(BufReader::new(file)))
}

/// Write one article as a JSON line.
pub fn write_article<W: Write>(writer: &mut W, article: &Article) -> Result<()> {
    let line = article.to_json()?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Buffered writer for a JSONL output file.
pub fn create_output(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path.as_ref())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kblink_core::{EntityMention, Span};

    #[test]
    fn test_reads_articles_and_reports_bad_lines() {
        let input = concat!(
            r#"{"id": 1, "title": "Paris", "text": "Paris is big.", "hyperlinks": [[[0, 5], "Paris"]]}"#,
            "\n\n",
            "not json\n",
            r#"{"id": 2, "text": "Berlin."}"#,
            "\n"
        );
        let results: Vec<Result<Article>> = read_articles(input.as_bytes()).collect();
        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.hyperlinks[0].target, "Paris");
        let err = results[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert_eq!(results[2].as_ref().unwrap().id, 2);
    }

    #[test]
    fn test_write_then_read_keeps_mentions() {
        let span = Span::new(0, 5).unwrap();
        let mut article = Article::new(7, "Paris", "Paris is big.");
        article.add_mention(
            EntityMention::new(span, "Alias Matcher")
                .linked("Q90", "Alias Prior")
                .with_candidates(["Q90", "Q167646"]),
        );
        let mut out = Vec::new();
        write_article(&mut out, &article).unwrap();
        assert!(out.ends_with(b"\n"));

        let back: Vec<Article> = read_articles(out.as_slice())
            .collect::<Result<_>>()
            .unwrap();
        let mention = back[0].mention(&span).unwrap();
        assert_eq!(mention.entity_id(), Some("Q90"));
        assert_eq!(mention.linked_by(), Some("Alias Prior"));
        assert_eq!(mention.candidates.len(), 2);
    }
}
