use anyhow::Result;
use docsearch::converter::ConverterJson;
use docsearch::{DocId, InvertedIndex, SearchServer, WordEntry, WordStats};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const PREVIEW_CHARS: usize = 50;
const COMMON_WORDS: [&str; 10] = ["the", "a", "is", "of", "and", "in", "to", "it", "that", "for"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Interactive state: the loaded configuration plus the index built from it.
pub struct Session {
    converter: ConverterJson,
    server: SearchServer,
    requests: PathBuf,
    answers: PathBuf,
}

impl Session {
    pub fn new(converter: ConverterJson, index: Arc<InvertedIndex>, requests: PathBuf, answers: PathBuf) -> Self {
        Self { converter, server: SearchServer::new(index), requests, answers }
    }

    pub fn index(&self) -> &InvertedIndex {
        self.server.index()
    }

    /// Read the configured files and rebuild the index from them.
    pub fn reindex(&self) -> Result<usize> {
        let documents = self.converter.text_documents();
        let stats = self.index().rebuild(&documents)?;
        Ok(stats.documents)
    }

    /// Run one line of user input.
    pub fn execute<W: Write>(&self, line: &str, out: &mut W) -> Result<Flow> {
        let tokens = parse_command(line);
        let Some(first) = tokens.first() else {
            return Ok(Flow::Continue);
        };
        let args = &tokens[1..];

        match first.to_ascii_lowercase().as_str() {
            "help" | "h" => self.help(out)?,
            "exit" | "quit" | "q" => {
                writeln!(out, "Exiting search engine. Goodbye!")?;
                return Ok(Flow::Exit);
            }
            "index" | "reindex" => self.perform_indexing(out)?,
            "search" | "s" => {
                if args.is_empty() {
                    writeln!(out, "Error: Search query required")?;
                    writeln!(out, "Usage: search <query>")?;
                } else {
                    self.perform_search(&args.join(" "), out)?;
                }
            }
            "word" | "w" => match args.first() {
                Some(word) => self.word_stats(word, out)?,
                None => {
                    writeln!(out, "Error: Word required")?;
                    writeln!(out, "Usage: word <word>")?;
                }
            },
            "find" | "f" => match args.first() {
                Some(word) => {
                    let limit = match args.get(1) {
                        Some(raw) => match raw.parse::<usize>() {
                            Ok(n) => Some(n),
                            Err(_) => {
                                writeln!(out, "Warning: Invalid limit format, showing all results")?;
                                None
                            }
                        },
                        None => None,
                    };
                    self.find_word(word, limit, out)?;
                }
                None => {
                    writeln!(out, "Error: Word required")?;
                    writeln!(out, "Usage: find <word> [limit]")?;
                }
            },
            "compare" | "c" => {
                if args.len() < 2 {
                    writeln!(out, "Error: Two words required for comparison")?;
                    writeln!(out, "Usage: compare <word1> <word2>")?;
                } else {
                    self.compare_words(&args[0], &args[1], out)?;
                }
            }
            "stats" => self.stats(out)?,
            "process" => self.process_requests(out)?,
            other => {
                writeln!(out, "Unknown command: {other}")?;
                writeln!(out, "Type 'help' for a list of commands")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn help<W: Write>(&self, out: &mut W) -> Result<()> {
        header(out, "SEARCH ENGINE - HELP")?;
        writeln!(out, "Available commands:")?;
        writeln!(out, "  help                      - Show this help message")?;
        writeln!(out, "  index                     - Re-index all documents")?;
        writeln!(out, "  search <query>            - Search for documents (use quotes for multi-word query)")?;
        writeln!(out, "  word <word>               - Show statistics for a specific word")?;
        writeln!(out, "  find <word> [limit]       - Find documents containing the word (optional limit)")?;
        writeln!(out, "  compare <word1> <word2>   - Compare frequency of two words")?;
        writeln!(out, "  stats                     - Show index statistics")?;
        writeln!(out, "  process                   - Process all requests from the requests file")?;
        writeln!(out, "  exit                      - Exit the program")?;
        Ok(())
    }

    fn perform_indexing<W: Write>(&self, out: &mut W) -> Result<()> {
        header(out, "INDEXING DOCUMENTS")?;
        let start = Instant::now();
        match self.reindex() {
            Ok(count) => {
                writeln!(out, "Indexed {count} documents")?;
                writeln!(out, "Indexing completed in {} ms", start.elapsed().as_millis())?;
            }
            Err(err) => writeln!(out, "Error during indexing: {err}")?,
        }
        Ok(())
    }

    pub fn perform_search<W: Write>(&self, query: &str, out: &mut W) -> Result<()> {
        header(out, &format!("SEARCH RESULTS FOR: {query}"))?;
        let start = Instant::now();
        let hits = self.server.resolve(query);
        let took = start.elapsed();

        if hits.is_empty() {
            writeln!(out, "No documents found for query: {query}")?;
            return Ok(());
        }

        let snapshot = self.index().snapshot();
        writeln!(out, "Found {} document(s) in {} ms", hits.len(), took.as_millis())?;
        writeln!(out, "{:>10}{:>15}  Content Preview", "Doc ID", "Relevance")?;
        writeln!(out, "{}", "-".repeat(70))?;
        for hit in hits.iter().take(self.converter.max_responses()) {
            writeln!(out, "{:>10}{:>15.6}  {}", hit.doc_id, hit.rank, preview(snapshot.document(hit.doc_id)))?;
        }
        Ok(())
    }

    fn word_stats<W: Write>(&self, word: &str, out: &mut W) -> Result<()> {
        header(out, &format!("WORD STATISTICS: {word}"))?;
        let snapshot = self.index().snapshot();
        let entries = snapshot.lookup(word);
        if entries.is_empty() {
            writeln!(out, "Word '{word}' not found in any document")?;
            return Ok(());
        }

        let stats = WordStats::from_entries(&entries);
        writeln!(out, "Word: {word}")?;
        writeln!(out, "Found in {} document(s)", stats.documents)?;
        writeln!(out, "Total occurrences: {}", stats.occurrences)?;
        writeln!(out)?;
        entry_table(out, &entries, |id| snapshot.document(id))
    }

    fn find_word<W: Write>(&self, word: &str, limit: Option<usize>, out: &mut W) -> Result<()> {
        header(out, &format!("DOCUMENTS CONTAINING: {word}"))?;
        let snapshot = self.index().snapshot();
        let mut entries = snapshot.lookup(word);
        if entries.is_empty() {
            writeln!(out, "Word '{word}' not found in any document")?;
            return Ok(());
        }
        entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.doc_id.cmp(&b.doc_id)));

        writeln!(out, "Word '{word}' found in {} document(s)", entries.len())?;
        writeln!(out)?;
        let total = entries.len();
        let limit = limit.filter(|&n| n > 0);
        let shown = limit.map_or(total, |n| n.min(total));
        entry_table(out, &entries[..shown], |id| snapshot.document(id))?;
        if limit.is_some_and(|n| shown >= n) {
            writeln!(out, "Showing {shown} of {total} documents (limit reached)")?;
        }
        Ok(())
    }

    fn compare_words<W: Write>(&self, first: &str, second: &str, out: &mut W) -> Result<()> {
        header(out, &format!("COMPARING WORDS: {first} vs {second}"))?;
        let snapshot = self.index().snapshot();
        let a = snapshot.lookup(first);
        let b = snapshot.lookup(second);
        let (sa, sb) = (WordStats::from_entries(&a), WordStats::from_entries(&b));

        for (word, stats) in [(first, sa), (second, sb)] {
            writeln!(out, "Word '{word}' statistics:")?;
            writeln!(out, "  Documents: {}", stats.documents)?;
            writeln!(out, "  Total occurrences: {}", stats.occurrences)?;
        }

        let docs_a: BTreeSet<_> = a.iter().map(|e| e.doc_id).collect();
        let docs_b: BTreeSet<_> = b.iter().map(|e| e.doc_id).collect();
        writeln!(out, "Both words appear in {} unique document(s)", docs_a.union(&docs_b).count())?;
        writeln!(out, "Documents containing both words: {}", docs_a.intersection(&docs_b).count())?;

        if sa.occurrences > 0 && sb.occurrences > 0 {
            let ratio = sa.occurrences as f64 / sb.occurrences as f64;
            writeln!(out, "Frequency ratio ({first}/{second}): {ratio:.2}")?;
        }
        Ok(())
    }

    fn stats<W: Write>(&self, out: &mut W) -> Result<()> {
        header(out, "INDEX STATISTICS")?;
        let snapshot = self.index().snapshot();
        writeln!(out, "Documents indexed: {}", snapshot.documents().len())?;
        writeln!(out, "Distinct words: {}", snapshot.dictionary().len())?;
        writeln!(out)?;
        writeln!(out, "Statistics for common words:")?;
        writeln!(out, "{:>15}{:>15}{:>15}", "Word", "Documents", "Total Count")?;
        writeln!(out, "{}", "-".repeat(45))?;
        for word in COMMON_WORDS {
            let stats = WordStats::from_entries(snapshot.dictionary().get(word));
            writeln!(out, "{:>15}{:>15}{:>15}", word, stats.documents, stats.occurrences)?;
        }
        Ok(())
    }

    pub fn process_requests<W: Write>(&self, out: &mut W) -> Result<()> {
        header(out, "PROCESSING ALL REQUESTS")?;
        let start = Instant::now();
        let requests = ConverterJson::requests(&self.requests);
        writeln!(out, "Processing {} requests...", requests.len())?;

        let results = self.server.search(&requests);
        match self.converter.put_answers(&self.answers, &results) {
            Ok(()) => {
                writeln!(out, "All requests processed in {} ms", start.elapsed().as_millis())?;
                writeln!(out, "Results saved to {}", self.answers.display())?;
            }
            Err(err) => writeln!(out, "Error processing requests: {err}")?,
        }
        Ok(())
    }
}

/// Split a command line on spaces; double quotes group words into one argument.
pub fn parse_command(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// First characters of a document for table output.
pub fn preview(content: Option<&str>) -> String {
    let Some(content) = content else {
        return "[Document not found]".to_string();
    };
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    let head = head.replace(['\n', '\r', '\t'], " ");
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub fn header<W: Write>(out: &mut W, title: &str) -> std::io::Result<()> {
    let rule = "=".repeat(50);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "  {title}")?;
    writeln!(out, "{rule}")
}

fn entry_table<'a, W, F>(out: &mut W, entries: &[WordEntry], document: F) -> Result<()>
where
    W: Write,
    F: Fn(DocId) -> Option<&'a str>,
{
    writeln!(out, "{:>10}{:>10}  Content Preview", "Doc ID", "Count")?;
    writeln!(out, "{}", "-".repeat(70))?;
    for entry in entries {
        writeln!(out, "{:>10}{:>10}  {}", entry.doc_id, entry.count, preview(document(entry.doc_id)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_group_words() {
        assert_eq!(parse_command(r#"search "milk water" sugar"#), vec!["search", "milk water", "sugar"]);
        assert_eq!(parse_command("  find   milk  3 "), vec!["find", "milk", "3"]);
        assert!(parse_command("   ").is_empty());
        assert_eq!(parse_command("word a\tb"), vec!["word", "a\tb"]);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        let p = preview(Some(&long));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
        assert_eq!(preview(Some("short")), "short");
        assert_eq!(preview(None), "[Document not found]");
    }
}
