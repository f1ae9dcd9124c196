use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::{DocId, RelativeIndex};

pub const DEFAULT_MAX_RESPONSES: usize = 5;

fn default_max_responses() -> usize {
    DEFAULT_MAX_RESPONSES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    #[serde(default = "default_max_responses")]
    pub max_responses: usize,
}

#[derive(Debug, Deserialize)]
struct RequestsFile {
    #[serde(default)]
    requests: Vec<String>,
}

/// Answers document written after a batch of requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answers {
    pub answers: BTreeMap<String, Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docid: Option<DocId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<Vec<Relevance>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    pub docid: DocId,
    pub rank: f32,
}

/// Reads the engine configuration and document files, writes answers.
#[derive(Debug, Clone)]
pub struct ConverterJson {
    info: EngineInfo,
    files: Vec<PathBuf>,
}

impl ConverterJson {
    /// Load `config_path`. Relative document paths are resolved against its directory.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Err(ConfigError::Missing(config_path.to_path_buf()));
        }
        let raw: Value = serde_json::from_reader(BufReader::new(File::open(config_path)?))?;

        let section = match raw.get("config") {
            Some(Value::Object(map)) if !map.is_empty() => Value::Object(map.clone()),
            _ => return Err(ConfigError::Empty),
        };
        let info: EngineInfo = serde_json::from_value(section)?;

        let base = config_path.parent().unwrap_or_else(|| Path::new(""));
        let files: Vec<PathBuf> = match raw.get("files") {
            Some(files) => serde_json::from_value::<Vec<PathBuf>>(files.clone())?,
            None => Vec::new(),
        }
        .into_iter()
        .map(|p| if p.is_relative() { base.join(p) } else { p })
        .collect();
        if files.is_empty() {
            tracing::warn!(config = %config_path.display(), "no files specified in config");
        }

        tracing::info!(name = %info.name, version = %info.version, files = files.len(), "loaded config");
        Ok(Self { info, files })
    }

    pub fn from_parts(info: EngineInfo, files: Vec<PathBuf>) -> Self {
        Self { info, files }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }

    pub fn max_responses(&self) -> usize {
        self.info.max_responses
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Raw contents of every readable configured file, in configured order.
    pub fn text_documents(&self) -> Vec<Vec<u8>> {
        let mut documents = Vec::with_capacity(self.files.len());
        for path in &self.files {
            match fs::read(path) {
                Ok(bytes) => documents.push(bytes),
                Err(err) => tracing::warn!(file = %path.display(), error = %err, "skipping document"),
            }
        }
        documents
    }

    /// Queries from a requests file. Anything unreadable yields no requests.
    pub fn requests<P: AsRef<Path>>(path: P) -> Vec<String> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "requests file not readable");
                return Vec::new();
            }
        };
        match serde_json::from_reader::<_, RequestsFile>(BufReader::new(file)) {
            Ok(parsed) => {
                if parsed.requests.is_empty() {
                    tracing::warn!(file = %path.display(), "no requests found");
                }
                parsed.requests
            }
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "failed to parse requests");
                Vec::new()
            }
        }
    }

    pub fn answers(&self, results: &[Vec<RelativeIndex>]) -> Answers {
        let answers = results
            .iter()
            .enumerate()
            .map(|(i, hits)| (request_key(i), answer(hits, self.info.max_responses)))
            .collect();
        Answers { answers }
    }

    pub fn put_answers<P: AsRef<Path>>(&self, path: P, results: &[Vec<RelativeIndex>]) -> Result<(), ConfigError> {
        let answers = self.answers(results);
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        answers.serialize(&mut ser)?;
        out.write_all(b"\n")?;
        out.flush()?;
        tracing::info!(file = %path.as_ref().display(), requests = results.len(), "answers written");
        Ok(())
    }
}

/// `request001`, `request002`, ... for 0-based position `i`.
pub fn request_key(i: usize) -> String {
    format!("request{:03}", i + 1)
}

fn answer(hits: &[RelativeIndex], limit: usize) -> Answer {
    let hits = &hits[..hits.len().min(limit)];
    match hits {
        [] => Answer { result: false, docid: None, rank: None, relevance: None },
        [only] => Answer { result: true, docid: Some(only.doc_id), rank: Some(only.rank), relevance: None },
        many => Answer {
            result: true,
            docid: None,
            rank: None,
            relevance: Some(many.iter().map(|h| Relevance { docid: h.doc_id, rank: h.rank }).collect()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn hit(doc_id: DocId, rank: f32) -> RelativeIndex {
        RelativeIndex { doc_id, rank }
    }

    #[test]
    fn loads_config_and_documents() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "first document").unwrap();
        fs::write(dir.path().join("b.txt"), "second document").unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"config": {"name": "Engine", "version": "0.1"}, "files": ["a.txt", "missing.txt", "b.txt"]}"#,
        )
        .unwrap();

        let conv = ConverterJson::load(dir.path().join("config.json")).unwrap();
        assert_eq!(conv.name(), "Engine");
        assert_eq!(conv.version(), "0.1");
        assert_eq!(conv.max_responses(), DEFAULT_MAX_RESPONSES);
        let docs = conv.text_documents();
        assert_eq!(docs, vec![b"first document".to_vec(), b"second document".to_vec()]);
    }

    #[test]
    fn missing_and_empty_config() {
        let dir = tempdir().unwrap();
        let missing = ConverterJson::load(dir.path().join("config.json"));
        assert!(matches!(missing, Err(ConfigError::Missing(_))));

        fs::write(dir.path().join("config.json"), r#"{"config": {}, "files": []}"#).unwrap();
        let empty = ConverterJson::load(dir.path().join("config.json"));
        assert!(matches!(empty, Err(ConfigError::Empty)));

        fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let broken = ConverterJson::load(dir.path().join("config.json"));
        assert!(matches!(broken, Err(ConfigError::Json(_))));
    }

    #[test]
    fn requests_tolerate_bad_input() {
        let dir = tempdir().unwrap();
        assert!(ConverterJson::requests(dir.path().join("requests.json")).is_empty());

        fs::write(dir.path().join("requests.json"), r#"{"requests": ["milk water", "sugar"]}"#).unwrap();
        assert_eq!(ConverterJson::requests(dir.path().join("requests.json")), vec!["milk water", "sugar"]);

        fs::write(dir.path().join("requests.json"), "[1, 2").unwrap();
        assert!(ConverterJson::requests(dir.path().join("requests.json")).is_empty());
    }

    #[test]
    fn answers_shape_and_limit() {
        let info = EngineInfo { name: "e".into(), version: "1".into(), max_responses: 2 };
        let conv = ConverterJson::from_parts(info, Vec::new());
        let results = vec![vec![], vec![hit(3, 1.0)], vec![hit(0, 1.0), hit(2, 0.5), hit(1, 0.25)]];
        let answers = conv.answers(&results);

        assert_eq!(answers.answers["request001"], Answer { result: false, docid: None, rank: None, relevance: None });
        assert_eq!(answers.answers["request002"].docid, Some(3));
        let relevance = answers.answers["request003"].relevance.as_ref().unwrap();
        assert_eq!(relevance.len(), 2);
        assert_eq!(relevance[1], Relevance { docid: 2, rank: 0.5 });
    }

    #[test]
    fn put_answers_writes_pretty_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("answers.json");
        let info = EngineInfo { name: "e".into(), version: "1".into(), max_responses: 5 };
        let conv = ConverterJson::from_parts(info, Vec::new());
        conv.put_answers(&path, &[vec![], vec![hit(1, 1.0)]]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"answers\""));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["answers"]["request001"]["result"], Value::Bool(false));
        assert!(value["answers"]["request001"].get("docid").is_none());
        assert_eq!(value["answers"]["request002"]["docid"], 1);
    }

    #[test]
    fn request_keys_are_zero_padded() {
        assert_eq!(request_key(0), "request001");
        assert_eq!(request_key(41), "request042");
        assert_eq!(request_key(999), "request1000");
    }
}
