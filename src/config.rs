use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::chunker::ChunkPolicy;

/// Runtime configuration, read once at startup from `DOCQA_*` environment
/// variables with sensible defaults for local use.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub inference_url: String,
    pub embed_model: String,
    pub text_model: String,
    pub region: String,
    pub csv_path: PathBuf,
    pub pdf_path: PathBuf,
    pub rows_per_chunk: usize,
    pub max_chunk_chars: usize,
    /// Input limit of the embedding capability.
    pub max_embed_chars: usize,
    pub max_query_chars: usize,
    pub top_k: usize,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            inference_url: "http://127.0.0.1:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            text_model: "mistral".to_string(),
            region: "us-east-1".to_string(),
            csv_path: PathBuf::from("data/sales.csv"),
            pdf_path: PathBuf::from("data/project.pdf"),
            rows_per_chunk: 120,
            max_chunk_chars: 900,
            max_embed_chars: 2000,
            max_query_chars: 4000,
            top_k: 5,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("DOCQA_BIND_ADDR", defaults.bind_addr),
            inference_url: env_or("DOCQA_INFERENCE_URL", defaults.inference_url),
            embed_model: env_or("DOCQA_EMBED_MODEL", defaults.embed_model),
            text_model: env_or("DOCQA_TEXT_MODEL", defaults.text_model),
            region: env_or("DOCQA_REGION", defaults.region),
            csv_path: PathBuf::from(env_or(
                "DOCQA_CSV_PATH",
                defaults.csv_path.display().to_string(),
            )),
            pdf_path: PathBuf::from(env_or(
                "DOCQA_PDF_PATH",
                defaults.pdf_path.display().to_string(),
            )),
            rows_per_chunk: env_parse("DOCQA_ROWS_PER_CHUNK", defaults.rows_per_chunk),
            max_chunk_chars: env_parse("DOCQA_MAX_CHUNK_CHARS", defaults.max_chunk_chars),
            max_embed_chars: env_parse("DOCQA_MAX_EMBED_CHARS", defaults.max_embed_chars),
            max_query_chars: env_parse("DOCQA_MAX_QUERY_CHARS", defaults.max_query_chars),
            top_k: env_parse("DOCQA_TOP_K", defaults.top_k),
            request_timeout_secs: env_parse(
                "DOCQA_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
        }
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            rows_per_chunk: self.rows_per_chunk,
            max_chunk_chars: self.max_chunk_chars,
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
