//! `tot24-core`: tree-of-thought search for the game of 24 against a text oracle.
//!
//! Scope:
//! - beam search over oracle-proposed arithmetic steps (`tree_search`)
//! - local checks that never trust the oracle: number-count pruning (`evaluate`) and
//!   exact answer verification (`verify`, `arith`)
//! - one-shot baselines with a response cache (`solvers`, `cache`)
//! - an OpenAI-compatible chat oracle (Ollama/Groq/Gemini/OpenAI/OpenRouter/GPT) (`llm`)
//!
//! Output discipline:
//! - outcomes and reports are `serde` types, JSON-friendly
//! - API keys are never serialized or logged
//!
//! Environment:
//! - Prefer `TOT24_*`.
//! - LLM routing can use:
//!   - `OLLAMA_MODEL` (+ optional `OLLAMA_HOST`)
//!   - `GROQ_API_KEY` and `GROQ_MODEL`
//!   - `GOOGLE_API_KEY` and `GEMINI_MODEL` (+ optional `GEMINI_BASE_URL`)
//!   - `OPENAI_API_KEY` and `OPENAI_MODEL` (+ optional `OPENAI_BASE_URL`)
//!   - `OPENROUTER_API_KEY` and `OPENROUTER_MODEL` (+ optional `OPENROUTER_BASE_URL`)
//!   - `GPT_API_URL`, `GPT_API_KEY` and `GPT_MODEL`

pub mod arith;
pub mod cache;
pub mod env;
pub mod evaluate;
pub mod expand;
pub mod llm;
pub mod oracle;
pub mod prompts;
pub mod puzzles;
pub mod solvers;
pub mod state;
pub mod tree_search;
pub mod verdict;
pub mod verify;

pub use oracle::{FnOracle, Oracle, OracleError};
pub use state::{Puzzle, PuzzleError, SearchState};
pub use tree_search::{BeamSearch, ConfigError, SearchConfig, SearchOutcome};
