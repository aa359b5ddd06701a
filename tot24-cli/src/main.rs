use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tot24_core::cache::{DiskCache, ResponseCache};
use tot24_core::llm::{ChatOracle, OracleConfig};
use tot24_core::puzzles::{self, DEFAULT_PUZZLES_URL};
use tot24_core::solvers;
use tot24_core::tree_search::{BeamSearch, SearchConfig};
use tot24_core::{verify, Oracle, Puzzle, SearchState};

const DEFAULT_CACHE_DIR: &str = ".tot24-cache";

fn arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn arg_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn arg_u64(args: &[String], key: &str) -> Option<u64> {
    arg_value(args, key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create dir {}: {}", parent.display(), e))?;
        }
    }
    let mut f = fs::File::create(path)
        .map_err(|e| format!("failed to create {}: {}", path.display(), e))?;
    let s = serde_json::to_string_pretty(value).map_err(|e| format!("json encode: {e}"))?;
    io::Write::write_all(&mut f, s.as_bytes())
        .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
    Ok(())
}

fn emit(value: serde_json::Value, output_json: Option<PathBuf>) -> Result<(), String> {
    if let Some(p) = output_json {
        write_json(&p, &value)?;
    }
    println!("{}", value);
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("failed to build tokio runtime: {e}"))
}

async fn oracle_from_env(timeout_s: u64) -> Result<Arc<ChatOracle>, String> {
    let cfg = OracleConfig::from_env(StdDuration::from_secs(2))
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!(provider = %cfg.provider, model = %cfg.model, "oracle selected");
    let o = ChatOracle::new(cfg, StdDuration::from_secs(timeout_s))
        .map_err(|e| format!("oracle client: {e}"))?;
    Ok(Arc::new(o))
}

fn search_config(rest: &[String]) -> SearchConfig {
    let d = SearchConfig::default();
    SearchConfig {
        steps: arg_u64(rest, "--steps").map(|x| x as usize).unwrap_or(d.steps),
        sample_size: arg_u64(rest, "--beam").map(|x| x as usize).unwrap_or(d.sample_size),
        concurrency: arg_u64(rest, "--concurrency")
            .map(|x| x as usize)
            .unwrap_or(d.concurrency),
        round_timeout: arg_u64(rest, "--round-timeout-s").map(StdDuration::from_secs),
    }
}

fn usage() -> String {
    [
        "tot24: tree-of-thought search for the game of 24.",
        "",
        "Commands:",
        "  solve     --puzzle \"<4 numbers>\" [--steps N] [--beam N] [--concurrency N]",
        "            [--round-timeout-s N] [--timeout-s N] [--output-json <path>]",
        "  bench     --method io|cot|tot [--csv <path> | --url <url>] [--start N] [--end N]",
        "            [--cache-dir <path> | --no-cache] [--timeout-s N] [--output-json <path>]",
        "            (tot also accepts the solve search flags)",
        "  verify    --state-file <path> | --puzzle \"<4 numbers>\" --answer \"<answer line>\"",
        "  provider  print the oracle selected from the environment (no key)",
        "",
        "Environment:",
        "  OLLAMA_MODEL, GROQ_API_KEY, GOOGLE_API_KEY, OPENAI_API_KEY, OPENROUTER_API_KEY, GPT_API_KEY",
        "  TOT24_PROVIDER_ORDER, TOT24_DEFAULT_MODEL[_<PROVIDER>], TOT24_TEMPERATURE, TOT24_DOTENV",
        "  RUST_LOG (logs go to stderr)",
    ]
    .join("\n")
}

fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("");
    let rest: &[String] = if args.len() > 2 { &args[2..] } else { &[] };

    if cmd.is_empty() || cmd == "--help" || cmd == "-h" || cmd == "help" {
        println!("{}", usage());
        return Ok(());
    }
    if arg_flag(rest, "--help") || arg_flag(rest, "-h") {
        println!("{}", usage());
        return Ok(());
    }

    if let Ok(cwd) = std::env::current_dir() {
        let n = tot24_core::env::load_dotenv_if_present(&cwd);
        if n > 0 {
            tracing::debug!(vars = n, "loaded .env");
        }
    }

    let output_json = arg_value(rest, "--output-json").map(PathBuf::from);
    let timeout_s = arg_u64(rest, "--timeout-s").unwrap_or(60);

    match cmd {
        "solve" => {
            let text = arg_value(rest, "--puzzle").ok_or_else(|| "missing --puzzle".to_string())?;
            let puzzle = Puzzle::parse(&text).map_err(|e| format!("puzzle: {e}"))?;
            let config = search_config(rest);

            let rt = runtime()?;
            let outcome = rt.block_on(async {
                let oracle: Arc<dyn Oracle> = oracle_from_env(timeout_s).await?;
                let search = BeamSearch::new(oracle, config).map_err(|e| e.to_string())?;
                Ok::<_, String>(search.run(&puzzle).await)
            })?;
            let v = serde_json::to_value(&outcome).map_err(|e| format!("serialize outcome: {e}"))?;
            emit(v, output_json)
        }

        "bench" => {
            let method = arg_value(rest, "--method").unwrap_or_else(|| "io".to_string());
            let start = arg_u64(rest, "--start").unwrap_or(901);
            let end = arg_u64(rest, "--end").unwrap_or(1000);
            let csv = arg_value(rest, "--csv").map(PathBuf::from);
            let url = arg_value(rest, "--url").unwrap_or_else(|| DEFAULT_PUZZLES_URL.to_string());
            let cache: Option<DiskCache> = if arg_flag(rest, "--no-cache") {
                None
            } else {
                let dir = arg_value(rest, "--cache-dir")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
                Some(DiskCache::open(&dir).map_err(|e| e.to_string())?)
            };
            let config = search_config(rest);

            let rt = runtime()?;
            let report = rt.block_on(async {
                let table = match &csv {
                    Some(p) => puzzles::load_table(p),
                    None => puzzles::fetch_table(&url, StdDuration::from_secs(timeout_s)).await,
                }
                .map_err(|e| format!("puzzles: {e}"))?;
                let batch = puzzles::select_ranks(&table, start, end);
                tracing::info!(method = %method, start, end, puzzles = batch.len(), "bench");

                let oracle = oracle_from_env(timeout_s).await?;
                let cache_ref = cache.as_ref().map(|c| c as &dyn ResponseCache);
                let report: Result<solvers::BatchReport, String> = match method.as_str() {
                    "io" => solvers::naive_solve(oracle.as_ref(), cache_ref, &batch)
                        .await
                        .map_err(|e| e.to_string()),
                    "cot" => solvers::cot_solve(oracle.as_ref(), cache_ref, &batch)
                        .await
                        .map_err(|e| e.to_string()),
                    "tot" => {
                        let search =
                            BeamSearch::new(oracle, config).map_err(|e| e.to_string())?;
                        Ok(solvers::tot_solve(&search, &batch).await)
                    }
                    other => Err(format!("unknown --method {other:?} (want io|cot|tot)")),
                };
                report
            })?;
            let v = serde_json::to_value(&report).map_err(|e| format!("serialize report: {e}"))?;
            emit(v, output_json)
        }

        "verify" => {
            let state = if let Some(p) = arg_value(rest, "--state-file") {
                let text =
                    fs::read_to_string(&p).map_err(|e| format!("failed to read {p}: {e}"))?;
                SearchState::from_text(&text).ok_or_else(|| format!("{p}: empty state"))?
            } else {
                let text =
                    arg_value(rest, "--puzzle").ok_or_else(|| "missing --puzzle".to_string())?;
                let answer =
                    arg_value(rest, "--answer").ok_or_else(|| "missing --answer".to_string())?;
                let puzzle = Puzzle::parse(&text).map_err(|e| format!("puzzle: {e}"))?;
                SearchState::root(&puzzle).with_line(&answer)
            };
            let checked = verify::check_answer(&state);
            let v = json!({
                "state": state.text(),
                "verified": u8::from(checked.is_ok()),
                "rejection": checked.err(),
            });
            emit(v, output_json)
        }

        "provider" => {
            let rt = runtime()?;
            let cfg = rt
                .block_on(OracleConfig::from_env(StdDuration::from_secs(2)))
                .map_err(|e| e.to_string())?;
            let v = serde_json::to_value(&cfg).map_err(|e| format!("serialize config: {e}"))?;
            emit(v, output_json)
        }

        _ => Err(format!("unknown command {cmd:?}\n\n{}", usage())),
    }
}
