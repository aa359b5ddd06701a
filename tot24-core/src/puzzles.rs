use std::path::{Path, PathBuf};
use std::time::Duration;

/// The published 24-game table (ranked by human solve time).
pub const DEFAULT_PUZZLES_URL: &str =
    "https://raw.githubusercontent.com/princeton-nlp/tree-of-thought-llm/master/src/tot/data/24/24.csv";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch {url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("missing column {0:?} in header")]
    MissingColumn(&'static str),
    #[error("bad rank {value:?} on line {line}")]
    BadRank { line: usize, value: String },
    #[error("empty table")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleRow {
    pub rank: u64,
    pub puzzle: String,
}

/// Split one CSV record. Double quotes group fields and `""` escapes a quote.
fn split_record(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    out.push(cur);
    out
}

/// Parse a table with `Rank` and `Puzzles` columns (any order, extra columns ignored).
pub fn parse_table(text: &str) -> Result<Vec<PuzzleRow>, SourceError> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let (_, header) = lines.next().ok_or(SourceError::Empty)?;
    let header: Vec<String> = split_record(header)
        .into_iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    let col = |name: &'static str| {
        header
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or(SourceError::MissingColumn(name))
    };
    let rank_col = col("Rank")?;
    let puzzle_col = col("Puzzles")?;

    let mut out = Vec::new();
    for (i, line) in lines {
        let fields = split_record(line);
        let rank_txt = fields.get(rank_col).map(|s| s.trim()).unwrap_or("");
        let rank = rank_txt.parse::<u64>().map_err(|_| SourceError::BadRank {
            line: i + 1,
            value: rank_txt.to_string(),
        })?;
        let puzzle = fields
            .get(puzzle_col)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        out.push(PuzzleRow { rank, puzzle });
    }
    Ok(out)
}

/// Puzzles whose rank lies in `start..=end`, in table order.
pub fn select_ranks(rows: &[PuzzleRow], start: u64, end: u64) -> Vec<String> {
    rows.iter()
        .filter(|r| r.rank >= start && r.rank <= end)
        .map(|r| r.puzzle.clone())
        .collect()
}

pub fn load_table(path: &Path) -> Result<Vec<PuzzleRow>, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&text)
}

pub async fn fetch_table(url: &str, timeout: Duration) -> Result<Vec<PuzzleRow>, SourceError> {
    let fetch_err = |source| SourceError::Fetch {
        url: url.to_string(),
        source,
    };
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(fetch_err)?;
    let resp = client.get(url).send().await.map_err(fetch_err)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let text = resp.text().await.map_err(fetch_err)?;
    parse_table(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Rank,Puzzles,AMT (s),Solved rate,1-sigma Mean (s),1-sigma STD (s)
1,1 1 4 6,4.4,99.60%,4.67,1.48
2,1 1 11 11,4.41,99.60%,4.68,1.45
3,\"1, 1, 3, 8\",4.45,99.50%,4.69,1.48

901,4 5 6 10,9.84,92.10%,10.54,3.52
";

    #[test]
    fn parses_rank_and_puzzle_columns() {
        let rows = parse_table(TABLE).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[2],
            PuzzleRow {
                rank: 3,
                puzzle: "1, 1, 3, 8".into()
            }
        );
    }

    #[test]
    fn select_ranks_is_inclusive() {
        let rows = parse_table(TABLE).unwrap();
        assert_eq!(select_ranks(&rows, 2, 3), vec!["1 1 11 11", "1, 1, 3, 8"]);
        assert_eq!(select_ranks(&rows, 901, 1000), vec!["4 5 6 10"]);
        assert!(select_ranks(&rows, 5, 10).is_empty());
    }

    #[test]
    fn missing_column_and_bad_rank() {
        assert!(matches!(
            parse_table("Index,Puzzles\n1,1 2 3 4\n"),
            Err(SourceError::MissingColumn("Rank"))
        ));
        assert!(matches!(
            parse_table("Rank,Puzzles\nx,1 2 3 4\n"),
            Err(SourceError::BadRank { line: 2, .. })
        ));
        assert!(matches!(parse_table(""), Err(SourceError::Empty)));
    }

    #[test]
    fn load_table_reads_file() {
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join("24.csv");
        std::fs::write(&p, TABLE).unwrap();
        assert_eq!(load_table(&p).unwrap().len(), 4);
        assert!(matches!(
            load_table(&td.path().join("nope.csv")),
            Err(SourceError::Read { .. })
        ));
    }
}
