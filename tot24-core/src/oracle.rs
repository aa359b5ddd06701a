use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle not configured: {0}")]
    Config(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider {provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("invalid oracle response: {0}")]
    Response(String),
    #[error("oracle call timed out")]
    Timeout,
    /// Raised by test and scripted oracles.
    #[error("{0}")]
    Other(String),
}

/// Prompt in, text out. Implementations must be safe to share across concurrent calls.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;
}

/// An oracle backed by a plain closure. Deterministic stand-in for a hosted model.
pub struct FnOracle<F> {
    f: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&str) -> Result<String, OracleError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Oracle for FnOracle<F>
where
    F: Fn(&str) -> Result<String, OracleError> + Send + Sync,
{
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        (self.f)(prompt)
    }
}

/// Call the oracle, collapsing any failure to empty text.
///
/// The search never aborts on an oracle error; a failed call just yields nothing usable.
pub(crate) async fn generate_or_empty(oracle: &dyn Oracle, prompt: &str, what: &str) -> String {
    match oracle.generate(prompt).await {
        Ok(text) => {
            tracing::debug!(what, bytes = text.len(), "oracle response");
            text
        }
        Err(e) => {
            tracing::warn!(what, error = %e, "oracle call failed; treating as empty output");
            String::new()
        }
    }
}
