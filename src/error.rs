use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("request to {url} failed after {attempts} attempts: {message}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("{url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("invalid CSS selector `{0}`")]
    InvalidSelector(String),

    #[error("invalid {field} filter `{value}`: {reason}")]
    InvalidFilter {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("AI extraction failed: {0}")]
    Extraction(String),

    #[error("unknown agency `{name}`{}", suggestions_hint(.suggestions))]
    UnknownAgency {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),
}

fn suggestions_hint(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}
