use thiserror::Error;

#[derive(Error, Debug)]
pub enum SboError {
    #[error("Request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("Authentication failure: {0}")]
    AuthenticationFailed(String),
    #[error("Subscription expired")]
    SubscriptionExpired,
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Invalid response body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse xml/html: {0}")]
    ParseError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Failed to render template: {0}")]
    Template(#[from] askama::Error),
    #[error("Chapter '{title}' failed: {source}")]
    Chapter {
        title: String,
        #[source]
        source: Box<SboError>,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SboError {
    /// Wraps a per-chapter failure with the chapter title.
    pub fn in_chapter(self, title: &str) -> Self {
        SboError::Chapter {
            title: title.to_string(),
            source: Box::new(self),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            SboError::AuthenticationFailed(_) | SboError::SubscriptionExpired
        )
    }
}

pub type Result<T> = anyhow::Result<T, SboError>;
