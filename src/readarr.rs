//! Readarr API client.
//!
//! Stateless wrapper over the four Readarr endpoints Bookseerr uses.
//! Upstream records are validated here, one at a time, so callers get
//! typed values with required fields present and optional ones
//! explicitly absent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ReadarrConfig;
use crate::model::{UNKNOWN_AUTHOR, UNKNOWN_TITLE};

/// Errors from talking to Readarr.
#[derive(Error, Debug)]
pub enum ReadarrError {
    #[error("Search query must not be empty")]
    InvalidQuery,

    #[error("No Readarr record for {0}")]
    NotFound(String),

    #[error("Book has no resolved author id")]
    MissingAuthorMetadata,

    #[error("Readarr unavailable: {0}")]
    Unavailable(String),

    #[error("Readarr rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, ReadarrError>;

impl From<reqwest::Error> for ReadarrError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ReadarrError::Unavailable(format!("request timed out: {}", e))
        } else {
            ReadarrError::Unavailable(e.to_string())
        }
    }
}

/// Goodreads ids arrive as strings or as bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum ForeignId {
    Text(String),
    Number(i64),
}

fn foreign_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ForeignId>::deserialize(deserializer)?.map(|id| match id {
        ForeignId::Text(text) => text,
        ForeignId::Number(n) => n.to_string(),
    }))
}

/// Author as embedded in Readarr book records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_author_id: Option<String>,
}

/// A lookup result: something a user can pick and add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: i64,

    pub title: String,

    #[serde(
        default,
        deserialize_with = "foreign_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub foreign_book_id: Option<String>,

    #[serde(default)]
    pub author: Option<ExternalAuthor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_cover: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i64>,

    /// Remaining upstream fields, passed through to clients untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Candidate {
    /// Key used to match this candidate against local books.
    pub fn local_key(&self) -> String {
        self.id.to_string()
    }

    /// Author name for local bookkeeping.
    pub fn author_name(&self) -> String {
        author_name_or_unknown(None, self.author.as_ref())
    }
}

/// A record from Readarr's library listing. Only the flags are
/// guaranteed; everything else may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryBook {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default, deserialize_with = "foreign_id")]
    pub foreign_book_id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub author_name: Option<String>,

    #[serde(default)]
    pub author: Option<ExternalAuthor>,

    #[serde(default)]
    pub monitored: Option<bool>,

    #[serde(default)]
    pub grabbed: Option<bool>,

    #[serde(default)]
    pub remote_cover: Option<String>,
}

impl LibraryBook {
    /// `foreignBookId` when present, else the numeric id.
    pub fn sync_key(&self) -> Option<String> {
        self.foreign_book_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.id.map(|id| id.to_string()))
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed.unwrap_or(false)
    }

    pub fn is_monitored(&self) -> bool {
        self.monitored.unwrap_or(false)
    }

    pub fn title_or_unknown(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_TITLE)
            .to_string()
    }

    pub fn author_or_unknown(&self) -> String {
        author_name_or_unknown(self.author_name.as_deref(), self.author.as_ref())
    }
}

/// One element of the library listing.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryEntry {
    Book(LibraryBook),

    /// A record that did not fit the schema; kept so it can be reported.
    Malformed { reason: String },
}

fn author_name_or_unknown(direct: Option<&str>, author: Option<&ExternalAuthor>) -> String {
    direct
        .or_else(|| author.and_then(|a| a.author_name.as_deref()))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_string()
}

/// Body of `POST /book`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddBookPayload<'a> {
    title: &'a str,
    author_id: i64,
    foreign_book_id: String,
    monitored: bool,
    quality_profile_id: i64,
    metadata_profile_id: i64,
    root_folder_path: &'a str,
    add_options: AddOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddOptions {
    search_for_new_book: bool,
}

/// Readarr answers some lookups with an object and some with an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

/// Decode each element on its own so one bad record cannot sink the rest.
fn decode_each<T: DeserializeOwned>(values: Vec<Value>) -> Vec<std::result::Result<T, String>> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| e.to_string()))
        .collect()
}

/// Client for Readarr's v1 API.
#[derive(Clone)]
pub struct ReadarrClient {
    http: reqwest::Client,
    config: ReadarrConfig,
}

impl ReadarrClient {
    pub fn new(config: ReadarrConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(self.url(path))
            .header("X-Api-Key", &self.config.api_key)
            .query(query)
            .send()
            .await?;

        Ok(response)
    }

    async fn unavailable(path: &str, response: reqwest::Response) -> ReadarrError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(path = %path, status = %status, body = %body, "Readarr request failed");
        ReadarrError::Unavailable(format!("{} returned {}", path, status))
    }

    /// Everything in the Readarr library.
    pub async fn list_library(&self) -> Result<Vec<LibraryEntry>> {
        let response = self.get("book", &[]).await?;
        if !response.status().is_success() {
            return Err(Self::unavailable("book", response).await);
        }

        let records = match response.json::<Value>().await? {
            Value::Array(records) => records,
            other => {
                return Err(ReadarrError::Unavailable(format!(
                    "Invalid Readarr response: expected an array, got {}",
                    json_kind(&other)
                )))
            }
        };

        let entries: Vec<LibraryEntry> = decode_each::<LibraryBook>(records)
            .into_iter()
            .map(|decoded| match decoded {
                Ok(book) => LibraryEntry::Book(book),
                Err(reason) => LibraryEntry::Malformed { reason },
            })
            .collect();

        debug!(count = entries.len(), "Fetched Readarr library");
        Ok(entries)
    }

    /// Free-text search over titles and authors.
    pub async fn lookup(&self, query: &str) -> Result<Vec<Candidate>> {
        let term = query.trim();
        if term.is_empty() {
            return Err(ReadarrError::InvalidQuery);
        }

        let response = self.get("book/lookup", &[("term", term)]).await?;
        if !response.status().is_success() {
            return Err(Self::unavailable("book/lookup", response).await);
        }

        let records = match response.json::<OneOrMany>().await? {
            OneOrMany::Many(records) => records,
            OneOrMany::One(record) => vec![record],
        };

        let mut candidates = Vec::with_capacity(records.len());
        for decoded in decode_each::<Candidate>(records) {
            match decoded {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => warn!(term = %term, reason = %reason, "Skipping malformed lookup result"),
            }
        }

        debug!(term = %term, count = candidates.len(), "Readarr lookup");
        Ok(candidates)
    }

    /// Detailed record for a Goodreads id.
    pub async fn lookup_details(&self, foreign_id: &str) -> Result<Candidate> {
        let response = self
            .get("book/lookup/goodreads", &[("goodreadsId", foreign_id)])
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ReadarrError::NotFound(foreign_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::unavailable("book/lookup/goodreads", response).await);
        }

        let first = match response.json::<OneOrMany>().await? {
            OneOrMany::Many(records) => records.into_iter().next(),
            OneOrMany::One(Value::Null) => None,
            OneOrMany::One(record) => Some(record),
        };

        let record = first.ok_or_else(|| ReadarrError::NotFound(foreign_id.to_string()))?;

        serde_json::from_value(record).map_err(|e| {
            ReadarrError::Unavailable(format!("Invalid Readarr book details: {}", e))
        })
    }

    /// Ask Readarr to monitor and search for `candidate`.
    pub async fn add_to_library(&self, candidate: &Candidate) -> Result<()> {
        let author_id = candidate
            .author
            .as_ref()
            .and_then(|a| a.id)
            .ok_or(ReadarrError::MissingAuthorMetadata)?;

        let payload = AddBookPayload {
            title: &candidate.title,
            author_id,
            foreign_book_id: candidate
                .foreign_book_id
                .clone()
                .unwrap_or_else(|| candidate.id.to_string()),
            monitored: true,
            quality_profile_id: self.config.quality_profile_id,
            metadata_profile_id: self.config.metadata_profile_id,
            root_folder_path: &self.config.root_folder_path,
            add_options: AddOptions {
                search_for_new_book: true,
            },
        };

        let response = self
            .http
            .post(self.url("book"))
            .header("X-Api-Key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                title = %candidate.title,
                status = %status,
                body = %body,
                "Readarr refused to add book"
            );
            return Err(ReadarrError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(title = %candidate.title, author_id, "Added book to Readarr");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::MockReadarr;

    fn dune() -> Value {
        json!({
            "id": 42,
            "title": "Dune",
            "author": {"id": 7, "authorName": "Frank Herbert"},
            "remoteCover": "http://covers/dune.jpg",
            "ratings": {"value": 4.3}
        })
    }

    #[test]
    fn test_candidate_keeps_unknown_fields() {
        let candidate: Candidate = serde_json::from_value(dune()).unwrap();

        assert_eq!(candidate.local_key(), "42");
        assert_eq!(candidate.author_name(), "Frank Herbert");
        assert!(candidate.extra.contains_key("ratings"));

        let back = serde_json::to_value(&candidate).unwrap();
        assert_eq!(back["ratings"]["value"], 4.3);
    }

    #[test]
    fn test_candidate_requires_id_and_title() {
        assert!(serde_json::from_value::<Candidate>(json!({"title": "No id"})).is_err());
        assert!(serde_json::from_value::<Candidate>(json!({"id": 1})).is_err());

        let bare: Candidate = serde_json::from_value(json!({"id": 1, "title": "T", "author": null})).unwrap();
        assert!(bare.author.is_none());
        assert_eq!(bare.author_name(), UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_library_book_key_and_fallbacks() {
        let with_foreign: LibraryBook =
            serde_json::from_value(json!({"id": 3, "foreignBookId": "gr-9"})).unwrap();
        assert_eq!(with_foreign.sync_key().as_deref(), Some("gr-9"));

        let numeric: LibraryBook = serde_json::from_value(json!({"id": 3, "foreignBookId": " "})).unwrap();
        assert_eq!(numeric.sync_key().as_deref(), Some("3"));

        let keyless: LibraryBook = serde_json::from_value(json!({"title": "?"})).unwrap();
        assert!(keyless.sync_key().is_none());
        assert_eq!(keyless.author_or_unknown(), UNKNOWN_AUTHOR);

        let nested: LibraryBook =
            serde_json::from_value(json!({"id": 1, "author": {"authorName": "Ursula K. Le Guin"}})).unwrap();
        assert_eq!(nested.author_or_unknown(), "Ursula K. Le Guin");
        assert_eq!(nested.title_or_unknown(), UNKNOWN_TITLE);
    }

    #[test]
    fn test_numeric_foreign_id_is_kept_as_text() {
        let record: LibraryBook =
            serde_json::from_value(json!({"id": 3, "foreignBookId": 44767458, "title": "Dune"})).unwrap();
        assert_eq!(record.sync_key().as_deref(), Some("44767458"));

        let null_id: LibraryBook = serde_json::from_value(json!({"id": 3, "foreignBookId": null})).unwrap();
        assert_eq!(null_id.sync_key().as_deref(), Some("3"));

        assert!(serde_json::from_value::<LibraryBook>(json!({"id": 3, "foreignBookId": true})).is_err());

        let candidate: Candidate =
            serde_json::from_value(json!({"id": 1, "title": "Dune", "foreignBookId": 234225})).unwrap();
        assert_eq!(candidate.foreign_book_id.as_deref(), Some("234225"));
    }

    #[tokio::test]
    async fn test_lookup_rejects_blank_query_without_calling_upstream() {
        let mock = MockReadarr::start().await;
        let client = mock.client();

        let err = client.lookup("   ").await.unwrap_err();
        assert!(matches!(err, ReadarrError::InvalidQuery));
        assert_eq!(mock.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn test_lookup_skips_malformed_results() {
        let mock = MockReadarr::start().await;
        mock.set_lookup(json!([dune(), {"title": "missing id"}]));

        let results = mock.client().lookup("dune").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Dune");
        assert_eq!(mock.last_lookup_term().as_deref(), Some("dune"));
    }

    #[tokio::test]
    async fn test_list_library_marks_malformed_entries() {
        let mock = MockReadarr::start().await;
        mock.set_library(json!([
            {"id": 1, "title": "Good", "monitored": true},
            {"id": "not-a-number"},
        ]));

        let entries = mock.client().list_library().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], LibraryEntry::Book(_)));
        assert!(matches!(entries[1], LibraryEntry::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_list_library_non_array_is_unavailable() {
        let mock = MockReadarr::start().await;
        mock.set_library(json!({"error": "nope"}));

        let err = mock.client().list_library().await.unwrap_err();
        assert!(matches!(err, ReadarrError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_upstream_down_is_unavailable() {
        let mock = MockReadarr::start().await;
        mock.fail_with(503);

        let client = mock.client();
        assert!(matches!(client.list_library().await, Err(ReadarrError::Unavailable(_))));
        assert!(matches!(client.lookup("x").await, Err(ReadarrError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let mock = MockReadarr::start().await;
        mock.delay(Duration::from_millis(500));

        let client = ReadarrClient::new(ReadarrConfig {
            timeout: Duration::from_millis(50),
            ..mock.config()
        })
        .unwrap();

        let err = client.list_library().await.unwrap_err();
        assert!(matches!(err, ReadarrError::Unavailable(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_lookup_details_object_array_and_missing() {
        let mock = MockReadarr::start().await;
        let client = mock.client();

        mock.set_details(dune());
        assert_eq!(client.lookup_details("42").await.unwrap().id, 42);

        mock.set_details(json!([dune()]));
        assert_eq!(client.lookup_details("42").await.unwrap().title, "Dune");

        mock.set_details(json!([]));
        assert!(matches!(
            client.lookup_details("42").await,
            Err(ReadarrError::NotFound(ref id)) if id == "42"
        ));
    }

    #[tokio::test]
    async fn test_add_requires_author_id() {
        let mock = MockReadarr::start().await;
        let candidate: Candidate =
            serde_json::from_value(json!({"id": 5, "title": "Orphan", "author": null})).unwrap();

        let err = mock.client().add_to_library(&candidate).await.unwrap_err();
        assert!(matches!(err, ReadarrError::MissingAuthorMetadata));
        assert!(mock.added().is_empty());
    }

    #[tokio::test]
    async fn test_add_sends_payload() {
        let mock = MockReadarr::start().await;
        let candidate: Candidate = serde_json::from_value(dune()).unwrap();

        mock.client().add_to_library(&candidate).await.unwrap();

        let added = mock.added();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0]["authorId"], 7);
        assert_eq!(added[0]["foreignBookId"], "42");
        assert_eq!(added[0]["monitored"], true);
        assert_eq!(added[0]["qualityProfileId"], 1);
        assert_eq!(added[0]["rootFolderPath"], "/books");
        assert_eq!(mock.last_api_key().as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn test_add_rejection_keeps_body() {
        let mock = MockReadarr::start().await;
        mock.reject_adds(409, "This book has already been added");
        let candidate: Candidate = serde_json::from_value(dune()).unwrap();

        let err = mock.client().add_to_library(&candidate).await.unwrap_err();
        match err {
            ReadarrError::Rejected { status, body } => {
                assert_eq!(status, 409);
                assert_eq!(body, "This book has already been added");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
