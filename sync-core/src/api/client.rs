use super::{error::*, types::*};
use crate::path::RemotePath;
use crate::store::{Redundancy, RemoteObject, RemoteStore, UploadReceipt};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{ClientBuilder, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:9980";
pub const DEFAULT_USER_AGENT: &str = "Sia-Agent";

/// HTTP client for the renter API of a Sia node
#[derive(Debug, Clone)]
pub struct RenterClient {
    http_client: reqwest::Client,
    base_url: Url,
    password: Option<String>,
    read_retry_window: Duration,
}

impl RenterClient {
    /// Create a client for `address` (`host:port` or a full URL) with defaults
    pub fn new(address: impl AsRef<str>) -> Result<Self> {
        RenterClientBuilder::new(address.as_ref()).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Query the node version; used as a connectivity check at startup
    pub async fn daemon_version(&self) -> Result<DaemonVersion> {
        debug!("Querying daemon version");
        let url = self.base_url.join("daemon/version")?;
        self.retry_read(|| self.request_json(Method::GET, url.clone(), None))
            .await
    }

    fn endpoint(&self, route: &[&str], path: &RemotePath) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StoreError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
            })?;
            segments.pop_if_empty();
            segments.extend(route);
            if path.is_root() {
                segments.push("");
            } else {
                segments.extend(path.as_str().split(crate::path::SEPARATOR));
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.http_client.request(method, url);
        match &self.password {
            Some(password) => request.basic_auth("", Some(password)),
            None => request,
        }
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        path: Option<&RemotePath>,
    ) -> Result<T> {
        let response = self.request(method, url).send().await?;
        self.handle_response(response, path).await
    }

    async fn request_empty(&self, method: Method, url: Url, path: &RemotePath) -> Result<()> {
        let response = self.request(method, url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::parse_error_response(response, Some(path)).await)
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        path: Option<&RemotePath>,
    ) -> Result<T> {
        if response.status().is_success() {
            let content: T = response.json().await?;
            Ok(content)
        } else {
            Err(Self::parse_error_response(response, path).await)
        }
    }

    async fn parse_error_response(
        response: reqwest::Response,
        path: Option<&RemotePath>,
    ) -> StoreError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.message)
            .unwrap_or(text);

        classify_error(status, message, path)
    }

    async fn retry_read<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(self.read_retry_window),
            ..Default::default()
        };

        let operation = &operation;
        retry(backoff, move || async move {
            match operation().await {
                Ok(result) => Ok(result),
                Err(error) => {
                    if error.is_retryable() {
                        warn!("Retryable error occurred: {}", error);
                        Err(backoff::Error::transient(error))
                    } else {
                        debug!("Non-retryable error: {}", error);
                        Err(backoff::Error::permanent(error))
                    }
                }
            }
        })
        .await
    }

    async fn list_directory(&self, dir: &RemotePath) -> Result<RenterDirectory> {
        let url = self.endpoint(&["renter", "dir"], dir)?;
        self.retry_read(|| self.request_json(Method::GET, url.clone(), Some(dir)))
            .await
    }
}

/// Map a renter API failure onto the store error taxonomy.
///
/// The renter reports most conditions as a 400/500 with a message, so the
/// message text decides the variant.
pub(crate) fn classify_error(
    status: StatusCode,
    message: String,
    path: Option<&RemotePath>,
) -> StoreError {
    let subject = path.map(|p| p.to_string()).unwrap_or_default();
    let lowered = message.to_lowercase();

    if status == StatusCode::UNAUTHORIZED {
        StoreError::Authentication(message)
    } else if lowered.contains("no such file or directory") {
        StoreError::PrefixNotFound(subject)
    } else if lowered.contains("no file known") || status == StatusCode::NOT_FOUND {
        StoreError::NotFound(subject)
    } else if lowered.contains("already exists") || lowered.contains("path overload") {
        StoreError::AlreadyExists(subject)
    } else if status == StatusCode::SERVICE_UNAVAILABLE {
        StoreError::Unavailable(message)
    } else {
        StoreError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl RemoteStore for RenterClient {
    async fn upload(
        &self,
        local: &Path,
        destination: &RemotePath,
        redundancy: Redundancy,
    ) -> Result<UploadReceipt> {
        let params = UploadParams {
            source: local.to_string_lossy().into_owned(),
            data_pieces: redundancy.data_pieces,
            parity_pieces: redundancy.parity_pieces,
        };

        let mut url = self.endpoint(&["renter", "upload"], destination)?;
        url.set_query(Some(&serde_urlencoded::to_string(&params)?));

        debug!(destination = %destination, "Uploading file");
        self.request_empty(Method::POST, url, destination).await?;
        Ok(UploadReceipt::default())
    }

    async fn delete(&self, destination: &RemotePath) -> Result<()> {
        let url = self.endpoint(&["renter", "delete"], destination)?;
        debug!(destination = %destination, "Deleting file");
        self.request_empty(Method::POST, url, destination).await
    }

    async fn list(&self, prefix: &RemotePath) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut queue = VecDeque::from([prefix.clone()]);

        while let Some(dir) = queue.pop_front() {
            let listing = self.list_directory(&dir).await?;

            for file in listing.files.unwrap_or_default() {
                objects.push(RemoteObject {
                    path: RemotePath::new(&file.sia_path)?,
                    size: file.file_size,
                    fingerprint: None,
                });
            }

            for sub in listing.directories.unwrap_or_default() {
                let sub = RemotePath::new(&sub.sia_path)?;
                // the listed directory reports itself as the first entry
                if sub != dir {
                    queue.push_back(sub);
                }
            }
        }

        Ok(objects)
    }

    async fn exists(&self, destination: &RemotePath) -> Result<bool> {
        let url = self.endpoint(&["renter", "file"], destination)?;
        let lookup = self
            .retry_read(|| {
                self.request_json::<RenterFile>(Method::GET, url.clone(), Some(destination))
            })
            .await;

        match lookup {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// Builder pattern for client configuration
pub struct RenterClientBuilder {
    address: String,
    password: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: String,
    read_retry_window: Duration,
}

impl RenterClientBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: None,
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            read_retry_window: Duration::from_secs(60),
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = if password.is_empty() { None } else { Some(password) };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Upper bound on retries of idempotent reads (listing, lookups, version)
    pub fn read_retry_window(mut self, window: Duration) -> Self {
        self.read_retry_window = window;
        self
    }

    pub fn build(self) -> Result<RenterClient> {
        let mut client_builder = ClientBuilder::new().user_agent(self.user_agent);

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(connect_timeout) = self.connect_timeout {
            client_builder = client_builder.connect_timeout(connect_timeout);
        }

        let http_client = client_builder.build()?;

        Ok(RenterClient {
            http_client,
            base_url: parse_address(&self.address)?,
            password: self.password,
            read_retry_window: self.read_retry_window,
        })
    }
}

/// Accept both `host:port` and `http://host:port/`
fn parse_address(address: &str) -> Result<Url> {
    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let mut url = Url::parse(&with_scheme)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_client_creation() {
        let client = RenterClient::new(DEFAULT_ADDRESS);
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url().as_str(), "http://127.0.0.1:9980/");
    }

    #[test]
    fn test_client_builder() {
        let client = RenterClientBuilder::new("https://sia.example.com:9980")
            .timeout(Duration::from_secs(60))
            .user_agent("test-client/1.0")
            .password("secret")
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "https://sia.example.com:9980/");
        assert_eq!(client.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_empty_password_disables_auth() {
        let client = RenterClientBuilder::new(DEFAULT_ADDRESS)
            .password("")
            .build()
            .unwrap();
        assert!(client.password.is_none());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = RenterClient::new(DEFAULT_ADDRESS).unwrap();
        let path = RemotePath::new("siasync/my docs/a#1.txt").unwrap();
        let url = client.endpoint(&["renter", "upload"], &path).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9980/renter/upload/siasync/my%20docs/a%231.txt"
        );
    }

    #[test]
    fn test_endpoint_for_root() {
        let client = RenterClient::new(DEFAULT_ADDRESS).unwrap();
        let url = client.endpoint(&["renter", "dir"], &RemotePath::root()).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9980/renter/dir/");
    }

    #[test]
    fn test_query_encoding_failure_is_reported() {
        let err: StoreError = serde_urlencoded::to_string(5u32).unwrap_err().into();
        assert!(matches!(err, StoreError::QueryEncoding(_)));
        assert!(!err.is_retryable());
    }

    #[test_case(StatusCode::BAD_REQUEST, "no file known with that path", "not_found" ; "missing file")]
    #[test_case(StatusCode::INTERNAL_SERVER_ERROR, "open /x: no such file or directory", "prefix" ; "missing dir")]
    #[test_case(StatusCode::NOT_FOUND, "no such file or directory", "prefix" ; "missing dir as 404")]
    #[test_case(StatusCode::NOT_FOUND, "", "not_found" ; "bare 404")]
    #[test_case(StatusCode::BAD_REQUEST, "a file already exists at that location", "exists" ; "overload")]
    #[test_case(StatusCode::UNAUTHORIZED, "API authentication failed", "auth" ; "auth")]
    #[test_case(StatusCode::INTERNAL_SERVER_ERROR, "boom", "retryable" ; "server error")]
    #[test_case(StatusCode::BAD_REQUEST, "bad redundancy", "rejected" ; "rejected")]
    fn test_classify_error(status: StatusCode, message: &str, expected: &str) {
        let path = RemotePath::new("siasync/a.txt").unwrap();
        let error = classify_error(status, message.to_string(), Some(&path));
        let matched = match expected {
            "not_found" => error.is_not_found(),
            "prefix" => error.is_prefix_not_found(),
            "exists" => error.is_already_exists(),
            "auth" => matches!(error, StoreError::Authentication(_)),
            "retryable" => error.is_retryable(),
            "rejected" => matches!(error, StoreError::Rejected { status: 400, .. }) && !error.is_retryable(),
            _ => false,
        };
        assert!(matched, "unexpected classification: {:?}", error);
    }
}
