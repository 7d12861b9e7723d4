//! WebDAV archive (Nextcloud, ownCloud and other RFC 4918 servers).

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};

use super::Archive;

/// A WebDAV collection reachable with basic authentication.
pub struct WebDavArchive {
    client: Client,
    root: Url,
    user: String,
    password: String,
}

impl WebDavArchive {
    /// Build the HTTP client and check that the base collection exists.
    ///
    /// Bad URLs and credentials fail here, before any mail is touched.
    pub fn connect(config: &ArchiveConfig) -> Result<Self> {
        let root = Url::parse(&config.url)
            .map_err(|e| ArchiveError::InvalidUrl(format!("{}: {e}", config.url)))?;
        if root.cannot_be_a_base() {
            return Err(ArchiveError::InvalidUrl(config.url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let archive = Self {
            client,
            root,
            user: config.user.clone(),
            password: config.password.clone(),
        };
        archive.check_collection(&config.base_path)?;
        info!(url = %archive.root, base_path = %config.base_path, "Archive reachable");
        Ok(archive)
    }

    /// Absolute URL for a `/`-separated path below the root.
    ///
    /// Each segment is percent-encoded, so spaces, `#` and `?` in derived
    /// file names are safe.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| ArchiveError::InvalidUrl(self.root.to_string()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn check_collection(&self, base_path: &str) -> Result<()> {
        let url = self.url_for(base_path)?;
        let propfind = Method::from_bytes(b"PROPFIND")
            .map_err(|e| ArchiveError::InvalidUrl(e.to_string()))?;
        let response = self
            .client
            .request(propfind, url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Depth", "0")
            .send()?;
        expect_success(response, "PROPFIND", base_path)
    }
}

impl Archive for WebDavArchive {
    fn upload(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let url = self.url_for(path)?;
        debug!(%url, size = data.len(), "PUT");
        let response = self
            .client
            .put(url)
            .basic_auth(&self.user, Some(&self.password))
            .header(CONTENT_TYPE, "application/pdf")
            .body(data.to_vec())
            .send()?;
        expect_success(response, "PUT", path)
    }
}

fn expect_success(response: Response, method: &str, path: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ArchiveError::UploadRejected {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(url: &str) -> WebDavArchive {
        WebDavArchive {
            client: Client::new(),
            root: Url::parse(url).unwrap(),
            user: "u".to_string(),
            password: "p".to_string(),
        }
    }

    #[test]
    fn test_url_for_escapes_segments() {
        let dav = archive("https://cloud.example.com/remote.php/dav/files/me/");
        let url = dav
            .url_for("Documents/Archive/2024-03-02_bill_[finance jane].pdf")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/remote.php/dav/files/me/Documents/Archive/2024-03-02_bill_[finance%20jane].pdf"
        );
    }

    #[test]
    fn test_url_for_root_without_trailing_slash() {
        let dav = archive("https://dav.example.com/files");
        let url = dav.url_for("a.pdf").unwrap();
        assert_eq!(url.as_str(), "https://dav.example.com/files/a.pdf");
    }

    #[test]
    fn test_url_for_empty_path_is_root() {
        let dav = archive("https://dav.example.com/files/");
        assert_eq!(dav.url_for("").unwrap().as_str(), "https://dav.example.com/files");
    }
}
