use crate::error::SparkError;
use indicatif::ProgressBar;
use reqwest::blocking::{Client, Response};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

/// Minimal HTTP surface used by the catalog and the install pipeline.
pub trait HttpFetch {
    fn fetch_text(&self, url: &str) -> Result<String, SparkError>;

    /// Streams `url` into `dest`, returning the number of bytes written.
    fn download_to(&self, url: &str, dest: &mut dyn Write, progress: &ProgressBar) -> Result<u64, SparkError>;
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Option<Duration>, proxy: Option<&str>) -> Result<Self, SparkError> {
        let mut builder = Client::builder()
            .user_agent(concat!("spark/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);
        if let Some(proxy) = proxy.filter(|proxy| !proxy.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| SparkError::Config(format!("invalid proxy [{proxy}]: {err}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| SparkError::Config(format!("cannot build http client: {err}")))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Response, String> {
        debug!("GET {url}");
        let resp = self.client.get(url).send().map_err(|err| err.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("unexpected status {status}"));
        }
        Ok(resp)
    }
}

impl HttpFetch for HttpClient {
    fn fetch_text(&self, url: &str) -> Result<String, SparkError> {
        self.get(url)
            .and_then(|resp| resp.text().map_err(|err| err.to_string()))
            .map_err(|reason| SparkError::CatalogUnavailable(format!("{url}: {reason}")))
    }

    fn download_to(&self, url: &str, dest: &mut dyn Write, progress: &ProgressBar) -> Result<u64, SparkError> {
        let failed = |reason: String| SparkError::DownloadFailed {
            url: url.to_string(),
            reason,
        };
        let mut resp = self.get(url).map_err(failed)?;
        progress.set_length(resp.content_length().unwrap_or(0));

        let written = std::io::copy(&mut resp, &mut progress.wrap_write(dest))
            .map_err(|err| failed(err.to_string()))?;
        progress.finish_and_clear();
        Ok(written)
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Serves canned bodies by URL; unknown URLs answer like a 404.
    #[derive(Default)]
    pub(crate) struct FakeHttp {
        pub(crate) bodies: BTreeMap<String, Vec<u8>>,
        pub(crate) requests: RefCell<Vec<String>>,
    }

    impl FakeHttp {
        pub(crate) fn serve(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        fn lookup(&self, url: &str) -> Result<&Vec<u8>, String> {
            self.requests.borrow_mut().push(url.to_string());
            self.bodies
                .get(url)
                .ok_or_else(|| "unexpected status 404 Not Found".to_string())
        }
    }

    impl HttpFetch for FakeHttp {
        fn fetch_text(&self, url: &str) -> Result<String, SparkError> {
            self.lookup(url)
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .map_err(SparkError::CatalogUnavailable)
        }

        fn download_to(&self, url: &str, dest: &mut dyn Write, progress: &ProgressBar) -> Result<u64, SparkError> {
            let body = self.lookup(url).map_err(|reason| SparkError::DownloadFailed {
                url: url.to_string(),
                reason,
            })?;
            progress.wrap_write(dest).write_all(body)?;
            Ok(body.len() as u64)
        }
    }
}
