use crate::error::SparkError;
use crate::runtime::Runtime;
use crate::utils::download::HttpFetch;
use crate::version::VersionRecord;
use tracing::debug;

/// Versions published on a mirror. Every call re-fetches the document.
pub struct RemoteCatalog<'a> {
    runtime: &'a dyn Runtime,
    http: &'a dyn HttpFetch,
    mirror: &'a str,
}

impl<'a> RemoteCatalog<'a> {
    pub fn new(runtime: &'a dyn Runtime, http: &'a dyn HttpFetch, mirror: &'a str) -> Self {
        Self { runtime, http, mirror }
    }

    /// Records for the host platform accepted by `filter`, newest first.
    pub fn list(&self, filter: impl Fn(&VersionRecord) -> bool) -> Result<Vec<VersionRecord>, SparkError> {
        let url = self.runtime.catalog_url(self.mirror);
        let body = self.http.fetch_text(&url)?;
        let records: Vec<VersionRecord> = self
            .runtime
            .parse_catalog(&body)?
            .into_iter()
            .filter(|record| filter(record))
            .collect();
        debug!("{} offers {} {} versions", url, records.len(), self.runtime.display_name());
        Ok(records)
    }

    pub fn list_all(&self) -> Result<Vec<VersionRecord>, SparkError> {
        self.list(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::node::Node;
    use crate::runtime::Platform;
    use crate::utils::download::fakes::FakeHttp;

    const MIRROR: &str = "https://mirror.test/dist/";

    #[test]
    fn list_filters_and_keeps_descending_order() {
        let http = FakeHttp::default().serve(
            "https://mirror.test/dist/index.json",
            r#"[
                {"version":"v1.2.0","files":["linux-x64"],"lts":false},
                {"version":"v2.0.0","files":["linux-x64"],"lts":"Iron"},
                {"version":"v1.9.0","files":["osx-arm64-tar"],"lts":false}
            ]"#,
        );
        let node = Node::new(Platform::new("linux", "x86_64"));
        let catalog = RemoteCatalog::new(&node, &http, MIRROR);

        let all = catalog.list_all().expect("list");
        let labels: Vec<&str> = all.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["v2.0.0", "v1.2.0"]);

        let lts = catalog.list(VersionRecord::is_lts).expect("list");
        assert_eq!(lts.len(), 1);
        assert_eq!(http.requests.borrow().len(), 2);
    }

    #[test]
    fn unreachable_mirror_is_catalog_unavailable() {
        let http = FakeHttp::default();
        let node = Node::new(Platform::new("linux", "x86_64"));
        let catalog = RemoteCatalog::new(&node, &http, MIRROR);
        assert!(matches!(catalog.list_all(), Err(SparkError::CatalogUnavailable(_))));
    }
}
