//! Fetcher collaborator
//!
//! A [`Fetcher`] resolves a key to a value asynchronously. The cache calls it at
//! most once per in-flight period of a key and does not care how the value is
//! obtained.

use std::future::Future;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::key::AssetKey;
use crate::sprite::Sprite;

/// Resolves a key to a value or a failure
pub trait Fetcher: Send + Sync + 'static {
    /// The resolved value type
    type Output: Send + Sync + 'static;

    /// Start resolving `key`
    ///
    /// The returned future completes exactly once, with the value or the
    /// resolution failure.
    fn fetch(&self, key: &AssetKey) -> BoxFuture<'static, Result<Self::Output>>;
}

/// Fetcher backed by a closure, see [`fetcher_fn`]
#[derive(Clone)]
pub struct FnFetcher<F> {
    f: F,
}

/// Build a [`Fetcher`] from a closure returning a future
pub fn fetcher_fn<F>(f: F) -> FnFetcher<F> {
    FnFetcher { f }
}

impl<F, Fut, V> Fetcher for FnFetcher<F>
where
    F: Fn(AssetKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
    V: Send + Sync + 'static,
{
    type Output = V;

    fn fetch(&self, key: &AssetKey) -> BoxFuture<'static, Result<V>> {
        (self.f)(key.clone()).boxed()
    }
}

/// Fetcher that loads sprites from a directory
///
/// URL keys are mapped through their path component, so
/// `https://host/portraits/men/1.jpg` is read from `<root>/portraits/men/1.jpg`.
/// Keys that are not URLs are taken as paths relative to the root.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    /// Create a fetcher reading below `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the fetcher
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a file below the root
    ///
    /// # Returns
    /// * `Result<PathBuf>` - `Error::InvalidPath` if the key escapes the root
    ///   or names no file
    pub fn resolve_path(&self, key: &AssetKey) -> Result<PathBuf> {
        let relative = match Url::parse(key.as_str()) {
            Ok(url) => url.path().to_string(),
            Err(_) => key.as_str().to_string(),
        };

        let mut path = self.root.clone();
        let mut depth = 0;
        for component in Path::new(relative.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidPath(format!(
                        "{} escapes the asset root",
                        key
                    )));
                }
            }
        }

        if depth == 0 {
            return Err(Error::InvalidPath(format!("{} names no file", key)));
        }
        Ok(path)
    }
}

impl Fetcher for FsFetcher {
    type Output = Sprite;

    fn fetch(&self, key: &AssetKey) -> BoxFuture<'static, Result<Sprite>> {
        let resolved = self.resolve_path(key);
        let key = key.clone();

        async move {
            let path = resolved?;
            debug!(%key, path = %path.display(), "Reading sprite");

            let data = tokio::fs::read(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound(key.to_string())
                } else {
                    Error::from(e)
                }
            })?;

            Sprite::decode(Bytes::from(data))
        }
        .boxed()
    }
}
