//! User directory backed by the sprite cache

use anyhow::{anyhow, Context, Result};
use spritecache::{AssetCache, AssetKey, Error, Fetcher};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::users::{UserData, UsersData};

/// Correlates a thumbnail result with its list row
#[derive(Debug, Clone)]
pub struct RowRequest {
    /// Row index in payload order
    pub row: usize,
    /// Email of the row's user
    pub email: String,
}

/// Thumbnail outcome of one list row
#[derive(Debug)]
pub struct RowImage<V> {
    /// Row index in payload order
    pub row: usize,
    /// Email of the row's user
    pub email: String,
    /// Decoded thumbnail, or why the row has none
    pub image: spritecache::Result<Arc<V>>,
}

/// Users keyed by email, in payload order
pub struct UserDirectory {
    users: Vec<UserData>,
    by_email: HashMap<String, usize>,
}

impl UserDirectory {
    /// Build the directory from a payload; duplicate emails keep the first record
    pub fn from_payload(data: &UsersData) -> Self {
        let mut users = Vec::with_capacity(data.results.len());
        let mut by_email = HashMap::with_capacity(data.results.len());

        for record in &data.results {
            let user = UserData::from(record);
            if by_email.contains_key(&user.email) {
                warn!(email = %user.email, "Skipping duplicate user");
                continue;
            }
            by_email.insert(user.email.clone(), users.len());
            users.push(user);
        }

        Self { users, by_email }
    }

    /// Number of distinct users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the directory holds no users
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Look up a user by email
    pub fn get(&self, email: &str) -> Option<&UserData> {
        self.by_email.get(email).map(|&row| &self.users[row])
    }

    /// Users in payload order
    pub fn iter(&self) -> impl Iterator<Item = &UserData> {
        self.users.iter()
    }

    /// Request every row's thumbnail and wait until all rows are settled
    ///
    /// Rows sharing a thumbnail URL share one fetch.
    pub async fn load_thumbnails<F: Fetcher>(
        &self,
        cache: &AssetCache<F>,
    ) -> Vec<RowImage<F::Output>> {
        let mut images: Vec<Option<spritecache::Result<Arc<F::Output>>>> =
            (0..self.users.len()).map(|_| None).collect();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for (row, user) in self.users.iter().enumerate() {
            let key = match AssetKey::new(user.thumbnail_url.as_str()) {
                Ok(key) => key,
                Err(e) => {
                    images[row] = Some(Err(e));
                    continue;
                }
            };

            let tx = tx.clone();
            let request = RowRequest {
                row,
                email: user.email.clone(),
            };
            cache.fetch(key, request, move |request, result| {
                let _ = tx.send((request, result));
            });
        }
        drop(tx);

        // Ends once every callback has run and dropped its sender
        while let Some((request, result)) = rx.recv().await {
            debug!(
                row = request.row,
                email = %request.email,
                ok = result.is_ok(),
                "Thumbnail settled"
            );
            images[request.row] = Some(result);
        }

        self.users
            .iter()
            .zip(images)
            .enumerate()
            .map(|(row, (user, image))| RowImage {
                row,
                email: user.email.clone(),
                image: image
                    .unwrap_or_else(|| Err(Error::Aborted(user.thumbnail_url.clone()))),
            })
            .collect()
    }

    /// Fetch the large profile picture of one user
    pub async fn profile_picture<F: Fetcher>(
        &self,
        cache: &AssetCache<F>,
        email: &str,
    ) -> Result<Arc<F::Output>> {
        let user = self
            .get(email)
            .ok_or_else(|| anyhow!("Unknown user: {}", email))?;
        let key = AssetKey::new(user.image_url.as_str())
            .with_context(|| format!("User {} has no profile picture", email))?;

        cache
            .get(key)
            .await
            .with_context(|| format!("Failed to load profile picture of {}", email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{FinalUser, UserPicture};
    use spritecache::{FsFetcher, SpriteCache};
    use tempfile::TempDir;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data
    }

    fn user(email: &str, thumbnail: &str, large: &str) -> FinalUser {
        FinalUser {
            email: email.to_string(),
            picture: UserPicture {
                large: large.to_string(),
                medium: String::new(),
                thumbnail: thumbnail.to_string(),
            },
            ..Default::default()
        }
    }

    const SHARED_THUMB: &str = "https://cdn.example.com/thumb/shared.png";

    fn fixture() -> (TempDir, UserDirectory) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("thumb")).unwrap();
        std::fs::create_dir_all(dir.path().join("large")).unwrap();
        std::fs::write(dir.path().join("thumb/shared.png"), png(32, 32)).unwrap();
        std::fs::write(dir.path().join("large/a.png"), png(512, 512)).unwrap();

        let data = UsersData {
            results: vec![
                user("a@example.com", SHARED_THUMB, "https://cdn.example.com/large/a.png"),
                user("b@example.com", SHARED_THUMB, "https://cdn.example.com/large/b.png"),
                user("c@example.com", "https://cdn.example.com/thumb/missing.png", ""),
                user("d@example.com", "", ""),
                user("a@example.com", "ignored", "ignored"),
            ],
            ..Default::default()
        };

        (dir, UserDirectory::from_payload(&data))
    }

    #[test]
    fn test_duplicates_keep_first() {
        let (_dir, directory) = fixture();

        assert_eq!(directory.len(), 4);
        assert_eq!(
            directory.get("a@example.com").unwrap().image_url,
            "https://cdn.example.com/large/a.png"
        );
        assert!(directory.get("z@example.com").is_none());
    }

    #[tokio::test]
    async fn test_load_thumbnails() {
        let (dir, directory) = fixture();
        let cache = SpriteCache::try_current(FsFetcher::new(dir.path())).unwrap();

        let rows = directory.load_thumbnails(&cache).await;
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].email, "b@example.com");

        let a = rows[0].image.as_ref().unwrap();
        let b = rows[1].image.as_ref().unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(a.width(), 32);

        assert!(matches!(rows[2].image, Err(Error::NotFound(_))));
        assert!(matches!(rows[3].image, Err(Error::EmptyKey)));

        // The shared thumbnail and the missing one
        assert_eq!(cache.stats().misses(), 2);

        let again = directory.load_thumbnails(&cache).await;
        assert!(again[0].image.is_ok());
        assert_eq!(cache.stats().hits(), 2);
        assert_eq!(cache.stats().misses(), 3);
    }

    #[tokio::test]
    async fn test_profile_picture() {
        let (dir, directory) = fixture();
        let cache = SpriteCache::try_current(FsFetcher::new(dir.path())).unwrap();

        let sprite = directory.profile_picture(&cache, "a@example.com").await.unwrap();
        assert_eq!(sprite.height(), 512);

        assert!(directory.profile_picture(&cache, "b@example.com").await.is_err());
        assert!(directory.profile_picture(&cache, "c@example.com").await.is_err());
        assert!(directory.profile_picture(&cache, "z@example.com").await.is_err());
    }
}
