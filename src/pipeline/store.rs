//! Typed object-store client seam.
//!
//! The sync task talks to storage through the `ObjectStore` trait so that
//! failures come back as checked results and tests can substitute an
//! in-memory implementation. `S3Store` is the production implementation.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::error::{Error, Result};

/// A stored object's key and size, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
}

/// One-way object storage operations needed by the sync task.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object, overwriting any existing one under the key.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// List objects under a key prefix.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>>;
}

/// S3-backed object store using the AWS SDK.
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from the ambient AWS configuration (environment,
    /// shared profile, or instance metadata).
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            client: Client::new(&config),
        }
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::Store(format!("put s3://{}/{}: {}", bucket, key, e)))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| Error::Store(format!("list s3://{}/{}: {}", bucket, prefix, e)))?;
            for obj in page.contents() {
                objects.push(RemoteObject {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                });
            }
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_object_equality() {
        let a = RemoteObject {
            key: "artifact/report.json".to_string(),
            size: 42,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
