use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Per-file upload ceiling (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Maximum number of files accepted by one upload request.
pub const MAX_IMAGES_PER_UPLOAD: usize = 10;
/// Object key prefix for every uploaded image.
pub const UPLOAD_PREFIX: &str = "uploads";

const ALLOWED_IMAGE_TYPES: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the object store holding villa images. The S3 client is used
/// against MinIO locally and any S3-compatible service in production; tests use the
/// in-memory mock.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used at local startup to provision MinIO.
    async fn ensure_bucket_exists(&self);

    /// Stores `body` under `key` and returns the URL clients should load it from.
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, String>;

    /// Removes `key`. Returns `Ok(false)` when there was nothing to delete.
    async fn delete_object(&self, key: &str) -> Result<bool, String>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// `force_path_style(true)` is required for MinIO-style endpoints.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_url: String,
}

impl S3StorageClient {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Path-style public URL: `{public_url}/{bucket}/{key}`.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_url, self.bucket_name, key)
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// CreateBucket fails harmlessly when the bucket is already there.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket({}): {}", self.bucket_name, e);
        }
    }

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, String> {
        let key = sanitize_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(self.object_url(&key))
    }

    /// delete_object
    ///
    /// S3 deletes are idempotent, so existence is checked with HeadObject first to
    /// report a missing image.
    async fn delete_object(&self, key: &str) -> Result<bool, String> {
        let key = sanitize_key(key);

        if let Err(e) = self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
        {
            let service_error = e.into_service_error();
            if service_error.is_not_found() {
                return Ok(false);
            }
            return Err(service_error.to_string());
        }

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(true)
    }
}

// --- Upload Helpers ---

/// sanitize_key
///
/// Removes empty, `.` and `..` segments so a user-influenced key cannot escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// image_extension
///
/// Returns the lower-cased extension when both the file extension and the declared MIME
/// type name an allowed image format, `None` otherwise.
pub fn image_extension(filename: &str, content_type: &str) -> Option<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)?;

    let content_type = content_type.to_ascii_lowercase();
    let mime_ok = content_type
        .strip_prefix("image/")
        .is_some_and(|subtype| ALLOWED_IMAGE_TYPES.contains(&subtype));

    if ALLOWED_IMAGE_TYPES.contains(&ext.as_str()) && mime_ok {
        Some(ext)
    } else {
        None
    }
}

/// new_image_filename
///
/// Collision-free stored name, e.g. `images-2f1c...e9.png`.
pub fn new_image_filename(ext: &str) -> String {
    format!("images-{}.{}", Uuid::new_v4().simple(), ext)
}

/// image_key
///
/// Maps a stored filename to its object key. Rejects names that are not a single plain
/// path segment.
pub fn image_key(filename: &str) -> Option<String> {
    let valid = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains('/')
        && !filename.contains('\\');
    valid.then(|| format!("{UPLOAD_PREFIX}/{filename}"))
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory stand-in for the object store. Keeps the stored object sizes so tests can
/// assert on uploads and deletions.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn put_object(
        &self,
        key: &str,
        _content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        let key = sanitize_key(key);
        self.objects
            .lock()
            .map_err(|e| e.to_string())?
            .insert(key.clone(), body.len());

        Ok(format!("http://localhost:9000/mock-bucket/{}", key))
    }

    async fn delete_object(&self, key: &str) -> Result<bool, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        let key = sanitize_key(key);
        let removed = self
            .objects
            .lock()
            .map_err(|e| e.to_string())?
            .remove(&key)
            .is_some();
        Ok(removed)
    }
}
