//! Testing utilities for the gallery workspace
//!
//! In-memory collaborators with call logs and failure injection, plus a
//! [`Harness`] wiring them into a [`Gallery`].

#![allow(missing_docs)]

use async_trait::async_trait;
use gallery_core::{
    BlobName, BlobStore, Clock, Collaborators, Confirm, Gallery, GalleryConfig, ImageFile,
    ImageRecordFields, MetadataStore, Notification, NotificationSink, OwnerId, RecordId, SasToken,
    StoredRecord, ThumbnailError, ThumbnailGenerator, TransportError,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use url::Url;

pub const TEST_ENDPOINT: &str = "https://testaccount.blob.core.windows.net";
pub const TEST_CONTAINER: &str = "images";
pub const TEST_OWNER: &str = "prop-001";
pub const TEST_THUMBNAIL: &str = "data:image/jpeg;base64,VEhVTUI=";

pub fn credential() -> SasToken {
    SasToken::new("sv=2022-11-02&sig=test")
}

pub fn image(name: &str) -> ImageFile {
    ImageFile::new(name, "image/jpeg", name.as_bytes().repeat(16))
}

pub fn blob_url(name: &str) -> Url {
    Url::parse(&format!("{TEST_ENDPOINT}/{TEST_CONTAINER}/{name}")).unwrap()
}

fn injected() -> TransportError {
    TransportError::status(500, "injected failure")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobCall {
    Upload(String),
    Delete(String),
    List(String),
}

/// Pauses the next upload until released
#[derive(Debug, Default)]
pub struct UploadGate {
    entered: Notify,
    release: Notify,
}

impl UploadGate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Blob container kept in memory, ordered by name
#[derive(Debug)]
pub struct MemoryBlobStore {
    endpoint: Url,
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    calls: Mutex<Vec<BlobCall>>,
    failing_uploads: Mutex<Vec<String>>,
    fail_deletes: AtomicBool,
    fail_list: AtomicBool,
    fail_urls: AtomicBool,
    gate: Mutex<Option<Arc<UploadGate>>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            endpoint: Url::parse(TEST_ENDPOINT).unwrap(),
            blobs: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failing_uploads: Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_urls: AtomicBool::new(false),
            gate: Mutex::new(None),
        }
    }

    pub fn insert(&self, name: &str, bytes: &[u8]) {
        self.blobs.lock().insert(name.to_string(), bytes.to_vec());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.lock().contains_key(name)
    }

    pub fn bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<BlobCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Fail every upload whose blob name contains `needle`
    pub fn fail_uploads_containing(&self, needle: &str) {
        self.failing_uploads.lock().push(needle.to_string());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_urls(&self, fail: bool) {
        self.fail_urls.store(fail, Ordering::SeqCst);
    }

    /// Hold the next upload at the gate
    pub fn hold_next_upload(&self) -> Arc<UploadGate> {
        let gate = Arc::new(UploadGate::default());
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    fn authorize(credential: &SasToken) -> Result<(), TransportError> {
        if credential.is_empty() {
            return Err(TransportError::Unauthorized("missing SAS token".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        credential: &SasToken,
        name: &BlobName,
        bytes: &[u8],
        _content_type: &str,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Url, TransportError> {
        self.calls.lock().push(BlobCall::Upload(name.to_string()));

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        Self::authorize(credential)?;
        if self
            .failing_uploads
            .lock()
            .iter()
            .any(|needle| name.as_str().contains(needle.as_str()))
        {
            return Err(injected());
        }

        let total = bytes.len() as u64;
        on_progress(total / 2);
        on_progress(total);

        self.blobs.lock().insert(name.to_string(), bytes.to_vec());
        self.url_for(name)
    }

    async fn delete(&self, credential: &SasToken, name: &BlobName) -> Result<(), TransportError> {
        self.calls.lock().push(BlobCall::Delete(name.to_string()));
        Self::authorize(credential)?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        match self.blobs.lock().remove(name.as_str()) {
            Some(_) => Ok(()),
            None => Err(TransportError::NotFound(name.to_string())),
        }
    }

    async fn list(&self, credential: &SasToken, prefix: &str) -> Result<Vec<BlobName>, TransportError> {
        self.calls.lock().push(BlobCall::List(prefix.to_string()));
        Self::authorize(credential)?;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.blobs
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .map(|key| BlobName::new(key.as_str()).map_err(|e| TransportError::Malformed(e.to_string())))
            .collect()
    }

    fn url_for(&self, name: &BlobName) -> Result<Url, TransportError> {
        if self.fail_urls.load(Ordering::SeqCst) {
            return Err(TransportError::Malformed(format!("no url for {name}")));
        }
        name.url_in(&self.endpoint, TEST_CONTAINER)
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCall {
    Create(String),
    Update(String),
    Delete(String),
    Query(String),
}

/// Metadata records kept in memory, with ids `rec-1`, `rec-2`, ...
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Mutex<BTreeMap<String, ImageRecordFields>>,
    next_id: AtomicU64,
    calls: Mutex<Vec<RecordCall>>,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    fail_delete: AtomicBool,
    fail_query: AtomicBool,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record directly, bypassing the call log
    pub fn seed(&self, owner: &str, image_url: &Url) -> RecordId {
        let id = self.allocate();
        self.records.lock().insert(
            id.as_str().to_string(),
            ImageRecordFields {
                owner: OwnerId::new(owner).unwrap(),
                image_url: image_url.to_string(),
                thumbnail: "c2VlZA==".to_string(),
            },
        );
        id
    }

    pub fn get(&self, id: &str) -> Option<ImageRecordFields> {
        self.records.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<RecordCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }

    fn allocate(&self) -> RecordId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        RecordId::new(format!("rec-{n}"))
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create(&self, entity: &str, fields: &ImageRecordFields) -> Result<RecordId, TransportError> {
        self.calls.lock().push(RecordCall::Create(entity.to_string()));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let id = self.allocate();
        self.records
            .lock()
            .insert(id.as_str().to_string(), fields.clone());
        Ok(id)
    }

    async fn update(
        &self,
        _entity: &str,
        id: &RecordId,
        fields: &ImageRecordFields,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(RecordCall::Update(id.to_string()));
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(injected());
        }
        match self.records.lock().get_mut(id.as_str()) {
            Some(record) => {
                *record = fields.clone();
                Ok(())
            }
            None => Err(TransportError::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, _entity: &str, id: &RecordId) -> Result<(), TransportError> {
        self.calls.lock().push(RecordCall::Delete(id.to_string()));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected());
        }
        match self.records.lock().remove(id.as_str()) {
            Some(_) => Ok(()),
            None => Err(TransportError::NotFound(id.to_string())),
        }
    }

    async fn find_by_owner(&self, _entity: &str, owner: &OwnerId) -> Result<Vec<StoredRecord>, TransportError> {
        self.calls.lock().push(RecordCall::Query(owner.to_string()));
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|(_, fields)| &fields.owner == owner)
            .map(|(id, fields)| StoredRecord {
                id: RecordId::new(id.as_str()),
                image_url: fields.image_url.clone(),
            })
            .collect())
    }
}

/// Sink remembering every render, hides included
#[derive(Debug, Default)]
pub struct RecordingSink {
    renders: Mutex<Vec<Option<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renders(&self) -> Vec<Option<Notification>> {
        self.renders.lock().clone()
    }

    /// Every notice shown, in order
    pub fn shown(&self) -> Vec<Notification> {
        self.renders.lock().iter().flatten().cloned().collect()
    }

    /// Success and error notices only, in order
    pub fn outcomes(&self) -> Vec<Notification> {
        self.shown()
            .into_iter()
            .filter(|n| n.progress.is_none())
            .collect()
    }

    pub fn clear(&self) {
        self.renders.lock().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn render(&self, notice: Option<&Notification>) {
        self.renders.lock().push(notice.cloned());
    }
}

/// Confirmation gate answering from a script, then with a default
#[derive(Debug)]
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<bool>>,
    default: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn always(answer: bool) -> Self {
        Self::script(Vec::new(), answer)
    }

    pub fn script(answers: Vec<bool>, default: bool) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            default,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, answer: bool) {
        self.answers.lock().push_back(answer);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().push(prompt.to_string());
        self.answers.lock().pop_front().unwrap_or(self.default)
    }
}

/// Clock ticking one millisecond per reading
#[derive(Debug)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn starting_at(millis: i64) -> Self {
        Self(AtomicI64::new(millis))
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::starting_at(1_718_000_000_000)
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Thumbnail generator returning [`TEST_THUMBNAIL`]
#[derive(Debug, Default)]
pub struct StaticThumbnails {
    failing: Mutex<Vec<String>>,
}

impl StaticThumbnails {
    pub fn fail_for(&self, file_name: &str) {
        self.failing.lock().push(file_name.to_string());
    }
}

#[async_trait]
impl ThumbnailGenerator for StaticThumbnails {
    async fn derive(&self, file: &ImageFile) -> Result<String, ThumbnailError> {
        if self.failing.lock().iter().any(|name| name == &file.name) {
            return Err(ThumbnailError(format!("cannot decode {}", file.name)));
        }
        Ok(TEST_THUMBNAIL.to_string())
    }
}

/// Gallery wired to in-memory collaborators
pub struct Harness {
    pub gallery: Gallery,
    pub blobs: Arc<MemoryBlobStore>,
    pub records: Arc<MemoryMetadataStore>,
    pub sink: Arc<RecordingSink>,
    pub confirm: Arc<ScriptedConfirm>,
    pub thumbnails: Arc<StaticThumbnails>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(GalleryConfig::new())
    }

    pub fn with_config(config: GalleryConfig) -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        let records = Arc::new(MemoryMetadataStore::new());
        let sink = Arc::new(RecordingSink::new());
        let confirm = Arc::new(ScriptedConfirm::always(true));
        let thumbnails = Arc::new(StaticThumbnails::default());

        let gallery = Gallery::new(
            config,
            Collaborators {
                blobs: blobs.clone(),
                records: records.clone(),
                thumbnails: thumbnails.clone(),
                confirm: confirm.clone(),
                clock: Arc::new(FixedClock::default()),
                notices: sink.clone(),
            },
        );

        Self {
            gallery,
            blobs,
            records,
            sink,
            confirm,
            thumbnails,
        }
    }

    /// Harness bound to [`TEST_OWNER`], with empty call logs
    pub async fn bound() -> Self {
        let harness = Self::new();
        harness.gallery.bind(TEST_OWNER, credential()).await.unwrap();
        harness.reset_logs();
        harness
    }

    /// Store a blob and its record for [`TEST_OWNER`] without going through
    /// the gallery
    pub fn seed_image(&self, name: &str) -> RecordId {
        self.blobs.insert(name, name.as_bytes());
        self.records.seed(TEST_OWNER, &blob_url(name))
    }

    pub fn reset_logs(&self) {
        self.blobs.clear_calls();
        self.records.clear_calls();
        self.sink.clear();
    }
}
