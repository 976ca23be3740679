//! Blob models: a model instance plus a named piece of content

use crate::backend::ContentSettings;
use crate::content::detect_content_type;
use bytes::Bytes;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use stowage_core::{Model, ModelInstance, StowageError, StowageResult, Value};

/// Where a blob's content comes from
#[derive(Debug, Clone, PartialEq)]
pub enum BlobSource {
    Text(String),
    File(PathBuf),
    Bytes(Bytes),
}

impl BlobSource {
    /// A file source when `source` names an existing file, text otherwise
    pub async fn infer(source: &str) -> Self {
        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => BlobSource::File(PathBuf::from(source)),
            _ => BlobSource::Text(source.to_string()),
        }
    }

    /// Read the content; files are read asynchronously
    pub async fn load(&self) -> std::io::Result<Bytes> {
        match self {
            BlobSource::Text(text) => Ok(Bytes::from(text.clone())),
            BlobSource::File(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            BlobSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, BlobSource::File(_))
    }

    /// Content type for this source: text is `text/plain`, files are
    /// detected from their path, bytes from the blob name.
    pub fn content_type(&self, blob_name: &str, data: &[u8]) -> String {
        match self {
            BlobSource::Text(_) => "text/plain".to_string(),
            BlobSource::File(path) => detect_content_type(&path.to_string_lossy(), data),
            BlobSource::Bytes(_) => detect_content_type(blob_name, data),
        }
    }
}

impl From<&str> for BlobSource {
    fn from(text: &str) -> Self {
        BlobSource::Text(text.to_string())
    }
}

impl From<String> for BlobSource {
    fn from(text: String) -> Self {
        BlobSource::Text(text)
    }
}

impl From<PathBuf> for BlobSource {
    fn from(path: PathBuf) -> Self {
        BlobSource::File(path)
    }
}

impl From<&Path> for BlobSource {
    fn from(path: &Path) -> Self {
        BlobSource::File(path.to_path_buf())
    }
}

impl From<Bytes> for BlobSource {
    fn from(bytes: Bytes) -> Self {
        BlobSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for BlobSource {
    fn from(bytes: Vec<u8>) -> Self {
        BlobSource::Bytes(Bytes::from(bytes))
    }
}

/// A blob of model `M`.
///
/// The model's fields travel as blob metadata. Field access goes through
/// the wrapped [`ModelInstance`].
///
/// ```rust
/// use stowage_blob::Blob;
/// use stowage_core::{Model, SchemaBuilder, StorageKind};
///
/// struct Photo;
///
/// impl Model for Photo {
///     const NAME: &'static str = "Photo";
///     const KIND: StorageKind = StorageKind::Blob;
///
///     fn define(schema: SchemaBuilder) -> SchemaBuilder {
///         schema.field("User", "").field("Width", 0)
///     }
/// }
///
/// let mut blob = Blob::<Photo>::new().unwrap().with_text("hello");
/// blob.set("Width", "640");
/// assert_eq!(blob.get_as::<i64>("Width"), Some(640));
/// assert_eq!(blob.name().len(), 36);
/// ```
pub struct Blob<M: Model> {
    instance: ModelInstance<M>,
    name: String,
    source: Option<BlobSource>,
    content: Option<Bytes>,
    settings: ContentSettings,
}

impl<M: Model> Blob<M> {
    /// A blob with default fields, no content and a generated v4 UUID name
    pub fn new() -> StowageResult<Self> {
        Ok(Self::from_instance(ModelInstance::new()?))
    }

    /// A blob with the given name
    pub fn named(name: impl Into<String>) -> StowageResult<Self> {
        Ok(Self::new()?.with_name(name))
    }

    /// Wrap an existing instance under a generated name
    pub fn from_instance(instance: ModelInstance<M>) -> Self {
        Self {
            instance,
            name: uuid::Uuid::new_v4().to_string(),
            source: None,
            content: None,
            settings: ContentSettings::default(),
        }
    }

    /// Blob with field overrides, coerced like any model instance
    pub fn with_overrides<I, K, V>(overrides: I) -> StowageResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Ok(Self::from_instance(ModelInstance::with_overrides(overrides)?))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<BlobSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_source(BlobSource::Text(text.into()))
    }

    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_source(BlobSource::File(path.into()))
    }

    pub fn with_bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.with_source(BlobSource::Bytes(bytes.into()))
    }

    /// Override the detected content settings
    pub fn with_settings(mut self, settings: ContentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&BlobSource> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: impl Into<BlobSource>) {
        self.source = Some(source.into());
    }

    /// Content uploaded or downloaded last
    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    /// Content as UTF-8 text
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn settings(&self) -> &ContentSettings {
        &self.settings
    }

    pub fn content_type(&self) -> Option<&str> {
        self.settings.content_type.as_deref()
    }

    pub fn instance(&self) -> &ModelInstance<M> {
        &self.instance
    }

    pub fn into_instance(self) -> ModelInstance<M> {
        self.instance
    }

    /// Load the source and resolve the content type to upload with
    pub(crate) async fn prepare_upload(&self) -> StowageResult<(Bytes, ContentSettings)> {
        let source = self.source.as_ref().ok_or_else(|| StowageError::MissingContent {
            model: M::NAME.to_string(),
            blob: self.name.clone(),
        })?;
        let content = source.load().await?;

        let mut settings = self.settings.clone();
        if settings.content_type.is_none() {
            settings.content_type = Some(source.content_type(&self.name, &content));
        }
        Ok((content, settings))
    }

    pub(crate) fn uploaded(&mut self, content: Bytes, settings: ContentSettings) {
        self.content = Some(content);
        self.settings = settings;
        self.instance.mark_exists(true);
    }

    pub(crate) fn downloaded(&mut self, content: Bytes, settings: ContentSettings) {
        self.source = Some(BlobSource::Bytes(content.clone()));
        self.uploaded(content, settings);
    }
}

impl<M: Model> Deref for Blob<M> {
    type Target = ModelInstance<M>;

    fn deref(&self) -> &ModelInstance<M> {
        &self.instance
    }
}

impl<M: Model> DerefMut for Blob<M> {
    fn deref_mut(&mut self) -> &mut ModelInstance<M> {
        &mut self.instance
    }
}

impl<M: Model> Clone for Blob<M> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            name: self.name.clone(),
            source: self.source.clone(),
            content: self.content.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<M: Model> fmt::Debug for Blob<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("content_len", &self.content.as_ref().map(|c| c.len()))
            .field("settings", &self.settings)
            .field("instance", &self.instance)
            .finish()
    }
}
