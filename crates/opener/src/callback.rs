//! Open callback surface handed to the engine while a handler opens.
//!
//! Built from three narrow capabilities: a credential source, an optional
//! volume source for split archives, and a sink for the name of the nested
//! item currently being opened.

use crate::error::EngineError;
use crate::probe::InStream;
use std::io;
use tracing::debug;
use zeroize::Zeroizing;

/// Supplies the password for an open call.
///
/// An empty password is treated the same as `None`.
pub trait CredentialSource {
    /// `None` when no password was supplied.
    fn password(&self) -> Option<&str>;
}

/// Ordered set of named volumes with a current-volume cursor.
pub trait VolumeSource {
    fn first_volume_name(&self) -> String;

    fn current_volume_name(&self) -> String;

    fn current_volume_size(&self) -> u64;

    /// Move the cursor to `name`. Returns `false` if no such volume exists.
    fn move_to_volume(&mut self, name: &str) -> bool;

    fn open_current_volume(&mut self) -> io::Result<Box<dyn InStream>>;
}

/// Records the display name of a nested item.
pub trait SubArchiveNameSink {
    fn set_sub_archive_name(&mut self, name: &str);
}

/// Password held for the duration of one open call.
///
/// The buffer is overwritten when dropped.
#[derive(Default)]
pub struct Credentials {
    password: Option<Zeroizing<String>>,
}

impl Credentials {
    /// An empty password counts as no password.
    pub fn new(password: Option<&str>) -> Self {
        Self {
            password: password
                .filter(|p| !p.is_empty())
                .map(|p| Zeroizing::new(p.to_string())),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.password.is_some()
    }
}

impl CredentialSource for Credentials {
    fn password(&self) -> Option<&str> {
        self.password.as_deref().map(String::as_str)
    }
}

impl<T: CredentialSource + ?Sized> CredentialSource for &T {
    fn password(&self) -> Option<&str> {
        (**self).password()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("defined", &self.is_defined())
            .finish()
    }
}

/// Name of the nested item being opened, if any.
#[derive(Debug, Default, Clone)]
pub struct SubArchiveName {
    name: Option<String>,
}

impl SubArchiveName {
    pub fn get(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl SubArchiveNameSink for SubArchiveName {
    fn set_sub_archive_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }
}

/// Callback passed to [`crate::engine::ArchiveHandler::open`].
pub struct OpenCallback<'a> {
    credentials: Box<dyn CredentialSource + 'a>,
    volumes: Option<&'a mut dyn VolumeSource>,
    sub_archive: SubArchiveName,
    archive_name: Option<String>,
    total_files: Option<u64>,
    total_bytes: Option<u64>,
    completed_files: u64,
    completed_bytes: u64,
}

impl<'a> OpenCallback<'a> {
    pub fn new(
        credentials: Box<dyn CredentialSource + 'a>,
        volumes: Option<&'a mut dyn VolumeSource>,
    ) -> Self {
        Self {
            credentials,
            volumes,
            sub_archive: SubArchiveName::default(),
            archive_name: None,
            total_files: None,
            total_bytes: None,
            completed_files: 0,
            completed_bytes: 0,
        }
    }

    /// Name of the outermost stream, reported by [`Self::name_property`]
    /// outside multi-volume and sub-archive mode.
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    pub fn set_total(&mut self, files: Option<u64>, bytes: Option<u64>) {
        if files.is_some() {
            self.total_files = files;
        }
        if bytes.is_some() {
            self.total_bytes = bytes;
        }
    }

    pub fn set_completed(&mut self, files: Option<u64>, bytes: Option<u64>) {
        if let Some(files) = files {
            self.completed_files = files;
        }
        if let Some(bytes) = bytes {
            self.completed_bytes = bytes;
        }
    }

    /// `(files, bytes)` as last reported through [`Self::set_total`].
    pub fn total(&self) -> (Option<u64>, Option<u64>) {
        (self.total_files, self.total_bytes)
    }

    pub fn completed(&self) -> (u64, u64) {
        (self.completed_files, self.completed_bytes)
    }

    /// Password for the archive being opened.
    ///
    /// # Errors
    ///
    /// Fails with `E_NEED_PASSWORD` when no password was supplied, so the
    /// caller can prompt and retry the whole open.
    pub fn password(&self) -> Result<&str, EngineError> {
        self.credentials
            .password()
            .filter(|p| !p.is_empty())
            .ok_or_else(EngineError::need_password)
    }

    pub fn is_multi_volume(&self) -> bool {
        self.volumes.is_some()
    }

    /// Open another volume of a split archive.
    ///
    /// Returns `Ok(None)` if the volume set has no volume called `name`.
    ///
    /// # Errors
    ///
    /// Fails with `E_NOT_IMPLEMENTED` outside multi-volume mode, or with the
    /// I/O error raised while opening the volume.
    pub fn volume_stream(&mut self, name: &str) -> Result<Option<Box<dyn InStream>>, EngineError> {
        let volumes = self
            .volumes
            .as_deref_mut()
            .ok_or_else(|| EngineError::not_implemented("volume streams"))?;

        if !volumes.move_to_volume(name) {
            debug!(volume = name, "requested volume not found");
            return Ok(None);
        }

        Ok(Some(volumes.open_current_volume()?))
    }

    /// Name of the stream being opened: the nested item's name while
    /// unwrapping, otherwise the current volume's name, otherwise the name
    /// the open call was given.
    pub fn name_property(&self) -> Option<String> {
        if let Some(name) = self.sub_archive.get() {
            return Some(name.to_string());
        }
        match self.volumes.as_deref() {
            Some(volumes) => Some(volumes.current_volume_name()),
            None => self.archive_name.clone(),
        }
    }

    /// Size of the current volume, outside sub-archive mode.
    pub fn size_property(&self) -> Option<u64> {
        if self.sub_archive.get().is_some() {
            return None;
        }
        self.volumes.as_deref().map(|v| v.current_volume_size())
    }

    pub fn sub_archive_name(&self) -> Option<&str> {
        self.sub_archive.get()
    }

    /// Naming capability, used by the orchestrator when it descends.
    pub fn name_sink(&mut self) -> &mut dyn SubArchiveNameSink {
        self
    }
}

impl SubArchiveNameSink for OpenCallback<'_> {
    fn set_sub_archive_name(&mut self, name: &str) {
        self.sub_archive.set_sub_archive_name(name);
        self.total_bytes = None;
    }
}
