//! Filesystem layout for photo files.
//!
//! Every photo lives at `<root>/<visibility>/<kind>/<journey_id>/<filename>`,
//! where the visibility segment is derived from the record's
//! confidentiality level. A record whose confidentiality changes must have
//! its files renamed across the public/private subtrees before the new
//! level is persisted; `relocate` does that and refuses partial moves.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::warn;

use crate::infra::thumbs;

pub const THUMBNAIL_SUFFIX: &str = ".th.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Photo,
    Thumb,
}

impl ImageKind {
    pub fn segment(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Thumb => "thumb",
        }
    }

    pub fn from_segment(value: &str) -> Option<Self> {
        match value {
            "photo" => Some(Self::Photo),
            "thumb" => Some(Self::Thumb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn from_confidentiality(confidentiality: i16) -> Self {
        if confidentiality > 0 {
            Self::Private
        } else {
            Self::Public
        }
    }

    pub fn segment(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn from_segment(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Filenames come in from URLs and import requests; anything that could
/// escape the per-journey directory is rejected outright.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[derive(Clone, Debug)]
pub struct PhotoStore {
    root: PathBuf,
    thumbnail_size: u32,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>, thumbnail_size: u32) -> Self {
        Self {
            root: root.into(),
            thumbnail_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn thumbnail_size(&self) -> u32 {
        self.thumbnail_size
    }

    /// Resolve the storage path for one file. Pure: no filesystem access.
    pub fn file_path(
        &self,
        kind: ImageKind,
        journey_id: i64,
        filename: &str,
        confidentiality: i16,
    ) -> PathBuf {
        let mut name = filename.to_string();
        if kind == ImageKind::Thumb {
            name.push_str(THUMBNAIL_SUFFIX);
        }
        self.root
            .join(Visibility::from_confidentiality(confidentiality).segment())
            .join(kind.segment())
            .join(journey_id.to_string())
            .join(name)
    }

    /// Move a photo's files between the public and private subtrees after a
    /// confidentiality change. A missing source file is a no-op (the
    /// thumbnail may never have been generated). If the thumbnail move
    /// fails after the photo moved, the photo move is undone so the caller
    /// can abort without leaving the two kinds split across subtrees.
    pub fn relocate(
        &self,
        journey_id: i64,
        filename: &str,
        old_confidentiality: i16,
        new_confidentiality: i16,
    ) -> io::Result<()> {
        let moved_photo = self.move_kind(
            ImageKind::Photo,
            journey_id,
            filename,
            old_confidentiality,
            new_confidentiality,
        )?;

        if let Err(err) = self.move_kind(
            ImageKind::Thumb,
            journey_id,
            filename,
            old_confidentiality,
            new_confidentiality,
        ) {
            if let Some((old_path, new_path)) = moved_photo {
                if let Err(undo) = fs::rename(&new_path, &old_path) {
                    warn!(
                        journey_id,
                        filename,
                        error = %undo,
                        "could not undo photo move after thumbnail move failed"
                    );
                }
            }
            return Err(err);
        }

        Ok(())
    }

    fn move_kind(
        &self,
        kind: ImageKind,
        journey_id: i64,
        filename: &str,
        old_confidentiality: i16,
        new_confidentiality: i16,
    ) -> io::Result<Option<(PathBuf, PathBuf)>> {
        let old_path = self.file_path(kind, journey_id, filename, old_confidentiality);
        let new_path = self.file_path(kind, journey_id, filename, new_confidentiality);

        if !old_path.exists() {
            return Ok(None);
        }

        if let Some(parent) = new_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&old_path, &new_path)?;
        Ok(Some((old_path, new_path)))
    }

    /// Write an imported original into the tree, atomically (temp file in
    /// the target directory, then rename).
    pub fn write_original(
        &self,
        journey_id: i64,
        filename: &str,
        confidentiality: i16,
        data: &[u8],
    ) -> io::Result<PathBuf> {
        let path = self.file_path(ImageKind::Photo, journey_id, filename, confidentiality);
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(path)
    }

    pub fn remove_original(&self, journey_id: i64, filename: &str, confidentiality: i16) {
        let path = self.file_path(ImageKind::Photo, journey_id, filename, confidentiality);
        if let Err(err) = fs::remove_file(&path) {
            warn!(journey_id, filename, error = %err, "could not remove photo file");
        }
    }

    /// Regenerate the thumbnail when it is missing or older than the
    /// record's modification stamp. Returns whether a file was written.
    pub fn ensure_thumbnail(
        &self,
        journey_id: i64,
        filename: &str,
        confidentiality: i16,
        modified_at: OffsetDateTime,
    ) -> Result<bool> {
        let photo_path = self.file_path(ImageKind::Photo, journey_id, filename, confidentiality);
        let thumb_path = self.file_path(ImageKind::Thumb, journey_id, filename, confidentiality);
        thumbs::ensure_thumbnail(&photo_path, &thumb_path, self.thumbnail_size, modified_at)
    }
}
