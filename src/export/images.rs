//! Extraction of embedded images to a directory.
//!
//! File names are derived from the record's stable index and the field path,
//! so two records (or two runs) never write to the same name unless they are
//! the same image.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::amc::format::layout::RecordLayout;
use crate::amc::types::error::{AmcError, Result};
use crate::amc::types::layout::{BlobKind, FieldKind};
use crate::amc::types::models::{Fields, MovieRecord};
use crate::amc::utils;

/// Extension used when the stored path does not carry a usable one.
pub const DEFAULT_IMAGE_EXTENSION: &str = ".jpg";

/// `"{index:04}_{field_path}{extension}"`
pub fn image_file_name(index: usize, field_path: &str, extension: &str) -> String {
    format!("{:04}_{}{}", index, field_path, extension)
}

/// Field path of a field inside the `position`-th entry (from 1) of a group.
pub fn group_field_path(group: &str, position: usize, field: &str) -> String {
    format!("{}-{}-{}", group, position, field)
}

/// Extension for an image whose original path is stored in `path_field`.
pub fn image_extension(fields: &Fields, path_field: &str) -> String {
    fields
        .text(path_field)
        .and_then(utils::extension_from_path)
        .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string())
}

/// Outcome of extracting the images of one record.
#[derive(Debug, Default)]
pub struct ImageReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<AmcError>,
}

#[derive(Debug, Clone)]
struct ImageField {
    name: Cow<'static, str>,
    path_field: &'static str,
}

#[derive(Debug, Clone)]
struct GroupImageField {
    group: Cow<'static, str>,
    field: ImageField,
}

/// Writes the image attachments of records into one directory.
#[derive(Debug)]
pub struct ImageExtractor {
    dir: PathBuf,
    top_level: Vec<ImageField>,
    grouped: Vec<GroupImageField>,
}

impl ImageExtractor {
    /// Prepares extraction into `dir`, creating it if needed.
    ///
    /// The image fields to look for are taken from `layout`.
    pub fn new(dir: impl Into<PathBuf>, layout: &RecordLayout) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| AmcError::ImageWrite {
            path: dir.clone(),
            source,
        })?;
        info!("Extracting embedded images to: {}", dir.display());

        let mut top_level = Vec::new();
        let mut grouped = Vec::new();
        for spec in layout.fields() {
            match spec.kind {
                FieldKind::Blob(BlobKind::Image { path_field }) => top_level.push(ImageField {
                    name: spec.name.clone(),
                    path_field,
                }),
                FieldKind::Group(entries) => {
                    for sub in entries {
                        if let FieldKind::Blob(BlobKind::Image { path_field }) = sub.kind {
                            grouped.push(GroupImageField {
                                group: spec.name.clone(),
                                field: ImageField {
                                    name: sub.name.clone(),
                                    path_field,
                                },
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            dir,
            top_level,
            grouped,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes every non-empty image of `record`.
    ///
    /// A failed write is reported in the result and does not stop the others.
    pub fn extract(&self, record: &MovieRecord) -> ImageReport {
        let mut report = ImageReport::default();

        for field in &self.top_level {
            self.write_image(record, &record.fields, field, field.name.as_ref(), &mut report);
        }

        for grouped in &self.grouped {
            let Some(entries) = record.fields.group(&grouped.group) else {
                continue;
            };
            for (i, entry) in entries.iter().enumerate() {
                let field_path = group_field_path(&grouped.group, i + 1, &grouped.field.name);
                self.write_image(record, entry, &grouped.field, &field_path, &mut report);
            }
        }

        report
    }

    fn write_image(
        &self,
        record: &MovieRecord,
        fields: &Fields,
        field: &ImageField,
        field_path: &str,
        report: &mut ImageReport,
    ) {
        let Some(blob) = fields.blob(&field.name) else {
            return;
        };
        if blob.is_empty() {
            return;
        }

        let extension = image_extension(fields, field.path_field);
        let path = self
            .dir
            .join(image_file_name(record.index, field_path, &extension));
        match fs::write(&path, blob.data()) {
            Ok(()) => {
                debug!(
                    "Record #{}: {} ({} bytes)",
                    record.index,
                    path.display(),
                    blob.len()
                );
                report.written.push(path);
            }
            Err(source) => {
                warn!("Failed to write image {}: {}", path.display(), source);
                report.failures.push(AmcError::ImageWrite { path, source });
            }
        }
    }
}
