//! Attachment descriptors and the external validation seam.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One attached file as the composed message carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub media_type: String,
    pub size: u64,
}

/// External validation/processing collaborator.
///
/// Size/type checks, attachment-count limits, and content inspection (for
/// example PDF page counting) are delegated here, not performed by the
/// composer. Returns the validated/prepared descriptors or a
/// [`crate::Error::Validation`] with a user-facing message.
pub trait AttachmentValidator {
    fn validate(&mut self, files: &[FileDescriptor]) -> Result<Vec<FileDescriptor>>;
}

/// Default collaborator that accepts every file unchanged.
#[derive(Debug, Default)]
pub struct AcceptAll;

impl AttachmentValidator for AcceptAll {
    fn validate(&mut self, files: &[FileDescriptor]) -> Result<Vec<FileDescriptor>> {
        Ok(files.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_all_passes_files_through_in_order() {
        let files = vec![
            FileDescriptor {
                name: "a.pdf".into(),
                media_type: "application/pdf".into(),
                size: 1024,
            },
            FileDescriptor {
                name: "b.png".into(),
                media_type: "image/png".into(),
                size: 2048,
            },
        ];
        let validated = AcceptAll.validate(&files).expect("accepted");
        assert_eq!(validated, files);
    }
}
