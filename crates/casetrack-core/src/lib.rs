pub mod api_key;
pub mod attachment;
pub mod case;

pub use attachment::{is_valid_blob_id, AttachmentCategory, AttachmentRef};
pub use case::{Case, CaseStatus, Priority};
