mod backend;
mod layout;
mod locator;
mod manifest;

pub use backend::{ManifestAddOperation, ProjectBackend};
pub use layout::UnityProject;
pub use locator::{parse_locator, Locator};
pub use manifest::{LockEntry, LockFile};
