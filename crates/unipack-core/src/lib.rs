mod catalog;
mod installed;
mod request;

pub use catalog::{CatalogEntry, PackageCatalog, PackageCategory, PackageSet};
pub use installed::{InstalledPackage, PackageSourceKind};
pub use request::{InstallRequest, RequestError};
