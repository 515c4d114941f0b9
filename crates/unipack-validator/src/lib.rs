mod cache;
mod clock;

pub use cache::{InstalledPackageCache, InstalledSnapshot, InstalledSource, DEFAULT_CACHE_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
