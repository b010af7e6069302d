//! Host-side adapters: package source, queue and storage backends.

pub mod package_source;
pub mod queue;
pub mod storage;

pub use package_source::FileSystemPackageSource;
pub use queue::{ConfiguredQueue, KvMessageQueue};
pub use storage::ConfiguredStore;
