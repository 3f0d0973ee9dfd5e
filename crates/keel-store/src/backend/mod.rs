// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete backends (spec.md §4.F).

pub mod dynamic_url;
pub mod fs;
pub mod joined;
pub mod locking_fs;
pub mod memory;
pub mod mounted;
pub mod sqlite;
pub mod static_url;

pub use dynamic_url::DynamicUrlStore;
pub use fs::FileSystemStore;
pub use joined::JoinedStore;
pub use locking_fs::LockingFileSystemStore;
pub use memory::MemoryStore;
pub use mounted::MountedStore;
pub use sqlite::SqliteStore;
pub use static_url::StaticUrlStore;
