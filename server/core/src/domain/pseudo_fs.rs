// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pseudo filesystem
//!
//! NFSv4 clients reach every export from a single root. The pseudo filesystem
//! is a synthetic, read-only directory tree (export 0) whose leaves are
//! junctions onto export roots.

use crate::domain::export::ExportId;
use crate::domain::file_handle::FileHandle;
use crate::domain::object::ObjectId;

pub trait PseudoFs: Send + Sync {
    /// Handle of the pseudo filesystem root
    fn root_handle(&self) -> FileHandle;

    /// Pseudo-tree node that mounts `export`
    fn junction_for(&self, export: ExportId) -> Option<ObjectId>;
}
