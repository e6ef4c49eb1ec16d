// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod file;
pub mod user;

pub use file::FileRecord;
pub use user::{Credential, User};
