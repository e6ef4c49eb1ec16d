// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timestamp helpers for stored records.
//!
//! Record timestamps are RFC3339 strings at millisecond precision with a `Z`
//! suffix, so string order is time order and the stores can sort on them
//! directly.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp in the stored form.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time in the stored form.
pub fn now_utc_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}
