//! Shared constants for end-to-end tests

/// Any date inside a week works; these are the dates from the product brief.
pub const WEEK_1: &str = "2026-01-06";
pub const WEEK_2: &str = "2026-01-13";
pub const WEEK_3: &str = "2026-01-20";
pub const WEEK_4: &str = "2026-01-27";

pub const X_TOP_100: &str = "X-Top-100";
pub const HOUSE_TOP_100: &str = "house-top-100";
pub const TECHNO_TOP_100: &str = "techno-top-100";
