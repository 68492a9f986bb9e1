// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Avatar helpers for users without a profile picture.

/// Background colors for generated avatars.
pub const AVATAR_PALETTE: [&str; 8] = [
    "#F44336", "#E91E63", "#9C27B0", "#3F51B5", "#03A9F4", "#009688", "#8BC34A", "#FF9800",
];

/// Pick a palette color from a user id. Same id, same color on every platform.
pub fn generate_avatar_color(id: &str) -> &'static str {
    let hash = id.chars().fold(0i32, |hash, c| {
        (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    AVATAR_PALETTE[(hash.unsigned_abs() as usize) % AVATAR_PALETTE.len()]
}

/// Uppercased first letter of the name, or `?` when there is none.
pub fn get_initials(name: &str) -> String {
    name.trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}
