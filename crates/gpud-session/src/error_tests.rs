// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn http_status_codes_match_semantics() {
    assert_eq!(ErrorCode::NotFound.as_i32(), 404);
    assert_eq!(ErrorCode::BadRequest.as_i32(), 400);
    assert_eq!(ErrorCode::Conflict.as_i32(), 409);
}

#[test]
fn display_matches_as_str() {
    assert_eq!(ErrorCode::Internal.to_string(), "INTERNAL");
}
