/// Token type reported to clients on login.
pub const TOKEN_TYPE: &str = "Bearer";

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for other schemes or an empty
/// token.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(TOKEN_TYPE) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
