/*
 * Responsibility
 * - backend の `/_session` レスポンス (JSON) の userCtx を書き換える
 * - trusted: name を claims の表示名に置き換える (roles はそのまま)
 * - untrusted: name を null, roles を空にする
 * - HTTP には依存しない (handler 側で header/status を組み立てる)
 */
use percent_encoding::percent_decode_str;
use serde_json::Value;
use thiserror::Error;

use crate::services::auth::Claims;
use crate::services::trust::{TrustPolicy, is_trusted};

/// Path whose backend response is rewritten.
pub const SESSION_PATH: &str = "/_session";
/// CouchDB drops the empty trailing segment, so this is the same resource.
pub const SESSION_PATH_SLASH: &str = "/_session/";

const SESSION_SEGMENT: &str = "_session";

const USER_CTX: &str = "userCtx";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session document is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("session document has no `userCtx` object")]
    MissingUserCtx,
}

/// Whether `path` names the session resource once the backend has resolved it.
///
/// The backend decodes percent-escapes and ignores empty segments, and the
/// outbound URL parser resolves `.` / `..`, so `/%5Fsession`, `//_session/`
/// and `/db/../_session` all reach the same document.
pub fn is_session_path(path: &str) -> bool {
    let decoded = percent_decode_str(path).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments == [SESSION_SEGMENT]
}

/// Rewrite the identity part of a session document.
///
/// Returns the re-serialized document.
pub fn augment(raw: &[u8], claims: &Claims, policy: &TrustPolicy) -> Result<Vec<u8>, SessionError> {
    let mut session: Value = serde_json::from_slice(raw)?;

    let user_ctx = session
        .get_mut(USER_CTX)
        .and_then(Value::as_object_mut)
        .ok_or(SessionError::MissingUserCtx)?;

    if is_trusted(policy, claims) {
        user_ctx.insert("name".to_string(), Value::from(claims.name.clone()));
    } else {
        user_ctx.insert("name".to_string(), Value::Null);
        user_ctx.insert("roles".to_string(), Value::Array(Vec::new()));
    }

    Ok(serde_json::to_vec(&session)?)
}
