/*
 * Responsibility
 * - 認証済み呼び出し元の claims (handler から見える型)
 * - gate が検証して request extensions に格納し、handler はこの型だけを受け取る
 * - request scope のみ。永続化しない
 */

/// Verified identity of the caller for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// IdP subject, prefixed with the connection it came from (ex: `google-oauth2|123`)
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: bool,
    /// Display name
    pub name: Option<String>,
}
