/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: 認証 gate を route に掛ける / http: request id, trace, body limit, timeout
 */
pub mod auth;
pub mod http;
