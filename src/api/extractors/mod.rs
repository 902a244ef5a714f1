/*!
 * Request extractors
 *
 * Responsibility:
 * - 認証済み claims (ClaimsExtractor) と XHR 判定 (Xhr) を handler に提供する
 */

mod claims;
mod xhr;

pub use claims::ClaimsExtractor;
pub use xhr::{Xhr, is_xhr};
