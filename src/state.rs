/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - backend: BackendClient, trust: TrustPolicy, auth: AuthGate
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 * - request 間で共有する可変状態は持たない
 */
use std::sync::Arc;

use crate::services::{auth::AuthGate, backend::BackendClient, trust::TrustPolicy};

#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub trust: Arc<TrustPolicy>,
    pub auth: Arc<dyn AuthGate>,
}

impl AppState {
    pub fn new(backend: BackendClient, trust: TrustPolicy, auth: Arc<dyn AuthGate>) -> Self {
        Self {
            backend,
            trust: Arc::new(trust),
            auth,
        }
    }
}
