use std::sync::Arc;

use cask_store::prelude::Storage;

/// Shared handler state: the storage pipeline behind the routes.
#[derive(Clone)]
pub struct ServiceState {
    pub store: Arc<dyn Storage>,
}
