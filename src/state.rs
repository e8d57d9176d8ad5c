use std::sync::Arc;

use crate::config::Config;
use crate::error::BlogResult;
use crate::gateway::Gateway;
use crate::likes::LikeCoordinator;
use crate::listing::ListView;
use crate::search::QueryDispatcher;
use crate::session::{ActiveSession, SessionRecord, SessionStore};

/// Everything a front end needs, wired once at startup.
#[derive(Clone)]
pub struct ClientState {
    pub config: Config,
    pub gateway: Gateway,
    pub session: Arc<SessionStore>,
    pub likes: Arc<LikeCoordinator<Gateway>>,
}

impl ClientState {
    /// Build the gateway and stores, then restore a persisted session if
    /// there is one.
    pub fn new(config: Config) -> BlogResult<Self> {
        let record = SessionRecord::new(&config.data_dir, &config.session.record_file);
        let active = Arc::new(ActiveSession::new(record));
        let gateway = Gateway::new(&config.api.base_url, config.request_timeout(), active)?;

        let session = Arc::new(SessionStore::new(gateway.clone()));
        session.load();

        let likes = Arc::new(LikeCoordinator::new(Arc::new(gateway.clone())));

        Ok(Self {
            config,
            gateway,
            session,
            likes,
        })
    }

    pub fn search(&self) -> QueryDispatcher<Gateway> {
        QueryDispatcher::new(Arc::new(self.gateway.clone()), self.config.debounce())
    }

    pub fn list_view(&self) -> ListView {
        ListView::new(self.config.listing.page_size)
    }
}
