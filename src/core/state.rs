use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::Store;
use crate::services::mailer::Mailer;
use crate::services::notifications::NotificationDispatcher;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn Store>,
    dispatcher: NotificationDispatcher,
}

impl AppState {
    pub(crate) fn new(settings: Settings, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        let frontend_url = settings.mail().frontend_url.clone();
        let dispatcher = NotificationDispatcher::new(store.clone(), mailer, frontend_url);
        Self { inner: Arc::new(InnerState { settings, store, dispatcher }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub(crate) fn dispatcher(&self) -> &NotificationDispatcher {
        &self.inner.dispatcher
    }
}
