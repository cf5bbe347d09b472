use std::sync::Mutex;

use async_trait::async_trait;

use crate::traits::AlertSink;

/// In-memory [`AlertSink`] that just records every message, in order.
#[derive(Default)]
pub struct FakeAlertSink {
    messages: Mutex<Vec<String>>,
}

impl FakeAlertSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages mutex poisoned").clone()
    }
}

#[async_trait]
impl AlertSink for FakeAlertSink {
    async fn alert(&self, message: String) {
        self.messages.lock().expect("messages mutex poisoned").push(message);
    }
}
