use std::pin::Pin;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tokio_stream::StreamExt as _;

use crate::events::DocSaveEvent;
use crate::events::MessengerEvent;
use crate::traits::Messenger;

/// In-memory [`Messenger`]: a test pushes events directly onto it and the
/// core drains them as if they'd arrived over the wire.
pub struct FakeMessenger {
    events: broadcast::Sender<MessengerEvent>,
    saves: broadcast::Sender<DocSaveEvent>,
}

impl Default for FakeMessenger {
    fn default() -> Self {
        let (events, _) = broadcast::channel(256);
        let (saves, _) = broadcast::channel(256);
        Self { events, saves }
    }
}

impl FakeMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: MessengerEvent) {
        let _ = self.events.send(event);
    }

    pub fn push_save(&self, event: DocSaveEvent) {
        let _ = self.saves.send(event);
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    fn events(&self) -> Pin<Box<dyn Stream<Item = MessengerEvent> + Send>> {
        Box::pin(BroadcastStream::new(self.events.subscribe()).filter_map(Result::ok))
    }

    fn doc_saves(&self) -> Pin<Box<dyn Stream<Item = DocSaveEvent> + Send>> {
        Box::pin(BroadcastStream::new(self.saves.subscribe()).filter_map(Result::ok))
    }
}
