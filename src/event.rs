use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Events driving the watch loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// Periodic tick, time to poll the service again
  Tick,
  /// Ctrl-C
  Interrupt,
}

/// Event handler that produces events from a tick timer and the interrupt signal
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      // The first tick completes immediately
      interval.tick().await;
      loop {
        interval.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        debug!("interrupt received");
        let _ = tx.send(Event::Interrupt);
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
