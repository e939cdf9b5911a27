use std::time::Duration;

use log::{debug, info};
use tokio::{pin, select, time};
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker;

use crate::server::bus::NotificationBus;

async fn worker(bus: NotificationBus, every: Duration, cancel_token: CancellationToken) {
    let interval = time::interval(every);
    pin!(interval);
    // the first tick completes immediately
    interval.tick().await;
    loop {
        select! {
            _ = interval.tick() => {},
            _ = cancel_token.cancelled() => {
                info!("received cancel signal, returning gracefully");
                return;
            }
        }

        let removed = bus.sweep();
        if removed > 0 {
            info!("dropped {} abandoned rooms, {} live", removed, bus.room_count());
        } else {
            debug!("{} live rooms", bus.room_count());
        }
    }
}

/// Periodically forgets rooms whose subscribers have all disconnected.
pub async fn room_sweeper(bus: NotificationBus, every: Duration, cancel_token: CancellationToken) {
    let tracker = task_tracker::TaskTracker::new();
    tracker.spawn(worker(bus, every, cancel_token));
    if tracker.close() {
        tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::model::event::Room;

    #[tokio::test]
    async fn sweeps_until_cancelled() {
        let bus = NotificationBus::default();
        let kept = bus.subscribe(Room::Admin);
        drop(bus.subscribe(Room::Session("T3".to_string())));
        let cancel_token = CancellationToken::new();
        let sweeper = tokio::spawn(room_sweeper(bus.clone(), Duration::from_millis(20), cancel_token.clone()));

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(bus.room_count(), 1);
        assert_eq!(bus.subscriber_count(kept.room()), 1);

        cancel_token.cancel();
        sweeper.await.unwrap();
    }
}
