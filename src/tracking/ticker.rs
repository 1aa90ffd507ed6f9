use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::events;
use super::hub::Hub;

pub const DEMO_TICK_PERIOD: Duration = Duration::from_secs(30);

// Demo walk circles the park at these coordinates.
const BASE_LAT: f64 = 40.7829;
const BASE_LNG: f64 = -73.9654;

/// Synthetic location feed for demo clients: fixed period, every connection,
/// no authorization, no room targeting. Spawned once at boot and aborted at
/// shutdown so it can never fire into a torn-down hub.
pub struct DemoTicker {
    handle: JoinHandle<()>,
}

impl DemoTicker {
    pub fn spawn(hub: Arc<Hub>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                if hub.connection_count().await == 0 {
                    continue;
                }
                let (lat, lng) = jitter();
                hub.broadcast_all(&events::frame(
                    events::DEMO_LOCATION_UPDATE,
                    json!({ "location": { "lat": lat, "lng": lng } }),
                ))
                .await;
                debug!(lat, lng, "demo location emitted");
            }
        });
        Self { handle }
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

fn jitter() -> (f64, f64) {
    let mut rng = rand::rng();
    (
        BASE_LAT + rng.random_range(-0.01..0.01),
        BASE_LNG + rng.random_range(-0.01..0.01),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Identity, Role};
    use crate::tracking::hub::ConnectionHandle;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn connect(hub: &Hub) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let identity = Identity {
            uuid: Uuid::from_u128(1),
            name: "Carla".to_owned(),
            role: Role::Customer,
        };
        hub.register(ConnectionHandle::new(Uuid::now_v7(), identity, tx))
            .await;
        rx
    }

    #[tokio::test]
    async fn emits_synthetic_locations_to_connected_clients() {
        let hub = Arc::new(Hub::new());
        let mut rx = connect(&hub).await;
        let ticker = DemoTicker::spawn(hub.clone(), Duration::from_millis(10));

        let raw = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("ticker never fired")
            .unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["event"], events::DEMO_LOCATION_UPDATE);
        assert!(value["data"]["location"]["lat"].is_f64());
        assert!(value["data"]["location"]["lng"].is_f64());
        assert!(value["data"]["timestamp"].as_str().is_some());

        ticker.shutdown();
    }

    #[tokio::test]
    async fn shutdown_stops_the_feed() {
        let hub = Arc::new(Hub::new());
        let mut rx = connect(&hub).await;
        let ticker = DemoTicker::spawn(hub.clone(), Duration::from_millis(10));

        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("ticker never fired")
            .unwrap();
        ticker.shutdown();

        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
