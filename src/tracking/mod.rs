mod dispatch;
mod events;
mod hub;
mod ticker;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use hub::Hub;
pub use ticker::{DEMO_TICK_PERIOD, DemoTicker};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::tracking_ws))
}
