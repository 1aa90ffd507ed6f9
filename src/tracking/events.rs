use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::db::BookingStatus;

// Outbound event names.
pub const TRACKING_JOINED: &str = "tracking_joined";
pub const TRACKING_STATUS: &str = "tracking_status";
pub const TRACKING_LEFT: &str = "tracking_left";
pub const PROVIDER_LOCATION: &str = "provider_location";
pub const MESSAGE_FROM_CUSTOMER: &str = "message_from_customer";
pub const MESSAGE_FROM_PROVIDER: &str = "message_from_provider";
pub const MESSAGE_SENT: &str = "message_sent";
pub const ETA_UPDATED: &str = "eta_updated";
pub const SERVICE_STATUS_UPDATED: &str = "service_status_updated";
pub const EMERGENCY_ALERT: &str = "emergency_alert";
pub const DEMO_LOCATION_UPDATE: &str = "demo_location_update";
pub const ERROR: &str = "error";

/// Inbound events. One JSON frame per event:
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinTracking {
        booking_id: Uuid,
    },
    LeaveTracking {
        booking_id: Uuid,
    },
    ProviderLocationUpdate {
        booking_id: Uuid,
        location: Value,
    },
    CustomerMessage {
        booking_id: Uuid,
        message: String,
    },
    ProviderMessage {
        booking_id: Uuid,
        message: String,
    },
    EtaUpdate {
        booking_id: Uuid,
        eta: Value,
    },
    ServiceStatusUpdate {
        booking_id: Uuid,
        status: BookingStatus,
        #[serde(default)]
        message: Option<String>,
    },
    EmergencyAlert {
        booking_id: Uuid,
        message: String,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinTracking { .. } => "join_tracking",
            ClientEvent::LeaveTracking { .. } => "leave_tracking",
            ClientEvent::ProviderLocationUpdate { .. } => "provider_location_update",
            ClientEvent::CustomerMessage { .. } => "customer_message",
            ClientEvent::ProviderMessage { .. } => "provider_message",
            ClientEvent::EtaUpdate { .. } => "eta_update",
            ClientEvent::ServiceStatusUpdate { .. } => "service_status_update",
            ClientEvent::EmergencyAlert { .. } => "emergency_alert",
        }
    }
}

/// Serializes an outbound frame, stamping the payload with the server time.
pub fn frame(event: &str, mut data: Value) -> String {
    if let Some(payload) = data.as_object_mut() {
        payload.insert("timestamp".to_owned(), json!(timestamp()));
    }
    json!({ "event": event, "data": data }).to_string()
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frames_parse_by_event_name() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"join_tracking","data":{"booking_id":"00000000-0000-0000-0000-00000000002a"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::JoinTracking { booking_id } if booking_id == Uuid::from_u128(42)));

        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"service_status_update","data":{"booking_id":"00000000-0000-0000-0000-00000000002a","status":"in_progress"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::ServiceStatusUpdate {
                status, message, ..
            } => {
                assert_eq!(status, BookingStatus::InProgress);
                assert!(message.is_none());
            }
            other => panic!("parsed as {}", other.name()),
        }
    }

    #[test]
    fn unknown_events_and_statuses_fail_to_parse() {
        assert!(serde_json::from_str::<ClientEvent>(
            r#"{"event":"teleport","data":{"booking_id":"00000000-0000-0000-0000-00000000002a"}}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ClientEvent>(
            r#"{"event":"service_status_update","data":{"booking_id":"00000000-0000-0000-0000-00000000002a","status":"warp"}}"#
        )
        .is_err());
    }

    #[test]
    fn outbound_frames_carry_a_timestamp() {
        let raw = frame(TRACKING_LEFT, json!({ "booking_id": Uuid::from_u128(42) }));
        let value: Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["event"], TRACKING_LEFT);
        assert_eq!(
            value["data"]["booking_id"],
            Uuid::from_u128(42).to_string()
        );
        assert!(value["data"]["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    }
}
