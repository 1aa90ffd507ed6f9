use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, Booking, Role};
use crate::error::TrackingError;

use super::events::{self, ClientEvent};
use super::hub::{ConnectionHandle, Hub, RoomId};

/// Relationship an operation requires between the acting identity and the
/// referenced booking.
#[derive(Debug, Clone, Copy)]
enum Relationship {
    Customer,
    Provider,
    /// Customer or provider of the booking.
    Party,
    /// Party, or an admin monitoring the booking.
    PartyOrAdmin,
}

/// Runs one inbound event to completion. Failures are logged and surfaced to
/// the sender as an `error` frame; they never reach the room and never tear
/// down the connection.
pub async fn dispatch(db_pool: &SqlitePool, hub: &Hub, conn: &ConnectionHandle, event: ClientEvent) {
    let name = event.name();
    if let Err(err) = handle_event(db_pool, hub, conn, event).await {
        warn!(conn_id = %conn.id, event = name, error = %err, "event rejected");
        conn.send(&events::frame(
            events::ERROR,
            json!({ "message": err.client_message() }),
        ));
    }
}

async fn handle_event(
    db_pool: &SqlitePool,
    hub: &Hub,
    conn: &ConnectionHandle,
    event: ClientEvent,
) -> Result<(), TrackingError> {
    match event {
        ClientEvent::JoinTracking { booking_id } => {
            let booking = authorize(db_pool, conn, booking_id, Relationship::PartyOrAdmin).await?;
            let room = RoomId::Booking(booking_id);
            hub.join(room, conn.id).await;
            conn.send(&events::frame(
                events::TRACKING_JOINED,
                json!({ "booking_id": booking_id, "room": room.to_string() }),
            ));
            conn.send(&events::frame(
                events::TRACKING_STATUS,
                json!({ "booking_id": booking_id, "status": booking.status }),
            ));
        }
        ClientEvent::LeaveTracking { booking_id } => {
            hub.leave(RoomId::Booking(booking_id), conn.id).await;
            conn.send(&events::frame(
                events::TRACKING_LEFT,
                json!({ "booking_id": booking_id }),
            ));
        }
        ClientEvent::ProviderLocationUpdate {
            booking_id,
            location,
        } => {
            authorize(db_pool, conn, booking_id, Relationship::Provider).await?;
            hub.broadcast(
                RoomId::Booking(booking_id),
                &events::frame(
                    events::PROVIDER_LOCATION,
                    json!({ "booking_id": booking_id, "location": location }),
                ),
                Some(conn.id),
            )
            .await;
        }
        ClientEvent::CustomerMessage {
            booking_id,
            message,
        } => {
            authorize(db_pool, conn, booking_id, Relationship::Customer).await?;
            relay_message(hub, conn, booking_id, events::MESSAGE_FROM_CUSTOMER, message).await;
        }
        ClientEvent::ProviderMessage {
            booking_id,
            message,
        } => {
            authorize(db_pool, conn, booking_id, Relationship::Provider).await?;
            relay_message(hub, conn, booking_id, events::MESSAGE_FROM_PROVIDER, message).await;
        }
        ClientEvent::EtaUpdate { booking_id, eta } => {
            authorize(db_pool, conn, booking_id, Relationship::Provider).await?;
            hub.broadcast(
                RoomId::Booking(booking_id),
                &events::frame(
                    events::ETA_UPDATED,
                    json!({ "booking_id": booking_id, "eta": eta }),
                ),
                Some(conn.id),
            )
            .await;
        }
        ClientEvent::ServiceStatusUpdate {
            booking_id,
            status,
            message,
        } => {
            authorize(db_pool, conn, booking_id, Relationship::Provider).await?;
            db::update_booking_status(db_pool, booking_id, status).await?;
            info!(conn_id = %conn.id, %booking_id, status = status.as_str(), "booking status updated");
            // The write stands even if the fan-out reaches nobody.
            hub.broadcast(
                RoomId::Booking(booking_id),
                &events::frame(
                    events::SERVICE_STATUS_UPDATED,
                    json!({ "booking_id": booking_id, "status": status, "message": message }),
                ),
                Some(conn.id),
            )
            .await;
        }
        ClientEvent::EmergencyAlert {
            booking_id,
            message,
        } => {
            authorize(db_pool, conn, booking_id, Relationship::Party).await?;
            let alert = events::frame(
                events::EMERGENCY_ALERT,
                json!({
                    "booking_id": booking_id,
                    "message": message,
                    "from": { "name": conn.identity.name, "role": conn.identity.role },
                }),
            );
            hub.broadcast(RoomId::Booking(booking_id), &alert, None).await;
            hub.broadcast(RoomId::Admin, &alert, None).await;
        }
    }
    Ok(())
}

async fn relay_message(
    hub: &Hub,
    conn: &ConnectionHandle,
    booking_id: Uuid,
    event: &str,
    message: String,
) {
    hub.broadcast(
        RoomId::Booking(booking_id),
        &events::frame(
            event,
            json!({
                "booking_id": booking_id,
                "message": message,
                "from": { "name": conn.identity.name, "role": conn.identity.role },
            }),
        ),
        Some(conn.id),
    )
    .await;
    conn.send(&events::frame(
        events::MESSAGE_SENT,
        json!({ "booking_id": booking_id }),
    ));
}

/// Fetches the booking and re-checks the relationship. Runs on every join and
/// every booking-scoped event; never cached across events. A missing booking
/// is reported exactly like a failed check.
async fn authorize(
    db_pool: &SqlitePool,
    conn: &ConnectionHandle,
    booking_id: Uuid,
    required: Relationship,
) -> Result<Booking, TrackingError> {
    let booking = db::fetch_booking(db_pool, booking_id)
        .await?
        .ok_or(TrackingError::NotFound)?;

    let party = db::party_roles(&conn.identity, &booking);
    let allowed = match required {
        Relationship::Customer => party.is_customer,
        Relationship::Provider => party.is_provider,
        Relationship::Party => party.is_customer || party.is_provider,
        Relationship::PartyOrAdmin => {
            party.is_customer || party.is_provider || conn.identity.role == Role::Admin
        }
    };

    if allowed {
        Ok(booking)
    } else {
        Err(TrackingError::Authorization)
    }
}
