use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::TrackingError;

pub const SCHEMA: &str = include_str!("../schema.sql");

/// Idempotent table bootstrap, used at boot and by the test fixtures.
pub async fn init_schema(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Provider => "provider",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "customer" => Ok(Role::Customer),
            "provider" => Ok(Role::Provider),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// Authenticated principal, resolved once per connection. Owned by the auth
/// collaborator's tables; read-only here.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uuid: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Assigned => "assigned",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rescheduled => "rescheduled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "assigned" => Ok(BookingStatus::Assigned),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "rescheduled" => Ok(BookingStatus::Rescheduled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Booking {
    pub uuid: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct PartyRoles {
    pub is_customer: bool,
    pub is_provider: bool,
}

/// Relationship of an identity to a booking, computed over both reference
/// fields instead of picking one by the caller's role string.
pub fn party_roles(identity: &Identity, booking: &Booking) -> PartyRoles {
    PartyRoles {
        is_customer: booking.customer_id == identity.uuid,
        is_provider: booking.provider_id == Some(identity.uuid),
    }
}

pub async fn fetch_identity(
    db_pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Option<Identity>, TrackingError> {
    let Some((uuid, name, role)): Option<(String, String, String)> =
        sqlx::query_as("SELECT uuid,name,role FROM users WHERE uuid=? AND is_active=1")
            .bind(user_id.to_string())
            .fetch_optional(db_pool)
            .await?
    else {
        return Ok(None);
    };

    let role = Role::from_str(&role)
        .map_err(|_| TrackingError::Authentication(format!("unknown role {role:?}")))?;

    Ok(Some(Identity {
        uuid: Uuid::parse_str(&uuid).map_err(|_| TrackingError::Internal("malformed user id"))?,
        name,
        role,
    }))
}

pub async fn fetch_booking(
    db_pool: &SqlitePool,
    booking_id: Uuid,
) -> Result<Option<Booking>, TrackingError> {
    let Some((customer_id, provider_id, status)): Option<(String, Option<String>, String)> =
        sqlx::query_as("SELECT customer_id,provider_id,status FROM bookings WHERE uuid=?")
            .bind(booking_id.to_string())
            .fetch_optional(db_pool)
            .await?
    else {
        return Ok(None);
    };

    Ok(Some(Booking {
        uuid: booking_id,
        customer_id: Uuid::parse_str(&customer_id)
            .map_err(|_| TrackingError::Internal("malformed customer id"))?,
        provider_id: match provider_id {
            Some(id) => Some(
                Uuid::parse_str(&id)
                    .map_err(|_| TrackingError::Internal("malformed provider id"))?,
            ),
            None => None,
        },
        status: BookingStatus::from_str(&status)
            .map_err(|_| TrackingError::Internal("unrecognized booking status"))?,
    }))
}

/// Writes only the status field; the store stamps `updated_at`.
pub async fn update_booking_status(
    db_pool: &SqlitePool,
    booking_id: Uuid,
    status: BookingStatus,
) -> Result<(), TrackingError> {
    let result = sqlx::query("UPDATE bookings SET status=?, updated_at=datetime('now') WHERE uuid=?")
        .bind(status.as_str())
        .bind(booking_id.to_string())
        .execute(db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(TrackingError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqlitePool {
        let db_pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_schema(&db_pool).await.unwrap();
        db_pool
    }

    async fn seed_booking(db_pool: &SqlitePool, booking: &Booking) {
        sqlx::query("INSERT INTO bookings (uuid,customer_id,provider_id,status) VALUES (?,?,?,?)")
            .bind(booking.uuid.to_string())
            .bind(booking.customer_id.to_string())
            .bind(booking.provider_id.as_ref().map(Uuid::to_string))
            .bind(booking.status.as_str())
            .execute(db_pool)
            .await
            .unwrap();
    }

    fn walker() -> Identity {
        Identity {
            uuid: Uuid::from_u128(2),
            name: "Pat".to_owned(),
            role: Role::Provider,
        }
    }

    #[tokio::test]
    async fn booking_round_trips_through_the_store() {
        let db_pool = setup().await;
        let booking = Booking {
            uuid: Uuid::from_u128(42),
            customer_id: Uuid::from_u128(1),
            provider_id: Some(Uuid::from_u128(2)),
            status: BookingStatus::Assigned,
        };
        seed_booking(&db_pool, &booking).await;

        let loaded = fetch_booking(&db_pool, booking.uuid).await.unwrap().unwrap();
        assert_eq!(loaded.customer_id, booking.customer_id);
        assert_eq!(loaded.provider_id, booking.provider_id);
        assert_eq!(loaded.status, BookingStatus::Assigned);

        assert!(fetch_booking(&db_pool, Uuid::from_u128(999))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn status_update_writes_through() {
        let db_pool = setup().await;
        let booking = Booking {
            uuid: Uuid::from_u128(42),
            customer_id: Uuid::from_u128(1),
            provider_id: Some(Uuid::from_u128(2)),
            status: BookingStatus::Assigned,
        };
        seed_booking(&db_pool, &booking).await;

        update_booking_status(&db_pool, booking.uuid, BookingStatus::InProgress)
            .await
            .unwrap();
        let loaded = fetch_booking(&db_pool, booking.uuid).await.unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::InProgress);

        let missing = update_booking_status(&db_pool, Uuid::from_u128(999), BookingStatus::Completed).await;
        assert!(matches!(missing, Err(TrackingError::NotFound)));
    }

    #[tokio::test]
    async fn inactive_and_unknown_role_users_do_not_resolve() {
        let db_pool = setup().await;
        sqlx::query("INSERT INTO users (uuid,name,role,is_active) VALUES (?,?,?,?)")
            .bind(Uuid::from_u128(7).to_string())
            .bind("Ghost")
            .bind("customer")
            .bind(0)
            .execute(&db_pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO users (uuid,name,role,is_active) VALUES (?,?,?,?)")
            .bind(Uuid::from_u128(8).to_string())
            .bind("Odd")
            .bind("superuser")
            .bind(1)
            .execute(&db_pool)
            .await
            .unwrap();

        assert!(fetch_identity(&db_pool, Uuid::from_u128(7))
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            fetch_identity(&db_pool, Uuid::from_u128(8)).await,
            Err(TrackingError::Authentication(_))
        ));
    }

    #[test]
    fn party_roles_checks_both_references() {
        let booking = Booking {
            uuid: Uuid::from_u128(42),
            customer_id: Uuid::from_u128(1),
            provider_id: Some(Uuid::from_u128(2)),
            status: BookingStatus::Pending,
        };

        let party = party_roles(&walker(), &booking);
        assert!(!party.is_customer);
        assert!(party.is_provider);

        let unassigned = Booking {
            provider_id: None,
            ..booking
        };
        assert!(!party_roles(&walker(), &unassigned).is_provider);
    }
}
