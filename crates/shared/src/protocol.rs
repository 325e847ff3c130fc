use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    LocationId, OrderId, OrderItem, OrderStatus, OrganizationId, Trip, TripId, User,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    pub fn pending() -> Self {
        Self {
            status: Some(OrderStatus::Pending),
        }
    }
}

/// Body of `POST /orders` and `PUT /orders/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<OrganizationId>,
    pub pickup_location_id: LocationId,
    pub delivery_location_id: LocationId,
    pub weight: f64,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeTripsRequest {
    pub order_ids: Vec<OrderId>,
}

/// An empty `proposed_trips` array means no feasible grouping exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeTripsResponse {
    #[serde(default)]
    pub proposed_trips: Vec<Trip>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmTripsRequest {
    pub confirmed_trip_ids: Vec<TripId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmTripsResponse {
    #[serde(default)]
    pub trips: Vec<Trip>,
}

/// Decodes a list endpoint body that is either a bare JSON array or an
/// object carrying the array under `key` (`{"orders": [...]}`).
pub fn decode_list<T: DeserializeOwned>(body: Value, key: &str) -> Result<Vec<T>, serde_json::Error> {
    match body {
        Value::Array(_) => serde_json::from_value(body),
        Value::Object(mut map) => match map.remove(key) {
            Some(items) => serde_json::from_value(items),
            None => Err(serde::de::Error::custom(format!(
                "expected an array or an object with a `{key}` field"
            ))),
        },
        other => Err(serde::de::Error::custom(format!(
            "expected an array or an object with a `{key}` field, got {other}"
        ))),
    }
}
