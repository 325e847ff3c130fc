use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{Location, Order, OrderId, Organization, Product, Trip, TripId, User, Vehicle},
    error::ApiError,
    protocol::{
        decode_list, ConfirmTripsRequest, ConfirmTripsResponse, LoginRequest, LoginResponse,
        OrderDraft, OrderQuery, ProposeTripsRequest, ProposeTripsResponse,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::{error::ClientError, DispatchBackend};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reference data used to label orders in the dispatch grid.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub locations: Vec<Location>,
    pub organizations: Vec<Organization>,
}

impl Directory {
    pub fn location_name(&self, id: shared::domain::LocationId) -> Option<&str> {
        self.locations
            .iter()
            .find(|location| location.id == id)
            .map(|location| location.name.as_str())
    }

    pub fn organization_name(&self, id: shared::domain::OrganizationId) -> Option<&str> {
        self.organizations
            .iter()
            .find(|organization| organization.id == id)
            .map(|organization| organization.name.as_str())
    }
}

/// Authenticated HTTP client for the logistics backend.
pub struct RestClient {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl RestClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            ..self
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ApiError::from_response(status.as_u16(), &body);
        warn!(status = status.as_u16(), message = %error.message, "rest: request failed");
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(error.message));
        }
        Err(ClientError::Server {
            status: status.as_u16(),
            error,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path)?;
        debug!(%url, "rest: GET");
        Ok(self.send(self.http.get(url)).await?.json().await?)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
    ) -> Result<Vec<T>, ClientError> {
        let body: Value = self.get_json(path).await?;
        Ok(decode_list(body, key)?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let url = self.endpoint("auth/login")?;
        let response: LoginResponse = self
            .send(self.http.post(url).json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            }))
            .await?
            .json()
            .await?;

        self.set_token(Some(response.access_token.clone())).await;
        info!(username, "rest: signed in");
        Ok(response)
    }

    pub async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, ClientError> {
        let url = self.endpoint("orders")?;
        let body: Value = self
            .send(self.http.get(url).query(query))
            .await?
            .json()
            .await?;
        Ok(decode_list(body, "orders")?)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, ClientError> {
        self.get_json(&format!("orders/{}", order_id.0)).await
    }

    pub async fn create_order(&self, draft: &OrderDraft) -> Result<Order, ClientError> {
        let url = self.endpoint("orders")?;
        let order: Order = self
            .send(self.http.post(url).json(draft))
            .await?
            .json()
            .await?;
        info!(order_id = order.id.0, "rest: order created");
        Ok(order)
    }

    pub async fn update_order(
        &self,
        order_id: OrderId,
        draft: &OrderDraft,
    ) -> Result<Order, ClientError> {
        let url = self.endpoint(&format!("orders/{}", order_id.0))?;
        Ok(self
            .send(self.http.put(url).json(draft))
            .await?
            .json()
            .await?)
    }

    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("orders/{}", order_id.0))?;
        self.send(self.http.delete(url)).await?;
        info!(order_id = order_id.0, "rest: order deleted");
        Ok(())
    }

    pub async fn propose(&self, order_ids: &[OrderId]) -> Result<Vec<Trip>, ClientError> {
        let url = self.endpoint("trips/propose")?;
        let response: ProposeTripsResponse = self
            .send(self.http.post(url).json(&ProposeTripsRequest {
                order_ids: order_ids.to_vec(),
            }))
            .await?
            .json()
            .await?;
        Ok(response.proposed_trips)
    }

    pub async fn confirm(&self, trip_ids: &[TripId]) -> Result<Vec<Trip>, ClientError> {
        let url = self.endpoint("trips/confirm")?;
        let response: ConfirmTripsResponse = self
            .send(self.http.post(url).json(&ConfirmTripsRequest {
                confirmed_trip_ids: trip_ids.to_vec(),
            }))
            .await?
            .json()
            .await?;
        Ok(response.trips)
    }

    pub async fn list_trips(&self) -> Result<Vec<Trip>, ClientError> {
        self.get_list("trips", "trips").await
    }

    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle>, ClientError> {
        self.get_list("vehicles", "vehicles").await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        self.get_list("products", "products").await
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>, ClientError> {
        self.get_list("locations", "locations").await
    }

    pub async fn list_organizations(&self) -> Result<Vec<Organization>, ClientError> {
        self.get_list("organizations", "organizations").await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        self.get_list("users", "users").await
    }

    /// Fetches the grid's label collections concurrently.
    pub async fn load_directory(&self) -> Result<Directory, ClientError> {
        let (locations, organizations) =
            futures::try_join!(self.list_locations(), self.list_organizations())?;
        Ok(Directory {
            locations,
            organizations,
        })
    }
}

#[async_trait]
impl DispatchBackend for RestClient {
    async fn pending_orders(&self) -> Result<Vec<Order>, ClientError> {
        let mut orders = self.list_orders(&OrderQuery::pending()).await?;
        orders.retain(Order::is_pending);
        Ok(orders)
    }

    async fn propose_trips(&self, order_ids: &[OrderId]) -> Result<Vec<Trip>, ClientError> {
        self.propose(order_ids).await
    }

    async fn confirm_trips(&self, trip_ids: &[TripId]) -> Result<Vec<Trip>, ClientError> {
        self.confirm(trip_ids).await
    }
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
