// src/services/routing_service.rs
use async_trait::async_trait;
use serde_json::Value;

use crate::{
    errors::KestrelError as AppError,
    models::ride::{GeoPoint, RouteInfo, RouteStep},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Routing collaborator. A routing failure aborts ride creation: without a
/// distance there is no price.
#[async_trait]
pub trait Routing: Send + Sync {
    async fn distance_and_duration(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteEstimate, AppError>;

    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteInfo, AppError>;
}

/// Maps-API-backed implementation (distance-matrix + directions endpoints).
pub struct HttpRouting {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpRouting {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://maps.googleapis.com/maps/api".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    fn fmt_point(p: &GeoPoint) -> String {
        // Maps APIs want "lat,lng"
        format!("{},{}", p.latitude, p.longitude)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, AppError> {
        let response = self.client.get(url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(AppError::RoutingFailure(format!(
                "routing API returned {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        if body["status"] != "OK" {
            return Err(AppError::RoutingFailure(format!(
                "routing API status {}",
                body["status"]
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl Routing for HttpRouting {
    async fn distance_and_duration(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteEstimate, AppError> {
        let url = format!("{}/distancematrix/json", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("origins", Self::fmt_point(origin)),
                    ("destinations", Self::fmt_point(destination)),
                    ("units", "metric".to_string()),
                    ("mode", "driving".to_string()),
                    ("key", self.api_key.clone()),
                ],
            )
            .await?;

        let element = &body["rows"][0]["elements"][0];
        if element["status"] != "OK" {
            return Err(AppError::RoutingFailure(format!(
                "route not found: {}",
                element["status"]
            )));
        }

        Ok(RouteEstimate {
            distance_meters: element["distance"]["value"].as_f64().unwrap_or(0.0),
            duration_seconds: element["duration"]["value"].as_f64().unwrap_or(0.0),
        })
    }

    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteInfo, AppError> {
        let url = format!("{}/directions/json", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("origin", Self::fmt_point(origin)),
                    ("destination", Self::fmt_point(destination)),
                    ("mode", "driving".to_string()),
                    ("key", self.api_key.clone()),
                ],
            )
            .await?;

        let route = &body["routes"][0];
        let steps = route["legs"][0]["steps"]
            .as_array()
            .map(|steps| {
                steps
                    .iter()
                    .map(|step| RouteStep {
                        distance_meters: step["distance"]["value"].as_f64().unwrap_or(0.0),
                        duration_seconds: step["duration"]["value"].as_f64().unwrap_or(0.0),
                        instruction: step["html_instructions"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(RouteInfo {
            polyline: route["overview_polyline"]["points"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            steps,
        })
    }
}

/// Mock implementation for development and testing. Either returns a fixed
/// distance/duration pair or derives one from the haversine distance at an
/// assumed 30 km/h urban average.
pub struct MockRouting {
    fixed: Option<RouteEstimate>,
}

impl MockRouting {
    pub fn new() -> Self {
        Self { fixed: None }
    }

    pub fn fixed(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            fixed: Some(RouteEstimate {
                distance_meters,
                duration_seconds,
            }),
        }
    }
}

impl Default for MockRouting {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Routing for MockRouting {
    async fn distance_and_duration(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteEstimate, AppError> {
        if let Some(fixed) = self.fixed {
            return Ok(fixed);
        }
        let distance_meters = origin.distance_meters(destination);
        let duration_seconds = distance_meters / (30.0 / 3.6); // 30 km/h
        Ok(RouteEstimate {
            distance_meters,
            duration_seconds,
        })
    }

    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteInfo, AppError> {
        let estimate = self.distance_and_duration(origin, destination).await?;
        Ok(RouteInfo {
            polyline: "mock-polyline".to_string(),
            steps: vec![RouteStep {
                distance_meters: estimate.distance_meters,
                duration_seconds: estimate.duration_seconds,
                instruction: "Head to destination".to_string(),
            }],
        })
    }
}

/// Mock that always fails, for exercising the creation-abort path.
pub struct FailingRouting;

#[async_trait]
impl Routing for FailingRouting {
    async fn distance_and_duration(
        &self,
        _origin: &GeoPoint,
        _destination: &GeoPoint,
    ) -> Result<RouteEstimate, AppError> {
        Err(AppError::RoutingFailure("no route".to_string()))
    }

    async fn directions(
        &self,
        _origin: &GeoPoint,
        _destination: &GeoPoint,
    ) -> Result<RouteInfo, AppError> {
        Err(AppError::RoutingFailure("no route".to_string()))
    }
}
