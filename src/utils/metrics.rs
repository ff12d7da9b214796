use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Per-session request counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    /// When the session was created
    pub start_time: DateTime<Utc>,

    /// Total requests made
    pub total_requests: usize,

    /// Requests that produced a 2xx response
    pub successful_requests: usize,

    /// Requests that failed in transport or with a non-2xx status
    pub failed_requests: usize,

    /// Response bytes received
    pub bytes_received: usize,

    /// Request count per portal route
    pub calls_per_endpoint: BTreeMap<String, usize>,

    /// Cumulative duration per portal route in milliseconds
    pub duration_per_endpoint: BTreeMap<String, u64>,

    /// HTTP status code counts
    pub status_codes: HashMap<u16, usize>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            bytes_received: 0,
            calls_per_endpoint: BTreeMap::new(),
            duration_per_endpoint: BTreeMap::new(),
            status_codes: HashMap::new(),
        }
    }

    /// Record one request against a route
    pub fn record_request(&mut self, endpoint: &str, success: bool, duration_ms: u64, status_code: Option<u16>, bytes: usize) {
        self.total_requests += 1;

        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        self.bytes_received += bytes;
        *self.calls_per_endpoint.entry(endpoint.to_string()).or_default() += 1;
        *self.duration_per_endpoint.entry(endpoint.to_string()).or_default() += duration_ms;

        if let Some(code) = status_code {
            *self.status_codes.entry(code).or_default() += 1;
        }
    }

    /// Number of requests sent to a route
    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls_per_endpoint.get(endpoint).copied().unwrap_or(0)
    }

    /// One-line summary for log output
    pub fn summary(&self) -> String {
        let elapsed = (Utc::now() - self.start_time).num_seconds().max(0);
        let routes = self.calls_per_endpoint.iter()
            .map(|(route, count)| format!("{}={}", route, count))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{} request(s) in {}s ({} ok, {} failed, {} bytes) [{}]",
            self.total_requests, elapsed, self.successful_requests, self.failed_requests, self.bytes_received, routes
        )
    }
}

/// Request timer for measuring request durations
pub struct RequestTimer {
    /// Start time of the request
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// End timing and get the duration in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request() {
        let mut metrics = RequestMetrics::new();
        metrics.record_request("casestatus/fillDistrict", true, 12, Some(200), 100);
        metrics.record_request("casestatus/fillDistrict", true, 8, Some(200), 50);
        metrics.record_request("cause_list/submitCauseList", false, 30, Some(500), 0);

        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.successful_requests, 2);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.bytes_received, 150);
        assert_eq!(metrics.calls_to("casestatus/fillDistrict"), 2);
        assert_eq!(metrics.calls_to("cnr_status/searchByCNR/"), 0);
        assert_eq!(metrics.duration_per_endpoint["casestatus/fillDistrict"], 20);
        assert_eq!(metrics.status_codes[&500], 1);
        assert!(metrics.summary().starts_with("3 request(s)"));
    }

    #[test]
    fn test_metrics_serialize_with_start_time() {
        let mut metrics = RequestMetrics::new();
        metrics.record_request("cause_list/", true, 5, Some(200), 10);

        let value = serde_json::to_value(&metrics).unwrap();
        assert!(value["start_time"].is_string());
        assert_eq!(value["calls_per_endpoint"]["cause_list/"], 1);

        let back: RequestMetrics = serde_json::from_value(value).unwrap();
        assert_eq!(back.start_time, metrics.start_time);
        assert_eq!(back.bytes_received, 10);
    }
}
