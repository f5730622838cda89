//! Per-IP request throttling.
//!
//! Each client IP gets a continuously refilling allowance; a request spends
//! one unit. Stale entries are swept by a periodic task in `main`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
struct Allowance {
    remaining: f64,
    touched: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    clients: Arc<Mutex<HashMap<IpAddr, Allowance>>>,
    refill_per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(refill_per_sec: f64, burst: f64) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            refill_per_sec,
            burst,
        }
    }

    /// Spend one unit of the client's allowance. Returns `false` when the
    /// allowance is exhausted.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();

        let entry = clients.entry(ip).or_insert(Allowance {
            remaining: self.burst,
            touched: now,
        });

        let idle = now.duration_since(entry.touched).as_secs_f64();
        entry.remaining = (entry.remaining + idle * self.refill_per_sec).min(self.burst);
        entry.touched = now;

        if entry.remaining >= 1.0 {
            entry.remaining -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop entries that have been idle longer than `max_idle_secs`.
    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        clients.retain(|_, entry| now.duration_since(entry.touched).as_secs_f64() < max_idle_secs);
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }
}

impl Default for RateLimiter {
    // 10 req/s sustained, burst of 30.
    fn default() -> Self {
        Self::new(10.0, 30.0)
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ip) = client_ip(&req) {
        if !limiter.allow(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Prefer the socket peer address; fall back to X-Forwarded-For when the
/// server sits behind a reverse proxy.
fn client_ip(req: &Request) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(addr.ip());
    }

    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_is_honored_then_cut_off() {
        let limiter = RateLimiter::new(10.0, 3.0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.allow(ip).await);
        }
        assert!(!limiter.allow(ip).await);
    }

    #[tokio::test]
    async fn clients_are_throttled_independently() {
        let limiter = RateLimiter::new(10.0, 1.0);
        let first: IpAddr = "10.0.0.1".parse().unwrap();
        let second: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.allow(first).await);
        assert!(!limiter.allow(first).await);
        assert!(limiter.allow(second).await);
    }

    #[tokio::test]
    async fn purge_drops_idle_entries() {
        let limiter = RateLimiter::new(10.0, 5.0);
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.allow(ip).await);

        limiter.purge_stale(0.0).await;
        assert_eq!(limiter.tracked_clients().await, 0);
    }
}
