//! IP geolocation using the MaxMind GeoLite2 database
//!
//! The engine consumes geolocation through the [`GeoResolver`] trait so the
//! backing lookup stays pluggable. The bundled implementation reads the
//! MaxMind GeoLite2-City database, which callers must download separately
//! (free with registration). Lookups are local file reads, so they replace
//! the per-login HTTP geolocation round trip entirely.

use maxminddb::{geoip2, Reader};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::GeoInfo;

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to open database: {0}")]
    DatabaseOpen(#[from] maxminddb::MaxMindDBError),

    #[error("IP address not found in database")]
    NotFound,

    #[error("Location data missing for IP address")]
    NoLocation,

    #[error("Database file not found: {0}")]
    FileNotFound(String),
}

/// Maps an IP address to geographic attributes.
///
/// Implementations must degrade to `None` on any failure; an unavailable
/// resolver skips geographic detection for the event, it never fails the
/// recording pipeline.
pub trait GeoResolver: Send + Sync {
    fn resolve(&self, ip: &IpAddr) -> Option<GeoInfo>;
}

/// GeoIP resolver backed by a MaxMind GeoLite2-City database
///
/// # Example
///
/// ```ignore
/// use heimdall::geolocation::{GeoResolver, MaxMindResolver};
/// use std::net::IpAddr;
/// use std::str::FromStr;
///
/// let resolver = MaxMindResolver::new("GeoLite2-City.mmdb")?;
/// let ip = IpAddr::from_str("8.8.8.8").unwrap();
/// if let Some(geo) = resolver.resolve(&ip) {
///     println!("Location: {}", geo.display_location());
/// }
/// ```
pub struct MaxMindResolver {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindResolver {
    /// Open a resolver from a GeoLite2-City.mmdb file
    ///
    /// # Errors
    ///
    /// Returns an error if the database file is missing or invalid.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(MaxMindResolver {
            reader: Arc::new(reader),
        })
    }

    /// Look up the geographic attributes of an IP address
    pub fn lookup(&self, ip: &IpAddr) -> Result<GeoInfo, GeoError> {
        let city: geoip2::City = self.reader.lookup(*ip).map_err(|e| match e {
            maxminddb::MaxMindDBError::AddressNotFoundError(_) => GeoError::NotFound,
            other => GeoError::DatabaseOpen(other),
        })?;

        let location = city.location.as_ref().ok_or(GeoError::NoLocation)?;
        let latitude = location.latitude.ok_or(GeoError::NoLocation)?;
        let longitude = location.longitude.ok_or(GeoError::NoLocation)?;

        let country = city
            .country
            .and_then(|c| c.names)
            .and_then(|n| n.get("en").copied())
            .map(String::from)
            .unwrap_or_default();

        let region = city
            .subdivisions
            .and_then(|subs| subs.into_iter().next())
            .and_then(|s| s.names)
            .and_then(|n| n.get("en").copied())
            .map(String::from)
            .unwrap_or_default();

        let city_name = city
            .city
            .and_then(|c| c.names)
            .and_then(|n| n.get("en").copied())
            .map(String::from)
            .unwrap_or_default();

        Ok(GeoInfo {
            country,
            region,
            city: city_name,
            latitude,
            longitude,
            // The City database carries no ISP data; that requires the
            // separate MaxMind ISP database.
            isp: String::new(),
        })
    }
}

impl GeoResolver for MaxMindResolver {
    fn resolve(&self, ip: &IpAddr) -> Option<GeoInfo> {
        self.lookup(ip).ok()
    }
}

impl Clone for MaxMindResolver {
    fn clone(&self) -> Self {
        MaxMindResolver {
            reader: Arc::clone(&self.reader),
        }
    }
}

/// Fixed in-memory resolver, useful for tests and air-gapped deployments
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<IpAddr, GeoInfo>,
}

impl StaticResolver {
    pub fn new() -> Self {
        StaticResolver {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, ip: IpAddr, info: GeoInfo) {
        self.entries.insert(ip, info);
    }
}

impl GeoResolver for StaticResolver {
    fn resolve(&self, ip: &IpAddr) -> Option<GeoInfo> {
        self.entries.get(ip).cloned()
    }
}
