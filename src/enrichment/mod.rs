//! Enrichment Store: hot-swappable geo/ASN lookup tables loaded from
//! MMDB-style files. Swapped atomically via `arc-swap` so readers never
//! observe a torn state — an MMDB swap during active processing never
//! yields an event carrying fields from two different databases.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use maxminddb::geoip2;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GeoFields {
    pub geo_city: Option<String>,
    pub geo_country: Option<String>,
    pub geo_lat: Option<f64>,
    pub geo_lon: Option<f64>,
    pub geo_timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AsnFields {
    pub asn_number: Option<i64>,
    pub asn_org: Option<String>,
}

struct LoadedDb {
    reader: maxminddb::Reader<Vec<u8>>,
    path: PathBuf,
    size: u64,
    loaded_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbStatus {
    pub loaded: bool,
    pub path: Option<String>,
    pub size: Option<u64>,
    pub mtime: Option<chrono::DateTime<chrono::Utc>>,
}

/// Holds the current geo and ASN databases behind independent atomic
/// pointers, so swapping one never disturbs readers mid-lookup on the
/// other.
pub struct EnrichmentStore {
    geo: ArcSwap<Option<LoadedDb>>,
    asn: ArcSwap<Option<LoadedDb>>,
}

impl EnrichmentStore {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            geo: ArcSwap::from_pointee(None),
            asn: ArcSwap::from_pointee(None),
        })
    }

    pub fn load_geo(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path)?;
        let size = bytes.len() as u64;
        let reader = maxminddb::Reader::from_source(bytes)?;
        self.geo.store(Arc::new(Some(LoadedDb {
            reader,
            path,
            size,
            loaded_at: chrono::Utc::now(),
        })));
        Ok(())
    }

    pub fn load_asn(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path)?;
        let size = bytes.len() as u64;
        let reader = maxminddb::Reader::from_source(bytes)?;
        self.asn.store(Arc::new(Some(LoadedDb {
            reader,
            path,
            size,
            loaded_at: chrono::Utc::now(),
        })));
        Ok(())
    }

    pub fn geo_status(&self) -> DbStatus {
        status_of(&self.geo)
    }

    pub fn asn_status(&self) -> DbStatus {
        status_of(&self.asn)
    }

    /// A missing database is a no-op, not an error.
    pub fn lookup_geo(&self, ip: IpAddr) -> Option<GeoFields> {
        let snapshot = self.geo.load();
        let db = snapshot.as_ref().as_ref()?;
        let city: geoip2::City = db.reader.lookup(ip).ok()??;
        Some(GeoFields {
            geo_city: city
                .city
                .as_ref()
                .and_then(|c| c.names.as_ref())
                .and_then(|n| n.get("en"))
                .map(|s| s.to_string()),
            geo_country: city
                .country
                .as_ref()
                .and_then(|c| c.iso_code)
                .map(|s| s.to_string()),
            geo_lat: city.location.as_ref().and_then(|l| l.latitude),
            geo_lon: city.location.as_ref().and_then(|l| l.longitude),
            geo_timezone: city
                .location
                .as_ref()
                .and_then(|l| l.time_zone)
                .map(|s| s.to_string()),
        })
    }

    pub fn lookup_asn(&self, ip: IpAddr) -> Option<AsnFields> {
        let snapshot = self.asn.load();
        let db = snapshot.as_ref().as_ref()?;
        let asn: geoip2::Asn = db.reader.lookup(ip).ok()??;
        Some(AsnFields {
            asn_number: asn.autonomous_system_number.map(|n| n as i64),
            asn_org: asn.autonomous_system_organization.map(|s| s.to_string()),
        })
    }
}

fn status_of(slot: &ArcSwap<Option<LoadedDb>>) -> DbStatus {
    let snapshot = slot.load();
    match snapshot.as_ref() {
        Some(db) => DbStatus {
            loaded: true,
            path: Some(db.path.display().to_string()),
            size: Some(db.size),
            mtime: Some(db.loaded_at),
        },
        None => DbStatus {
            loaded: false,
            path: None,
            size: None,
            mtime: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_misses_are_not_errors() {
        let store = EnrichmentStore::empty();
        assert!(store.lookup_geo("8.8.8.8".parse().unwrap()).is_none());
        assert!(store.lookup_asn("8.8.8.8".parse().unwrap()).is_none());
        assert!(!store.geo_status().loaded);
    }
}
