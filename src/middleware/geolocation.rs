use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use maxminddb::geoip2;
use serde::Serialize;
use std::net::IpAddr;

/// Base GeoIP offline chargée une fois au démarrage (GEOIP_DB_PATH).
/// Si le fichier est absent, la géolocalisation se dégrade en "pays
/// inconnu" sans bloquer le serveur.
pub struct GeoDb(pub Option<maxminddb::Reader<Vec<u8>>>);

impl GeoDb {
    pub fn load() -> Self {
        let path = std::env::var("GEOIP_DB_PATH")
            .unwrap_or_else(|_| "GeoLite2-City.mmdb".to_string());

        match maxminddb::Reader::open_readfile(&path) {
            Ok(reader) => {
                println!("🌍 GeoIP database loaded from {}", path);
                GeoDb(Some(reader))
            }
            Err(e) => {
                eprintln!("⚠️  GeoIP database unavailable ({}): country detection disabled", e);
                GeoDb(None)
            }
        }
    }
}

/// Géolocalisation de la requête, attachée par extraction.
/// Toujours disponible: l'échec du lookup donne des champs None,
/// jamais une erreur HTTP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl GeoLocation {
    fn unknown() -> Self {
        GeoLocation {
            country_code: None,
            country: None,
            region: None,
            city: None,
        }
    }

    /// En développement local (loopback), on se place au Brésil
    fn local_default() -> Self {
        GeoLocation {
            country_code: Some("BR".to_string()),
            country: Some("Brazil".to_string()),
            region: None,
            city: None,
        }
    }
}

/// Détermine l'IP cliente avec la précédence: première entrée de
/// X-Forwarded-For, puis X-Real-IP, puis l'adresse du socket.
/// Le préfixe IPv6-mappé "::ffff:" est retiré avant lookup.
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer_addr: Option<&str>,
) -> Option<String> {
    let raw = match forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(ip) => ip,
        None => match real_ip.map(str::trim).filter(|s| !s.is_empty()) {
            Some(ip) => ip,
            None => peer_addr?,
        },
    };

    let ip = raw.strip_prefix("::ffff:").unwrap_or(raw);
    Some(ip.to_string())
}

fn lookup_request(req: &HttpRequest) -> GeoLocation {
    let forwarded_for = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok());
    let real_ip = req.headers().get("x-real-ip").and_then(|h| h.to_str().ok());
    let peer = req.peer_addr().map(|a| a.ip().to_string());

    let client_ip = match resolve_client_ip(forwarded_for, real_ip, peer.as_deref()) {
        Some(ip) => ip,
        None => return GeoLocation::local_default(),
    };

    if client_ip == "127.0.0.1" || client_ip == "::1" {
        return GeoLocation::local_default();
    }

    let reader = match req.app_data::<web::Data<GeoDb>>().and_then(|db| db.0.as_ref()) {
        Some(reader) => reader,
        None => return GeoLocation::unknown(),
    };

    let addr: IpAddr = match client_ip.parse() {
        Ok(addr) => addr,
        Err(_) => return GeoLocation::unknown(),
    };

    // La géolocalisation est consultative: tout échec donne "inconnu"
    match reader.lookup::<geoip2::City>(addr) {
        Ok(record) => GeoLocation {
            country_code: record
                .country
                .as_ref()
                .and_then(|c| c.iso_code)
                .map(|s| s.to_string()),
            country: record
                .country
                .as_ref()
                .and_then(|c| c.names.as_ref())
                .and_then(|names| names.get("en"))
                .map(|s| s.to_string()),
            region: record
                .subdivisions
                .as_ref()
                .and_then(|subs| subs.first())
                .and_then(|sub| sub.iso_code)
                .map(|s| s.to_string()),
            city: record
                .city
                .as_ref()
                .and_then(|c| c.names.as_ref())
                .and_then(|names| names.get("en"))
                .map(|s| s.to_string()),
        },
        Err(_) => GeoLocation::unknown(),
    }
}

impl FromRequest for GeoLocation {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(lookup_request(req)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_takes_precedence() {
        let ip = resolve_client_ip(
            Some("203.0.113.9, 10.0.0.1"),
            Some("198.51.100.2"),
            Some("192.0.2.1"),
        );
        assert_eq!(ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_real_ip_fallback() {
        let ip = resolve_client_ip(None, Some("198.51.100.2"), Some("192.0.2.1"));
        assert_eq!(ip.as_deref(), Some("198.51.100.2"));
    }

    #[test]
    fn test_peer_addr_fallback() {
        let ip = resolve_client_ip(None, None, Some("192.0.2.1"));
        assert_eq!(ip.as_deref(), Some("192.0.2.1"));
    }

    #[test]
    fn test_empty_forwarded_for_is_skipped() {
        let ip = resolve_client_ip(Some("  "), None, Some("192.0.2.1"));
        assert_eq!(ip.as_deref(), Some("192.0.2.1"));
    }

    #[test]
    fn test_ipv6_mapped_prefix_is_stripped() {
        let ip = resolve_client_ip(Some("::ffff:203.0.113.9"), None, None);
        assert_eq!(ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_no_ip_at_all() {
        assert_eq!(resolve_client_ip(None, None, None), None);
    }
}
