//! Course-selection server configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `/etc/cca/config.toml`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types (deserialized from TOML)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub url: String,
    pub prod: bool,
    pub listen: ListenConfig,
    pub db: DbConfig,
    pub auth: AuthConfig,
    pub perf: PerfConfig,
    pub req: ReqConfig,
}

#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub proto: String,
    pub net: String,
    pub addr: String,
    pub trans: String,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub conn: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client: String,
    pub authorize: String,
    pub jwks: String,
    pub token: String,
    pub expr: u64,
    pub depts: HashMap<String, String>,
    pub udepts: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PerfConfig {
    pub sendq: usize,
    pub msg_args_cap: usize,
    pub msg_bytes_cap: usize,
    pub read_header_timeout_ms: u64,
    pub usem_delay_shift_bits: u32,
    pub propagate_immediate: bool,
}

#[derive(Debug, Clone)]
pub struct YearGroupRequirement {
    pub sport: u32,
    pub non_sport: u32,
}

#[derive(Debug, Clone)]
pub struct ReqConfig {
    pub y9: YearGroupRequirement,
    pub y10: YearGroupRequirement,
    pub y11: YearGroupRequirement,
    pub y12: YearGroupRequirement,
}

impl ReqConfig {
    pub fn for_year_group(&self, yg: cca_protocol::YearGroup) -> Option<&YearGroupRequirement> {
        use cca_protocol::YearGroup;
        match yg {
            YearGroup::Y9 => Some(&self.y9),
            YearGroup::Y10 => Some(&self.y10),
            YearGroup::Y11 => Some(&self.y11),
            YearGroup::Y12 => Some(&self.y12),
            YearGroup::Staff => None,
        }
    }

    /// §4.7 YC: `requiredMinimum(yearGroup, type)`, grounded on
    /// `original_source/course_types_groups.go::getCourseTypeMinimumForYearGroup`.
    pub fn minimum_for(&self, yg: cca_protocol::YearGroup, ctype: cca_protocol::CourseType) -> u32 {
        use cca_protocol::CourseType;
        self.for_year_group(yg).map_or(0, |req| match ctype {
            CourseType::Sport => req.sport,
            CourseType::NonSport => req.non_sport,
        })
    }
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types (with Option for optional fields)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    url: Option<String>,
    prod: Option<bool>,
    listen: Option<RawListenConfig>,
    db: Option<RawDbConfig>,
    auth: Option<RawAuthConfig>,
    perf: Option<RawPerfConfig>,
    req: Option<RawReqConfig>,
}

#[derive(Debug, Deserialize)]
struct RawListenConfig {
    proto: Option<String>,
    net: Option<String>,
    addr: Option<String>,
    trans: Option<String>,
    tls: Option<RawTlsConfig>,
}

#[derive(Debug, Deserialize)]
struct RawTlsConfig {
    cert: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDbConfig {
    #[serde(rename = "type")]
    db_type: Option<String>,
    conn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAuthConfig {
    client: Option<String>,
    authorize: Option<String>,
    jwks: Option<String>,
    token: Option<String>,
    expr: Option<u64>,
    depts: Option<HashMap<String, String>>,
    udepts: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RawPerfConfig {
    sendq: Option<usize>,
    msg_args_cap: Option<usize>,
    msg_bytes_cap: Option<usize>,
    read_header_timeout: Option<u64>,
    usem_delay_shift_bits: Option<u32>,
    propagate_immediate: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawReqConfig {
    #[serde(rename = "Y9")]
    y9: Option<RawYearGroupRequirement>,
    #[serde(rename = "Y10")]
    y10: Option<RawYearGroupRequirement>,
    #[serde(rename = "Y11")]
    y11: Option<RawYearGroupRequirement>,
    #[serde(rename = "Y12")]
    y12: Option<RawYearGroupRequirement>,
}

#[derive(Debug, Deserialize)]
struct RawYearGroupRequirement {
    sport: Option<u32>,
    non_sport: Option<u32>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load_config_from_path(path: &Path) -> Result<ServerConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<ServerConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/cca/config.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<ServerConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let url = raw.url.ok_or_else(|| ConfigError::MissingField("url".to_owned()))?;
    let prod = raw.prod.unwrap_or(false);

    let raw_listen = raw
        .listen
        .ok_or_else(|| ConfigError::MissingField("listen".to_owned()))?;
    let trans = raw_listen.trans.unwrap_or_else(|| "plain".to_owned());
    let tls = match trans.as_str() {
        "tls" => {
            let raw_tls = raw_listen
                .tls
                .ok_or_else(|| ConfigError::MissingField("listen.tls".to_owned()))?;
            Some(TlsConfig {
                cert: raw_tls
                    .cert
                    .ok_or_else(|| ConfigError::MissingField("listen.tls.cert".to_owned()))?,
                key: raw_tls
                    .key
                    .ok_or_else(|| ConfigError::MissingField("listen.tls.key".to_owned()))?,
            })
        }
        "plain" => None,
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "listen.trans must be 'plain' or 'tls', got '{other}'"
            )));
        }
    };
    let listen = ListenConfig {
        proto: raw_listen.proto.unwrap_or_else(|| "tcp".to_owned()),
        net: raw_listen.net.unwrap_or_else(|| "tcp4".to_owned()),
        addr: raw_listen
            .addr
            .ok_or_else(|| ConfigError::MissingField("listen.addr".to_owned()))?,
        trans,
        tls,
    };

    let raw_db = raw.db.ok_or_else(|| ConfigError::MissingField("db".to_owned()))?;
    let db_type = raw_db
        .db_type
        .ok_or_else(|| ConfigError::MissingField("db.type".to_owned()))?;
    if db_type != "postgres" {
        return Err(ConfigError::InvalidValue(format!(
            "db.type must be 'postgres', got '{db_type}'"
        )));
    }
    let db = DbConfig {
        conn: raw_db
            .conn
            .ok_or_else(|| ConfigError::MissingField("db.conn".to_owned()))?,
    };

    let raw_auth = raw
        .auth
        .ok_or_else(|| ConfigError::MissingField("auth".to_owned()))?;
    let auth = AuthConfig {
        client: raw_auth
            .client
            .ok_or_else(|| ConfigError::MissingField("auth.client".to_owned()))?,
        authorize: raw_auth
            .authorize
            .ok_or_else(|| ConfigError::MissingField("auth.authorize".to_owned()))?,
        jwks: raw_auth
            .jwks
            .ok_or_else(|| ConfigError::MissingField("auth.jwks".to_owned()))?,
        token: raw_auth
            .token
            .ok_or_else(|| ConfigError::MissingField("auth.token".to_owned()))?,
        expr: raw_auth
            .expr
            .ok_or_else(|| ConfigError::MissingField("auth.expr".to_owned()))?,
        depts: raw_auth.depts.unwrap_or_default(),
        udepts: raw_auth.udepts.unwrap_or_default(),
    };

    let raw_perf = raw.perf.unwrap_or(RawPerfConfig {
        sendq: None,
        msg_args_cap: None,
        msg_bytes_cap: None,
        read_header_timeout: None,
        usem_delay_shift_bits: None,
        propagate_immediate: None,
    });
    let perf = PerfConfig {
        sendq: raw_perf.sendq.unwrap_or(128),
        msg_args_cap: raw_perf.msg_args_cap.unwrap_or(16),
        msg_bytes_cap: raw_perf.msg_bytes_cap.unwrap_or(4096),
        read_header_timeout_ms: raw_perf.read_header_timeout.unwrap_or(5000),
        usem_delay_shift_bits: raw_perf.usem_delay_shift_bits.unwrap_or(9),
        propagate_immediate: raw_perf.propagate_immediate.unwrap_or(false),
    };

    let raw_req = raw
        .req
        .ok_or_else(|| ConfigError::MissingField("req".to_owned()))?;
    let req = ReqConfig {
        y9: parse_requirement(raw_req.y9, "req.Y9")?,
        y10: parse_requirement(raw_req.y10, "req.Y10")?,
        y11: parse_requirement(raw_req.y11, "req.Y11")?,
        y12: parse_requirement(raw_req.y12, "req.Y12")?,
    };

    Ok(ServerConfig {
        url,
        prod,
        listen,
        db,
        auth,
        perf,
        req,
    })
}

fn parse_requirement(
    raw: Option<RawYearGroupRequirement>,
    field: &str,
) -> Result<YearGroupRequirement, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::MissingField(field.to_owned()))?;
    Ok(YearGroupRequirement {
        sport: raw.sport.unwrap_or(0),
        non_sport: raw.non_sport.unwrap_or(0),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "Parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "Missing required field: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        url = "https://cca.example.edu"
        prod = false

        [listen]
        addr = "0.0.0.0:8080"

        [db]
        type = "postgres"
        conn = "postgres://localhost/cca"

        [auth]
        client = "client-id"
        authorize = "https://login.example.edu/authorize"
        jwks = "https://login.example.edu/jwks"
        token = "session"
        expr = 604800

        [req.Y9]
        sport = 1
        non_sport = 2
        [req.Y10]
        sport = 1
        non_sport = 2
        [req.Y11]
        sport = 1
        non_sport = 1
        [req.Y12]
        sport = 0
        non_sport = 1
    "#;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let cfg = load_config_from_str(MINIMAL).expect("should parse");
        assert_eq!(cfg.listen.trans, "plain");
        assert!(cfg.listen.tls.is_none());
        assert_eq!(cfg.perf.sendq, 128);
        assert_eq!(cfg.req.y11.sport, 1);
    }

    #[test]
    fn rejects_non_postgres_db_type() {
        let bad = MINIMAL.replace(r#"type = "postgres""#, r#"type = "sqlite""#);
        match load_config_from_str(&bad) {
            Err(ConfigError::InvalidValue(_)) => {}
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn requires_tls_cert_and_key_when_trans_is_tls() {
        let with_tls = MINIMAL.replacen(
            "[listen]\naddr",
            "[listen]\ntrans = \"tls\"\naddr",
            1,
        );
        match load_config_from_str(&with_tls) {
            Err(ConfigError::MissingField(f)) => assert_eq!(f, "listen.tls"),
            other => panic!("expected MissingField(listen.tls), got {other:?}"),
        }
    }

    #[test]
    fn missing_required_field_is_reported() {
        let bad = MINIMAL.replace("url = \"https://cca.example.edu\"", "");
        match load_config_from_str(&bad) {
            Err(ConfigError::MissingField(f)) => assert_eq!(f, "url"),
            other => panic!("expected MissingField(url), got {other:?}"),
        }
    }
}
