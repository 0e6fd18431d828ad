//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Variables already present in the process win.
/// Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            // Running from the repo root with the service under server/.
            let _ = dotenv::from_filename("server/.env");
        }
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

const LOCAL_DB_USER: &str = "moviestack";
const LOCAL_DB_NAME: &str = "moviestack_dev";

/// Database URL: `DATABASE_URL` if set, otherwise the local development
/// database with the password taken from `DB_PASS`.
pub fn db_url() -> anyhow::Result<String> {
    if let Some(v) = env_opt("DATABASE_URL") {
        return Ok(v);
    }
    let password = env_opt("DB_PASS").map(|p| p.trim().trim_matches(['"', '\'']).to_string());
    info!(target = "env", "DATABASE_URL not set; using local development database");
    local_dev_dsn(password.as_deref())
}

// sslmode=disable is for local dev only; set DATABASE_URL with TLS in production.
fn local_dev_dsn(password: Option<&str>) -> anyhow::Result<String> {
    let mut out = url::Url::parse("postgres://127.0.0.1:5432")?;
    out.set_username(LOCAL_DB_USER)
        .map_err(|_| anyhow::anyhow!("cannot set DSN username"))?;
    if let Some(pass) = password.filter(|p| !p.is_empty()) {
        out.set_password(Some(pass))
            .map_err(|_| anyhow::anyhow!("cannot set DSN password"))?;
    }
    out.set_path(&format!("/{LOCAL_DB_NAME}"));
    out.query_pairs_mut().append_pair("sslmode", "disable");
    Ok(out.to_string())
}

fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD")
        || k.contains("PASS")
        || k.contains("SECRET")
        || k.contains("KEY")
        || k.contains("TOKEN")
    {
        return "***".to_string();
    }

    let val_trim = val.trim();

    // Always redact postgres DSNs even if the key isn't obviously sensitive.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        let scheme = u.scheme().to_ascii_lowercase();
        if scheme == "postgres" || scheme == "postgresql" {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    val_trim.to_string()
}

/// Log a consolidated, redacted snapshot of configuration.
pub fn preflight_check(title: &str, keys: &[&str]) {
    init_env();
    let snapshot: Vec<(String, String)> = keys
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
}
