use chrono::Utc;

pub const APP_NAME: &str = "orbit_backend";

/// Current time as unix seconds; every stored timestamp uses this clock.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

pub fn print_banner() {
    println!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
}
