/// Version string embedded at build time, falling back to the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTSYNC_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print version information.
pub fn run() {
    println!("dotsync {}", version());
}
