//! Region-based source selection.
//!
//! The detector probes the caller's country once per process; the mirror
//! selector maps that country to one of two canonical catalog/download sources.

pub mod detector;
pub mod mirror;

pub use detector::RegionDetector;
pub use mirror::{select_mirror, MirrorConfig};

/// Pick a mirror from the detected region, degrading to the default mirror
/// when the probe fails.
pub async fn resolve_mirror(detector: &RegionDetector) -> MirrorConfig {
    match detector.country_code().await {
        Ok(code) => {
            let mirror = select_mirror(&code);
            tracing::info!("Region {} uses catalog {}", code, mirror.api_base);
            mirror
        }
        Err(e) => {
            tracing::warn!("{}; falling back to the default source", e);
            select_mirror("")
        }
    }
}
