//! Emergency SOS
//!
//! After a confirmed fall the session fetches a location, composes a
//! message with a map link and texts a fixed contact. No retries: a
//! failed attempt is reported and the user has to trigger again.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{info, warn};

pub const NO_LOCATION: &str = "Location not found";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn maps_link(&self) -> String {
        format!(
            "http://maps.google.com/?q={},{}",
            self.latitude, self.longitude
        )
    }
}

/// Current-position lookup
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    /// `Ok(None)` when no fix is available
    async fn current_location(&self) -> Result<Option<GeoPoint>>;
}

/// Text-message dispatch
#[async_trait]
pub trait SmsGateway: Send + Sync + Debug {
    async fn send(&self, recipient: &str, message: &str) -> Result<()>;
}

/// Human-readable location for the SOS text
pub fn location_text(lookup: Result<Option<GeoPoint>>) -> String {
    match lookup {
        Ok(Some(point)) => point.maps_link(),
        Ok(None) => NO_LOCATION.to_string(),
        Err(e) => format!("Location error: {}", e),
    }
}

pub fn sos_message(location: &str) -> String {
    format!("SOS! Fall detected. Help me here: {}", location)
}

/// Look up the location and text it to `recipient`. Returns the message sent.
pub async fn dispatch_sos(
    location: &dyn LocationProvider,
    sms: &dyn SmsGateway,
    recipient: &str,
    use_location: bool,
) -> Result<String> {
    let place = if use_location {
        location_text(location.current_location().await)
    } else {
        warn!("📍 Location unavailable, sending SOS without a fix");
        NO_LOCATION.to_string()
    };

    let message = sos_message(&place);
    sms.send(recipient, &message).await?;
    info!("🆘 SOS sent to {}", recipient);
    Ok(message)
}
