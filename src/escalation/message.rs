//! Alert message composition.

use crate::config;
use crate::types::{Coordinate, SafetyZone, ZoneTransition};

/// Subject line for SOS/panic/AI-risk alerts.
pub fn sos_subject() -> String {
    "SOS ALERT - I NEED HELP".to_string()
}

/// SOS alert body. Includes the last known coordinate as a map link when
/// available and a note when an audio clip was recorded with the alert.
pub fn sos_body(coords: Option<Coordinate>, has_audio_clip: bool) -> String {
    let location_info = match coords {
        Some(c) => format!("My last known location is: {}", c.maps_link()),
        None => "My current location is not available.".to_string(),
    };

    let mut body = format!(
        "URGENT: This is an automated SOS alert from my {} app.\n\n\
         I am in a potential emergency and may need help.\n\n\
         {}\n\n\
         Please try to contact me immediately.",
        config::get().alert.app_name,
        location_info
    );

    if has_audio_clip {
        body.push_str("\n\nAn audio clip was recorded with this alert.");
    }

    body
}

/// Subject line for a location-sharing invitation.
pub fn sharing_subject() -> String {
    "I'm sharing my location with you".to_string()
}

/// Body for a location-sharing invitation.
pub fn sharing_body(coords: Coordinate) -> String {
    format!(
        "Hi, I've started sharing my location. You can see my current position \
         by clicking this link:\n\n{}\n\n\
         (Note: This link provides a snapshot of my current location. The app \
         on my end is tracking me live during this session.)\n\n\
         Sent from my {} app.",
        coords.maps_link(),
        config::get().alert.app_name
    )
}

/// Subject line for a zone transition alert.
pub fn zone_subject(zone: &SafetyZone, transition: ZoneTransition) -> String {
    format!("Safety Zone Alert: {} {}", transition.verb(), zone.name)
}

/// Body for a zone transition alert.
pub fn zone_body(zone: &SafetyZone, transition: ZoneTransition) -> String {
    format!(
        "This is an automated message from {}.\n\n\
         I have just {} the '{}' safety zone.",
        config::get().alert.app_name,
        transition.verb(),
        zone.name
    )
}
