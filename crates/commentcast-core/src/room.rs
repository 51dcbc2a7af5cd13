//! Room keys.
//!
//! A room is the set of live connections interested in one post. Rooms have
//! no entity of their own: they appear with the first subscriber and vanish
//! with the last.

/// Maximum room key length.
pub const MAX_ROOM_KEY_LENGTH: usize = 256;

/// A room identifier (the post identifier).
pub type RoomKey = String;

/// Validate a room key received in a handshake.
///
/// # Errors
///
/// Returns an error message if the room key is invalid.
pub fn validate_room_key(key: &str) -> Result<(), &'static str> {
    if key.is_empty() {
        return Err("Room key cannot be empty");
    }
    if key.len() > MAX_ROOM_KEY_LENGTH {
        return Err("Room key too long");
    }
    if !key.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Room key contains invalid characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_key_validation() {
        assert!(validate_room_key("post-42").is_ok());
        assert!(validate_room_key("8b0d5c1e-6a3f-4d0e-9c52-1f3c5a7e9b21").is_ok());
        assert!(validate_room_key("").is_err());
        assert!(validate_room_key("post\n42").is_err());
        assert!(validate_room_key("pöst").is_err());

        let long_key = "a".repeat(MAX_ROOM_KEY_LENGTH + 1);
        assert!(validate_room_key(&long_key).is_err());
    }
}
