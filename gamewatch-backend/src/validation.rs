/// Input validation for all backend routes
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Game name cannot be empty")]
    GameNameEmpty,

    #[error("Game name too long (max 100 characters, got {0})")]
    GameNameTooLong(usize),

    #[error("Server URL cannot be empty")]
    ServerUrlEmpty,

    #[error("Server URL too long (max 512 characters, got {0})")]
    ServerUrlTooLong(usize),

    #[error("Current player count {cur} exceeds capacity {max}")]
    PlayerCountExceedsCapacity { cur: u32, max: u32 },

    #[error("Sender phone number cannot be empty")]
    SenderEmpty,
}

/// Validates a game name
///
/// Rules:
/// - Cannot be empty
/// - Max 100 characters
pub fn validate_game_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::GameNameEmpty);
    }

    if name.len() > 100 {
        return Err(ValidationError::GameNameTooLong(name.len()));
    }

    Ok(())
}

/// Validates a server URL, the unique server identity key
///
/// Rules:
/// - Cannot be empty
/// - Max 512 characters
pub fn validate_server_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::ServerUrlEmpty);
    }

    if url.len() > 512 {
        return Err(ValidationError::ServerUrlTooLong(url.len()));
    }

    Ok(())
}

/// Validates the player counts of an update ping.
///
/// A capacity of 0 means the server did not report one; only a reported
/// capacity is enforced.
pub fn validate_player_counts(cur: u32, max: u32) -> Result<(), ValidationError> {
    if max > 0 && cur > max {
        return Err(ValidationError::PlayerCountExceedsCapacity { cur, max });
    }

    Ok(())
}

/// Validates the sender number of an inbound subscriber message
pub fn validate_sender(sender: &str) -> Result<(), ValidationError> {
    if sender.is_empty() {
        return Err(ValidationError::SenderEmpty);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Game name validation tests
    #[test]
    fn test_valid_game_names() {
        assert!(validate_game_name("5 Card Stud").is_ok());
        assert!(validate_game_name("Battleship").is_ok());
        assert!(validate_game_name("a").is_ok());
        assert!(validate_game_name(&"a".repeat(100)).is_ok()); // exactly 100 chars
    }

    #[test]
    fn test_empty_game_name() {
        assert_eq!(validate_game_name(""), Err(ValidationError::GameNameEmpty));
    }

    #[test]
    fn test_game_name_too_long() {
        let long_name = "a".repeat(101);
        assert_eq!(
            validate_game_name(&long_name),
            Err(ValidationError::GameNameTooLong(101))
        );
    }

    // Server URL validation tests
    #[test]
    fn test_valid_server_urls() {
        assert!(validate_server_url("http://poker.example.com:6502/?table=stud5").is_ok());
        assert!(validate_server_url("tcp://fn.example.org:1234").is_ok());
    }

    #[test]
    fn test_empty_server_url() {
        assert_eq!(validate_server_url(""), Err(ValidationError::ServerUrlEmpty));
    }

    #[test]
    fn test_server_url_too_long() {
        let long_url = format!("http://{}", "a".repeat(512));
        assert_eq!(
            validate_server_url(&long_url),
            Err(ValidationError::ServerUrlTooLong(519))
        );
    }

    // Player count validation tests
    #[test]
    fn test_valid_player_counts() {
        assert!(validate_player_counts(0, 8).is_ok());
        assert!(validate_player_counts(8, 8).is_ok());
        assert!(validate_player_counts(5, 0).is_ok()); // unreported capacity
    }

    #[test]
    fn test_player_count_exceeds_capacity() {
        assert_eq!(
            validate_player_counts(9, 8),
            Err(ValidationError::PlayerCountExceedsCapacity { cur: 9, max: 8 })
        );
    }

    // Sender validation tests
    #[test]
    fn test_valid_sender() {
        assert!(validate_sender("+15551230001").is_ok());
        assert!(validate_sender("whatsapp:+15551230001").is_ok());
    }

    #[test]
    fn test_empty_sender() {
        assert_eq!(validate_sender(""), Err(ValidationError::SenderEmpty));
    }
}
