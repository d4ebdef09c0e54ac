use serde::Serialize;

use crate::models::Spot;

/// Role of the target country in a spot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Sender and receiver are in the same country
    Local,
    /// Heard abroad, transmitted from the target country
    Sent,
    /// Heard in the target country, transmitted from abroad
    Received,
    /// Neither side is in the target country
    Unmatched,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Local => "local",
            Classification::Sent => "sent",
            Classification::Received => "received",
            Classification::Unmatched => "unmatched",
        }
    }

    pub fn is_counted(&self) -> bool {
        !matches!(self, Classification::Unmatched)
    }
}

pub fn classify(spot: &Spot, target_country: i32) -> Classification {
    if spot.sender_country == spot.receiver_country {
        Classification::Local
    } else if spot.sender_country == target_country {
        Classification::Sent
    } else if spot.receiver_country == target_country {
        Classification::Received
    } else {
        Classification::Unmatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spot::fixtures;

    fn spot(sender: i32, receiver: i32) -> Spot {
        Spot {
            sender_country: sender,
            receiver_country: receiver,
            ..fixtures::spot()
        }
    }

    #[test]
    fn test_truth_table() {
        assert_eq!(classify(&spot(224, 300), 224), Classification::Sent);
        assert_eq!(classify(&spot(300, 224), 224), Classification::Received);
        assert_eq!(classify(&spot(300, 300), 224), Classification::Local);
        assert_eq!(classify(&spot(300, 400), 224), Classification::Unmatched);
    }

    #[test]
    fn test_local_wins_over_target() {
        assert_eq!(classify(&spot(224, 224), 224), Classification::Local);
    }

    #[test]
    fn test_sentinel_country_codes() {
        assert_eq!(classify(&spot(0, 0), 0), Classification::Local);
        assert_eq!(classify(&spot(0, 5), 0), Classification::Sent);
        assert_eq!(classify(&spot(-1, i32::MAX), i32::MAX), Classification::Received);
        assert_eq!(classify(&spot(i32::MIN, 1), 2), Classification::Unmatched);
    }

    #[test]
    fn test_counted_outcomes() {
        assert!(Classification::Sent.is_counted());
        assert!(Classification::Local.is_counted());
        assert!(!Classification::Unmatched.is_counted());
        assert_eq!(Classification::Received.as_str(), "received");
    }
}
