use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Delivery medium of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Email,
    Sms,
    Push,
    InApp,
}

impl ChannelType {
    pub const ALL: [ChannelType; 4] = [
        ChannelType::Email,
        ChannelType::Sms,
        ChannelType::Push,
        ChannelType::InApp,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Push => "push",
            ChannelType::InApp => "in_app",
        }
    }

    pub fn requires_external_service(&self) -> bool {
        !matches!(self, ChannelType::InApp)
    }

    pub fn is_real_time(&self) -> bool {
        matches!(self, ChannelType::Push | ChannelType::InApp)
    }
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Only in-app skips external providers; push and in-app are real time
    #[test]
    fn test_channel_flags() {
        let expected = [
            (ChannelType::Email, true, false),
            (ChannelType::Sms, true, false),
            (ChannelType::Push, true, true),
            (ChannelType::InApp, false, true),
        ];

        assert_eq!(ChannelType::ALL.len(), expected.len());
        for (channel_type, external, real_time) in expected {
            assert!(ChannelType::ALL.contains(&channel_type));
            assert_eq!(
                channel_type.requires_external_service(),
                external,
                "{channel_type} external service"
            );
            assert_eq!(channel_type.is_real_time(), real_time, "{channel_type} real time");
        }
    }

    /// Test: Codes match the serde names
    #[test]
    fn test_code_matches_serde() {
        for channel_type in ChannelType::ALL {
            let json = serde_json::to_value(channel_type).unwrap();
            assert_eq!(json, serde_json::json!(channel_type.code()));
            assert_eq!(channel_type.to_string(), channel_type.code());
        }
    }
}
