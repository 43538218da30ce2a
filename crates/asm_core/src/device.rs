//! Device classification

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse device class of the requesting client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Desktop browser (also the fallback)
    #[default]
    Desktop,
    /// Tablet browser
    Tablet,
    /// Phone browser
    Mobile,
    /// Crawler or other automated client
    Bot,
}

impl DeviceClass {
    /// Classify a `User-Agent` header value
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return Self::Desktop;
        };
        let ua = ua.to_lowercase();

        if ["bot", "crawler", "spider", "slurp"].iter().any(|m| ua.contains(m)) {
            Self::Bot
        } else if ua.contains("ipad") || ua.contains("tablet") || (ua.contains("android") && !ua.contains("mobile")) {
            Self::Tablet
        } else if ua.contains("mobi") || ua.contains("iphone") {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    /// Lowercase name, as exposed to templates
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Tablet => "tablet",
            Self::Mobile => "mobile",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(DeviceClass::from_user_agent(None), DeviceClass::Desktop);
        assert_eq!(
            DeviceClass::from_user_agent(Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148")),
            DeviceClass::Mobile
        );
        assert_eq!(
            DeviceClass::from_user_agent(Some("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)")),
            DeviceClass::Tablet
        );
        assert_eq!(
            DeviceClass::from_user_agent(Some("Mozilla/5.0 (Linux; Android 14; SM-X710)")),
            DeviceClass::Tablet
        );
        assert_eq!(
            DeviceClass::from_user_agent(Some("Mozilla/5.0 (compatible; Googlebot/2.1)")),
            DeviceClass::Bot
        );
        assert_eq!(
            DeviceClass::from_user_agent(Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")),
            DeviceClass::Desktop
        );
    }
}
