//! Coarse user-agent classification
//!
//! Ordered substring rules, first match wins. The order matters: Edge and
//! Opera advertise `Chrome`, Chrome advertises `Safari`, and iOS user agents
//! contain `Mac OS X`.

use serde::{Deserialize, Serialize};

/// Browser family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Browser {
    Edge,
    Opera,
    Firefox,
    Chrome,
    Safari,
    #[serde(rename = "Internet Explorer")]
    InternetExplorer,
    Unknown,
}

impl Browser {
    /// Classify a user-agent string
    pub fn parse(user_agent: &str) -> Self {
        let ua = user_agent;
        if ua.contains("Edg") {
            Self::Edge
        } else if ua.contains("OPR") || ua.contains("Opera") {
            Self::Opera
        } else if ua.contains("Firefox") {
            Self::Firefox
        } else if ua.contains("Chrome") {
            Self::Chrome
        } else if ua.contains("Safari") {
            Self::Safari
        } else if ua.contains("MSIE") || ua.contains("Trident") {
            Self::InternetExplorer
        } else {
            Self::Unknown
        }
    }

    /// Display name used in device names and alerts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "Edge",
            Self::Opera => "Opera",
            Self::Firefox => "Firefox",
            Self::Chrome => "Chrome",
            Self::Safari => "Safari",
            Self::InternetExplorer => "Internet Explorer",
            Self::Unknown => "Unknown",
        }
    }
}

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingSystem {
    #[serde(rename = "iOS")]
    Ios,
    Android,
    Windows,
    #[serde(rename = "macOS")]
    MacOs,
    Linux,
    Unknown,
}

impl OperatingSystem {
    /// Classify a user-agent string
    pub fn parse(user_agent: &str) -> Self {
        let ua = user_agent;
        if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
            Self::Ios
        } else if ua.contains("Android") {
            Self::Android
        } else if ua.contains("Windows") {
            Self::Windows
        } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
            Self::MacOs
        } else if ua.contains("Linux") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    /// Display name used in device names and alerts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
            Self::Windows => "Windows",
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
            Self::Unknown => "Unknown",
        }
    }
}

/// Form factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Tablet,
    Mobile,
    Desktop,
}

impl DeviceType {
    /// Classify a user-agent string
    pub fn parse(user_agent: &str) -> Self {
        let ua = user_agent;
        if ua.contains("iPad") || ua.contains("Tablet") {
            Self::Tablet
        } else if ua.contains("Mobile") || ua.contains("iPhone") || ua.contains("Android") {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    /// Display name used in device names and alerts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tablet => "Tablet",
            Self::Mobile => "Mobile",
            Self::Desktop => "Desktop",
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display!(Browser, OperatingSystem, DeviceType);

/// Everything derived from one user-agent string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedUserAgent {
    pub browser: Browser,
    pub operating_system: OperatingSystem,
    pub device_type: DeviceType,
}

impl ParsedUserAgent {
    /// Classify `user_agent`; an absent header parses as all-unknown desktop
    pub fn parse(user_agent: Option<&str>) -> Self {
        let ua = user_agent.unwrap_or_default();
        Self {
            browser: Browser::parse(ua),
            operating_system: OperatingSystem::parse(ua),
            device_type: DeviceType::parse(ua),
        }
    }
}
