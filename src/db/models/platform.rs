use serde::{Deserialize, Serialize};

/// A social network content can be generated for and published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    X,
}

/// Everything that differs between platforms, in one place.
#[derive(Debug)]
pub struct PlatformProfile {
    pub slug: &'static str,
    pub display_name: &'static str,
    /// Calendar background color.
    pub color: &'static str,
    pub icon: &'static str,
    /// Inclusive character window for a generated promotional body.
    pub caption_chars: (usize, usize),
    pub api_base: &'static str,
    pub oauth_authorize_url: &'static str,
    pub oauth_scope: &'static str,
}

const INSTAGRAM: PlatformProfile = PlatformProfile {
    slug: "instagram",
    display_name: "Instagram",
    color: "#E1306C",
    icon: "📸",
    caption_chars: (50, 150),
    api_base: "https://graph.instagram.com/v18.0",
    oauth_authorize_url: "https://api.instagram.com/oauth/authorize",
    oauth_scope: "user_profile,user_media",
};

const FACEBOOK: PlatformProfile = PlatformProfile {
    slug: "facebook",
    display_name: "Facebook",
    color: "#1877F2",
    icon: "👥",
    caption_chars: (50, 200),
    api_base: "https://graph.facebook.com/v18.0",
    oauth_authorize_url: "https://www.facebook.com/v18.0/dialog/oauth",
    oauth_scope: "pages_manage_posts,pages_read_engagement",
};

const X: PlatformProfile = PlatformProfile {
    slug: "x",
    display_name: "X",
    color: "#000000",
    icon: "🐦",
    caption_chars: (50, 100),
    api_base: "https://api.twitter.com/2",
    oauth_authorize_url: "https://twitter.com/i/oauth2/authorize",
    oauth_scope: "tweet.read tweet.write users.read",
};

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::Facebook, Platform::X];

    pub fn profile(self) -> &'static PlatformProfile {
        match self {
            Platform::Instagram => &INSTAGRAM,
            Platform::Facebook => &FACEBOOK,
            Platform::X => &X,
        }
    }

    /// Convert from string (case-insensitive). `twitter` is accepted for X.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "instagram" => Some(Platform::Instagram),
            "facebook" => Some(Platform::Facebook),
            "x" | "twitter" => Some(Platform::X),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.profile().slug
    }

    pub fn display_name(self) -> &'static str {
        self.profile().display_name
    }

    pub fn color(self) -> &'static str {
        self.profile().color
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.as_str().to_string()
    }
}

impl TryFrom<&str> for Platform {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid platform: {}", value))
    }
}
