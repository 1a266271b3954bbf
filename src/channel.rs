use serde::Deserialize;

/// A speaker position a processing group can bind to. `Auto` resolves per
/// stream to the first channel the source actually presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Mono,
    Left,
    Right,
    Center,
    Lfe,
    BackLeft,
    BackRight,
    SideLeft,
    SideRight,
    Auto,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Mono => "mono",
            Channel::Left => "left",
            Channel::Right => "right",
            Channel::Center => "center",
            Channel::Lfe => "lfe",
            Channel::BackLeft => "backLeft",
            Channel::BackRight => "backRight",
            Channel::SideLeft => "sideLeft",
            Channel::SideRight => "sideRight",
            Channel::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Channel> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" => Some(Channel::Mono),
            "left" | "l" => Some(Channel::Left),
            "right" | "r" => Some(Channel::Right),
            "center" | "centre" | "c" => Some(Channel::Center),
            "lfe" => Some(Channel::Lfe),
            "backleft" | "bl" => Some(Channel::BackLeft),
            "backright" | "br" => Some(Channel::BackRight),
            "sideleft" | "sl" => Some(Channel::SideLeft),
            "sideright" | "sr" => Some(Channel::SideRight),
            "auto" => Some(Channel::Auto),
            _ => None,
        }
    }
}

/// The set of channels a processing group is bound to, in declared order.
#[derive(Debug, Clone, Default)]
pub struct ChannelSet(pub Vec<Channel>);

impl ChannelSet {
    pub fn parse(raw: &str) -> Option<ChannelSet> {
        let channels: Option<Vec<Channel>> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(Channel::parse)
            .collect();
        match channels {
            Some(v) if !v.is_empty() => Some(ChannelSet(v)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
