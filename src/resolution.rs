/// A named video resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    const fn new(name: &'static str, width: u32, height: u32) -> Self {
        Self {
            name,
            width,
            height,
        }
    }
}

/// Recognised resolutions, best first. Approximate matching walks this in order.
pub const STANDARD_RESOLUTIONS: &[Resolution] = &[
    Resolution::new("8K", 7680, 4320),
    Resolution::new("4K", 3840, 2160),
    Resolution::new("1440p", 2560, 1440),
    Resolution::new("1080p", 1920, 1080),
    Resolution::new("2K", 2048, 1080),
    Resolution::new("720p", 1280, 720),
    Resolution::new("480p", 640, 480),
    Resolution::new("360p", 640, 360),
];

fn exact(width: u32, height: u32) -> Option<&'static str> {
    STANDARD_RESOLUTIONS
        .iter()
        .find(|res| res.width == width && res.height == height)
        .map(|res| res.name)
}

/// Name for a frame size, e.g. `1080p` or `4K`.
///
/// Frame sizes without an exact entry are named after their height, except
/// for very wide frames which are called 4K/8K by width.
pub fn standard_resolution(width: u32, height: u32) -> String {
    if height == 0 {
        return "0p".to_string();
    }

    if let Some(name) = exact(width, height) {
        return name.to_string();
    }

    if height > 1440 {
        if width >= 7000 {
            return "8K".to_string();
        } else if width >= 3800 {
            return "4K".to_string();
        }
    }

    format!("{}p", height)
}

/// Like [`standard_resolution`] but always answers with a table entry.
pub fn closest_standard_resolution(width: u32, height: u32) -> String {
    if height == 0 {
        return "0p".to_string();
    }

    if let Some(name) = exact(width, height) {
        return name.to_string();
    }

    STANDARD_RESOLUTIONS
        .iter()
        .find(|res| height >= res.height)
        .or(STANDARD_RESOLUTIONS.last())
        .map(|res| res.name.to_string())
        .unwrap_or_default()
}
