/// Liveness of an upstream resolver as observed by the health prober.
///
/// Advisory only: every request still attempts every configured upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

impl UpstreamStatus {
    /// Encoding for the single-writer atomic status cell.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Healthy => 1,
            Self::Unhealthy => 2,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Healthy,
            2 => Self::Unhealthy,
            _ => Self::Unknown,
        }
    }
}
