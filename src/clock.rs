use chrono::{DateTime, Utc};

/// Time source handed to every operation that stamps a row. Handlers resolve
/// `now` once per request and pass it down, so the services never reach for
/// ambient wall-clock state and tests can pin an instant.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }
}
