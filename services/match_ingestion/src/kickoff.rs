use crate::error::KickoffError;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Turns a local wall-clock kickoff into a UTC instant using the offset the
/// zone has on that particular date.
#[derive(Debug, Clone, Copy)]
pub struct KickoffNormalizer {
    tz: Tz,
}

impl KickoffNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn from_name(name: &str) -> Result<Self, KickoffError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| KickoffError::UnknownTimeZone(name.to_string()))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// `Ok(None)` when no local time is known.
    pub fn normalize(
        &self,
        date: NaiveDate,
        time: Option<NaiveTime>,
    ) -> Result<Option<DateTime<Utc>>, KickoffError> {
        let Some(time) = time else {
            return Ok(None);
        };
        let local = date.and_time(time);

        let resolved = match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt,
            // Fall-back overlap: the first occurrence is the scheduled one.
            LocalResult::Ambiguous(earliest, _) => earliest,
            // Spring-forward gap: move to the first instant after the jump.
            LocalResult::None => {
                debug!("Kickoff {} falls in a DST gap in {}", local, self.tz.name());
                self.tz
                    .from_local_datetime(&(local + Duration::hours(1)))
                    .earliest()
                    .ok_or_else(|| KickoffError::Unrepresentable(local, self.tz.name().to_string()))?
            }
        };

        Ok(Some(resolved.with_timezone(&Utc)))
    }
}
