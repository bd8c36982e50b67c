//! Time-range admission: the filter applied at ingress before an event ever
//! reaches the buffer.

use std::time::SystemTime;

use tracing::error;

use crate::constants::{ADMISSION_MAX_AGE_HOURS, ADMISSION_MAX_FUTURE_HOURS};
use crate::event::LogEvent;

/// `true` if `time` falls within the sink's acceptable window relative to
/// now. `None` (the "zero instant" of the spec) is always accepted.
pub fn has_valid_time(time: Option<SystemTime>) -> bool {
    let Some(t) = time else {
        return true;
    };
    let dt_hours = hours_ago(SystemTime::now(), t);
    dt_hours <= ADMISSION_MAX_AGE_HOURS && dt_hours >= -ADMISSION_MAX_FUTURE_HOURS
}

/// Hours `t` precedes `now` by; negative when `t` is in the future.
fn hours_ago(now: SystemTime, t: SystemTime) -> f64 {
    match now.duration_since(t) {
        Ok(d) => d.as_secs_f64() / 3600.0,
        Err(e) => -(e.duration().as_secs_f64() / 3600.0),
    }
}

/// Log the rejection of an event whose time fell outside the admission
/// window. The event's callback is never invoked; there is no channel back
/// to the producer once ownership of the event has been handed over.
pub fn log_rejected(target_group: &str, target_stream: &str, event: &LogEvent) {
    error!(
        group = target_group,
        stream = target_stream,
        message_len = event.message.len(),
        "rejecting event: timestamp outside admission window [-{}h, +{}h]",
        ADMISSION_MAX_AGE_HOURS,
        ADMISSION_MAX_FUTURE_HOURS,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn unknown_time_is_always_accepted() {
        assert!(has_valid_time(None));
    }

    #[test]
    fn recent_time_is_accepted() {
        let t = SystemTime::now() - Duration::from_secs(60);
        assert!(has_valid_time(Some(t)));
    }

    #[test]
    fn slightly_future_time_is_accepted() {
        let t = SystemTime::now() + Duration::from_secs(3600);
        assert!(has_valid_time(Some(t)));
    }

    #[test]
    fn far_future_time_is_rejected() {
        let t = SystemTime::now() + Duration::from_secs(3 * 3600);
        assert!(!has_valid_time(Some(t)));
    }

    #[test]
    fn old_time_within_14_days_is_accepted() {
        let t = SystemTime::now() - Duration::from_secs(13 * 24 * 3600);
        assert!(has_valid_time(Some(t)));
    }

    #[test]
    fn time_older_than_14_days_is_rejected() {
        let t = SystemTime::now() - Duration::from_secs(15 * 24 * 3600);
        assert!(!has_valid_time(Some(t)));
    }
}
