use chrono::DateTime;

pub(crate) mod helper {
    #[cfg(not(test))]
    pub use super::get_utc_now;
    #[cfg(test)]
    pub use super::mock_chrono::get_utc_now;
}

#[cfg(test)]
mod mock_chrono {
    use chrono::DateTime;
    use std::cell::Cell;

    thread_local! {
        static MOCK_NOW: Cell<i64> = const { Cell::new(1_700_000_000) };
    }

    /// every call advances the mocked clock by one second, so timestamps stay ordered within a test
    pub fn get_utc_now() -> DateTime<chrono::Utc> {
        MOCK_NOW
            .with(|now| {
                let ts = now.get();
                now.set(ts + 1);
                DateTime::<chrono::Utc>::from_timestamp(ts, 0)
            })
            .expect("invalid timestamp")
    }
}

#[cfg(not(test))]
pub fn get_utc_now() -> DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// wire format used in log lines
pub(crate) fn format_ts(ts: &DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances() {
        let first = helper::get_utc_now();
        let second = helper::get_utc_now();
        assert!(second > first);
        assert_eq!(format_ts(&DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap()), "1970-01-01T00:00:00");
    }
}
