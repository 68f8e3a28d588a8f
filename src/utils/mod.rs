use std::fmt::Write;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

/// Format an average for display with fixed two-decimal precision
pub fn format_avg(value: f64) -> String {
    format!("{:.2}", value)
}

/// Calendar date of `ts` in the reference timezone
pub fn local_date(ts: DateTime<Utc>, tz: &FixedOffset) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

/// Render `ts` in the reference timezone with a strftime pattern.
/// An invalid pattern falls back to `dd/mm/yyyy` instead of panicking.
pub fn format_local_date(ts: DateTime<Utc>, tz: &FixedOffset, pattern: &str) -> String {
    let local = ts.with_timezone(tz);
    let mut out = String::new();
    if write!(out, "{}", local.format(pattern)).is_err() {
        return local.format("%d/%m/%Y").to_string();
    }
    out
}

/// Today's calendar date in the reference timezone
pub fn today_in(tz: &FixedOffset) -> NaiveDate {
    local_date(Utc::now(), tz)
}

/// UTC calendar dates overlapping the local day `day` in `tz`.
///
/// A local day spans two UTC dates for any non-zero offset, so a provider
/// that filters by UTC date has to be asked for both.
pub fn utc_dates_for_local_day(day: NaiveDate, tz: &FixedOffset) -> Vec<NaiveDate> {
    let offset = Duration::seconds(i64::from(tz.local_minus_utc()));
    let start = day.and_time(NaiveTime::MIN) - offset;
    let end = start + Duration::days(1) - Duration::seconds(1);

    let mut dates = vec![start.date()];
    if end.date() != start.date() {
        dates.push(end.date());
    }
    dates
}

/// European football season a date falls in (seasons roll over in July)
pub fn season_for(day: NaiveDate) -> u16 {
    let year = day.year() as u16;
    if day.month() >= 7 {
        year
    } else {
        year - 1
    }
}

/// Parse "+HH:MM" / "-HH:MM" / "-3" into a fixed offset
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match raw.chars().next()? {
        '-' => (-1, &raw[1..]),
        '+' => (1, &raw[1..]),
        _ => (1, raw),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Substitute `{key}` placeholders in a query template
pub fn fill_template(template: &str, pairs: &[(&str, &str)]) -> String {
    pairs.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

/// Normalise a team name: lowercase, common club suffixes stripped
pub fn normalize_team_name(s: &str) -> String {
    s.to_lowercase()
        .replace(" fc", "")
        .replace("fc ", "")
        .replace("afc ", "")
        .replace(" afc", "")
        .replace(" sc", "")
        .replace('.', "")
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fuzzy team-name match: normalised containment, then Jaro-Winkler
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize_team_name(a);
    let b = normalize_team_name(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a) || strsim::jaro_winkler(&a, &b) >= 0.93
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn test_format_avg() {
        assert_eq!(format_avg(0.0), "0.00");
        assert_eq!(format_avg(7.0 / 3.0), "2.33");
        assert_eq!(format_avg(1.5), "1.50");
    }

    #[test]
    fn test_late_utc_kickoff_stays_on_local_day() {
        let kickoff = Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap();
        assert_eq!(local_date(kickoff, &brt()), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

        let after_midnight_utc = Utc.with_ymd_and_hms(2024, 6, 2, 1, 0, 0).unwrap();
        assert_eq!(
            local_date(after_midnight_utc, &brt()),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_format_local_date() {
        let kickoff = Utc.with_ymd_and_hms(2024, 6, 2, 1, 0, 0).unwrap();
        assert_eq!(format_local_date(kickoff, &brt(), "%d/%m/%Y"), "01/06/2024");
        assert_eq!(format_local_date(kickoff, &brt(), "%Y-%m-%d %H:%M"), "2024-06-01 22:00");
        assert_eq!(format_local_date(kickoff, &brt(), "%Q"), "01/06/2024");
    }

    #[test]
    fn test_utc_dates_for_local_day() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            utc_dates_for_local_day(day, &brt()),
            vec![day, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()]
        );

        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(utc_dates_for_local_day(day, &utc), vec![day]);

        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(
            utc_dates_for_local_day(day, &tokyo),
            vec![NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(), day]
        );
    }

    #[test]
    fn test_season_for() {
        assert_eq!(season_for(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()), 2023);
        assert_eq!(season_for(NaiveDate::from_ymd_opt(2024, 8, 17).unwrap()), 2024);
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("-03:00"), FixedOffset::west_opt(3 * 3600));
        assert_eq!(parse_utc_offset("-3"), FixedOffset::west_opt(3 * 3600));
        assert_eq!(parse_utc_offset("+05:30"), FixedOffset::east_opt(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset("0"), FixedOffset::east_opt(0));
        assert_eq!(parse_utc_offset("abc"), None);
        assert_eq!(parse_utc_offset(""), None);
    }

    #[test]
    fn test_fill_template() {
        assert_eq!(
            fill_template("{competition} jogos {date}", &[("competition", "La Liga"), ("date", "01/06")]),
            "La Liga jogos 01/06"
        );
    }

    #[test]
    fn test_names_match() {
        assert!(names_match("Arsenal FC", "Arsenal"));
        assert!(names_match("Brighton & Hove Albion", "Brighton"));
        assert!(!names_match("Arsenal", "Chelsea"));
        assert!(!names_match("", "Chelsea"));
    }
}
