use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const DATE_FORMATS: [&str; 3] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

/// Combined `Date_Time` value; a bare date means midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
}

/// Separate `Date` and `Time` fields.
pub fn parse_date_and_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    Some(parse_date(date)?.and_time(parse_time(time)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[rstest]
    #[case("16/12/2006", "17:24:00", at(2006, 12, 16, 17, 24, 0))]
    #[case("1/1/2007", "0:00:00", at(2007, 1, 1, 0, 0, 0))]
    #[case("2007-01-01", "13:05", at(2007, 1, 1, 13, 5, 0))]
    fn test_split_fields(#[case] date: &str, #[case] time: &str, #[case] expected: NaiveDateTime) {
        assert_eq!(parse_date_and_time(date, time), Some(expected));
    }

    #[rstest]
    #[case("2006-12-16 17:00:00", at(2006, 12, 16, 17, 0, 0))]
    #[case("2006-12-16T17:00:00", at(2006, 12, 16, 17, 0, 0))]
    #[case("16/12/2006 17:24:00", at(2006, 12, 16, 17, 24, 0))]
    #[case("2006-12-16", at(2006, 12, 16, 0, 0, 0))]
    fn test_combined_field(#[case] input: &str, #[case] expected: NaiveDateTime) {
        assert_eq!(parse_datetime(input), Some(expected));
    }

    #[rstest]
    #[case("32/12/2006", "00:00:00")]
    #[case("16/12/2006", "25:00:00")]
    #[case("?", "00:00:00")]
    fn test_rejects_garbage(#[case] date: &str, #[case] time: &str) {
        assert_eq!(parse_date_and_time(date, time), None);
    }
}
