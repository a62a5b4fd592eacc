use time::macros::format_description;
use time::PrimitiveDateTime;

use super::error::FilenameError;

fn parse_date(date: &str) -> Result<PrimitiveDateTime, FilenameError> {
    PrimitiveDateTime::parse(
        date,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .map_err(|source| FilenameError::BadDate {
        date: date.to_string(),
        source,
    })
}

/// Output filename from the validity range, e.g. `BIOSANS_Definition_2019_2100.xml`.
///
/// Year, month and day are appended to both ends of the range until the
/// first period where they differ.
pub fn make_filename(
    instrument: &str,
    valid_from: &str,
    valid_to: &str,
) -> Result<String, FilenameError> {
    let from = parse_date(valid_from)?;
    let to = parse_date(valid_to)?;
    let periods = |d: &PrimitiveDateTime| [d.year(), u8::from(d.month()) as i32, d.day() as i32];
    let mut from_parts: Vec<String> = Vec::new();
    let mut to_parts: Vec<String> = Vec::new();
    for (f, t) in periods(&from).into_iter().zip(periods(&to)) {
        from_parts.push(f.to_string());
        to_parts.push(t.to_string());
        if from_parts != to_parts {
            break;
        }
    }
    Ok(format!(
        "{instrument}_Definition_{}_{}.xml",
        from_parts.join("-"),
        to_parts.join("-")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_differs() {
        let name = make_filename("BIOSANS", "2019-01-01 00:00:00", "2100-12-31 23:59:59").unwrap();
        assert_eq!(name, "BIOSANS_Definition_2019_2100.xml");
    }

    #[test]
    fn test_month_and_day_differ() {
        let name = make_filename("EQSANS", "2019-01-01 00:00:00", "2019-06-30 23:59:59").unwrap();
        assert_eq!(name, "EQSANS_Definition_2019-1_2019-6.xml");
        let name = make_filename("EQSANS", "2019-03-04 00:00:00", "2019-03-15 00:00:00").unwrap();
        assert_eq!(name, "EQSANS_Definition_2019-3-4_2019-3-15.xml");
    }

    #[test]
    fn test_bad_date() {
        assert!(matches!(
            make_filename("X", "2019/01/01", "2100-12-31 23:59:59"),
            Err(FilenameError::BadDate { .. })
        ));
    }
}
