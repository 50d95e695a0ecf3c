//! Object-store path template substitution: `${yyyy}`, `${MM}`, `${dd}`,
//! `${HH}`, `${mm}` substituted in UTC from the batch-seal time.

use chrono::{DateTime, Utc};

pub fn render(template: &str, sealed_at: DateTime<Utc>) -> String {
    template
        .replace("${yyyy}", &format!("{:04}", sealed_at.format("%Y")))
        .replace("${MM}", &format!("{}", sealed_at.format("%m")))
        .replace("${dd}", &format!("{}", sealed_at.format("%d")))
        .replace("${HH}", &format!("{}", sealed_at.format("%H")))
        .replace("${mm}", &format!("{}", sealed_at.format("%M")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn substitutes_all_tokens_in_utc() {
        let t = Utc.with_ymd_and_hms(2024, 3, 7, 13, 5, 0).unwrap();
        let rendered = render("logs/${yyyy}/${MM}/${dd}/${HH}${mm}.ndjson", t);
        assert_eq!(rendered, "logs/2024/03/07/1305.ndjson");
    }
}
