use chrono::{DateTime, Utc};

/// A vacancy record normalized from one of the upstream job boards.
/// `(seeker, id)` is the stable composite identity used for reverse lookup.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vacancy {
    pub id: String,
    pub job: String,
    pub company: String,
    /// Human-rendered salary range. Always present; "not specified" when the
    /// upstream carries no bounds.
    pub salary_text: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub schedule: String,
    pub url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Name of the source adapter that produced this record.
    pub seeker: String,
    #[serde(default)]
    pub description: String,
}

/// Reverse-index entry: locates a vacancy inside a cached search batch by its
/// composite id.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VacancyIndex {
    pub search_hash: String,
    pub source: String,
    /// Position of the vacancy within its source's result entry.
    pub position: usize,
}

/// Render a salary range the way the upstream boards present it, with
/// thousands grouped by spaces. Zero on both ends means the posting did not
/// state a salary.
pub fn salary_text(from: u64, to: u64, currency: &str) -> String {
    let text = match (from, to) {
        (0, 0) => return "not specified".to_string(),
        (from, 0) => format!("from {}", group_thousands(from)),
        (0, to) => format!("up to {}", group_thousands(to)),
        (from, to) => format!("{} - {}", group_thousands(from), group_thousands(to)),
    };
    if currency.is_empty() {
        text
    } else {
        format!("{text} {currency}")
    }
}

fn group_thousands(n: u64) -> String {
    if n >= 1000 {
        format!("{} {:03}", group_thousands(n / 1000), n % 1000)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::salary_text;

    #[test]
    fn salary_rendering() {
        assert_eq!(salary_text(0, 0, "RUR"), "not specified");
        assert_eq!(salary_text(100_000, 0, "RUR"), "from 100 000 RUR");
        assert_eq!(salary_text(0, 90_500, "RUR"), "up to 90 500 RUR");
        assert_eq!(
            salary_text(100_000, 150_000, "RUR"),
            "100 000 - 150 000 RUR"
        );
        assert_eq!(salary_text(950, 0, ""), "from 950");
        assert_eq!(salary_text(1_234_567, 0, "USD"), "from 1 234 567 USD");
    }
}
