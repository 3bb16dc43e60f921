mod params;
pub use params::SearchParams;

mod vacancy;
pub use vacancy::{salary_text, Vacancy, VacancyIndex};

mod status;
pub use status::SourceStatus;

/// Composite identity of a vacancy across sources, used as the reverse-index
/// cache key: `"<seeker>_<vacancy_id>"`.
pub fn composite_id(source: &str, vacancy_id: &str) -> String {
    format!("{source}_{vacancy_id}")
}

#[cfg(test)]
mod tests {
    use super::composite_id;

    #[test]
    fn composite_id_shape() {
        assert_eq!(composite_id("hh", "12345"), "hh_12345");
    }
}
