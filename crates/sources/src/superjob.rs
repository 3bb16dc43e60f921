//! Adapter for the SuperJob vacancy API.

use crate::{Source, SourceConfig, SourceError, Transport};
use chrono::{DateTime, Utc};
use models::{salary_text, SearchParams, Vacancy};
use url::Url;

pub const NAME: &str = "superjob";

/// Header carrying the application key, required by every SuperJob call.
const API_KEY_HEADER: &str = "X-Api-App-Id";

pub struct SuperJob {
    transport: Transport,
    api_key: String,
}

impl SuperJob {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        Ok(Self {
            transport: Transport::new(NAME, config)?,
            api_key: config.api_key.clone(),
        })
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (API_KEY_HEADER, self.api_key.clone()),
            ("Content-Type", "application/x-www-form-urlencoded".to_string()),
        ]
    }

    fn search_url(&self, params: &SearchParams) -> Result<Url, SourceError> {
        let mut url = self
            .transport
            .base_url()
            .join("2.0/vacancies/")
            .map_err(|err| SourceError::InvalidRequest { message: err.to_string() })?;

        {
            let mut query = url.query_pairs_mut();
            if !params.text.is_empty() {
                query.append_pair("keyword", &params.text);
            }
            if let Some(town) = translate_area(&params.area) {
                query.append_pair("town", &town);
            }
            if params.per_page > 0 {
                query.append_pair("count", &params.per_page.to_string());
            }
            if params.page > 0 {
                // SuperJob pages are 0-based.
                query.append_pair("page", &(params.page - 1).to_string());
            }
        }
        Ok(url)
    }

    fn details_url(&self, id: &str) -> Result<Url, SourceError> {
        self.transport
            .base_url()
            .join(&format!("2.0/vacancies/{id}/"))
            .map_err(|err| SourceError::InvalidRequest { message: err.to_string() })
    }
}

#[async_trait::async_trait]
impl Source for SuperJob {
    fn name(&self) -> &str {
        NAME
    }

    fn health_endpoint(&self) -> String {
        self.transport
            .base_url()
            .join("2.0/vacancies/?count=1")
            .map(|url| url.to_string())
            .unwrap_or_default()
    }

    fn circuit_state(&self) -> breaker::State {
        self.transport.circuit_state()
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<Vacancy>, SourceError> {
        let url = self.search_url(params)?;
        let response: SearchResponse = self.transport.get_json(url, &self.headers()).await?;

        tracing::debug!(
            total = response.total,
            returned = response.objects.len(),
            "superjob search completed"
        );
        Ok(response
            .objects
            .into_iter()
            .map(SjVacancy::normalize)
            .collect())
    }

    async fn fetch_details(&self, id: &str) -> Result<Vacancy, SourceError> {
        if id.is_empty() {
            return Err(SourceError::InvalidRequest {
                message: "vacancy id cannot be empty".to_string(),
            });
        }
        let url = self.details_url(id)?;
        let vacancy: SjVacancy = self.transport.get_json(url, &self.headers()).await?;
        Ok(vacancy.normalize())
    }

    async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}

/// The shared `area` parameter uses HeadHunter's numeric region codes; map
/// the common ones onto town names and pass anything else through verbatim.
fn translate_area(area: &str) -> Option<String> {
    match area {
        "" => None,
        "1" => Some("Москва".to_string()),
        "2" => Some("Санкт-Петербург".to_string()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SjVacancy>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Default, serde::Deserialize)]
struct SjVacancy {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    profession: String,
    #[serde(default)]
    firm_name: String,
    #[serde(default)]
    payment_from: i64,
    #[serde(default)]
    payment_to: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    town: Option<Titled>,
    #[serde(default)]
    experience: Option<Titled>,
    #[serde(default)]
    type_of_work: Option<Titled>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    date_published: Option<i64>,
    #[serde(default, rename = "vacancyRichText")]
    vacancy_rich_text: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Titled {
    #[serde(default)]
    title: String,
}

impl SjVacancy {
    fn normalize(self) -> Vacancy {
        Vacancy {
            id: self.id.to_string(),
            job: self.profession,
            company: self.firm_name,
            salary_text: salary_text(
                self.payment_from.max(0) as u64,
                self.payment_to.max(0) as u64,
                &self.currency,
            ),
            currency: self.currency,
            area: self.town.map(|t| t.title).unwrap_or_default(),
            experience: self.experience.map(|e| e.title).unwrap_or_default(),
            schedule: self.type_of_work.map(|t| t.title).unwrap_or_default(),
            url: self.link,
            published_at: self
                .date_published
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            seeker: NAME.to_string(),
            description: self.vacancy_rich_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SuperJob {
        let config = SourceConfig {
            base_url: Url::parse("https://api.superjob.ru/").unwrap(),
            api_key: "test-app-id".to_string(),
            ..SourceConfig::default()
        };
        SuperJob::new(&config).unwrap()
    }

    #[tokio::test]
    async fn builds_search_urls_with_translated_town() {
        let adapter = adapter();
        let url = adapter
            .search_url(&SearchParams {
                text: "devops".to_string(),
                area: "2".to_string(),
                per_page: 10,
                page: 3,
            })
            .unwrap();

        let query = url.query().unwrap();
        assert!(query.contains("keyword=devops"));
        assert!(query.contains("count=10"));
        // 1-based pages translate to SuperJob's 0-based ones.
        assert!(query.contains("page=2"));
        assert!(query.contains("town=%D0%A1%D0%B0%D0%BD%D0%BA%D1%82"));
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn api_key_rides_in_headers() {
        let adapter = adapter();
        assert!(adapter
            .headers()
            .iter()
            .any(|(key, value)| *key == "X-Api-App-Id" && value == "test-app-id"));
        adapter.shutdown().await;
    }

    #[test]
    fn normalizes_wire_records() {
        let raw = serde_json::json!({
            "id": 777,
            "profession": "Site Reliability Engineer",
            "firm_name": "Globex",
            "payment_from": 120_000,
            "payment_to": 180_000,
            "currency": "rub",
            "town": {"id": 4, "title": "Москва"},
            "experience": {"title": "От 3 лет"},
            "type_of_work": {"title": "Полный рабочий день"},
            "link": "https://superjob.ru/vakansii/777.html",
            "date_published": 1709800000_i64,
            "vacancyRichText": "<p>SRE wanted</p>"
        });

        let vacancy: SjVacancy = serde_json::from_value(raw).unwrap();
        let vacancy = vacancy.normalize();

        assert_eq!(vacancy.id, "777");
        assert_eq!(vacancy.job, "Site Reliability Engineer");
        assert_eq!(vacancy.salary_text, "120 000 - 180 000 rub");
        assert_eq!(vacancy.area, "Москва");
        assert_eq!(vacancy.schedule, "Полный рабочий день");
        assert_eq!(vacancy.seeker, "superjob");
        assert!(vacancy.published_at.is_some());
    }

    #[test]
    fn unknown_area_codes_pass_through() {
        assert_eq!(translate_area(""), None);
        assert_eq!(translate_area("1"), Some("Москва".to_string()));
        assert_eq!(translate_area("Казань"), Some("Казань".to_string()));
    }
}
