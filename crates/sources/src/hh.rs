//! Adapter for the HeadHunter vacancy API.

use crate::{Source, SourceConfig, SourceError, Transport};
use chrono::{DateTime, Utc};
use models::{salary_text, SearchParams, Vacancy};
use url::Url;

pub const NAME: &str = "hh";

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

pub struct HeadHunter {
    transport: Transport,
}

impl HeadHunter {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        Ok(Self {
            transport: Transport::new(NAME, config)?,
        })
    }

    fn search_url(&self, params: &SearchParams) -> Result<Url, SourceError> {
        let mut url = self
            .transport
            .base_url()
            .join("vacancies")
            .map_err(|err| SourceError::InvalidRequest { message: err.to_string() })?;

        {
            let mut query = url.query_pairs_mut();
            if !params.text.is_empty() {
                query.append_pair("text", &params.text);
            }
            if !params.area.is_empty() {
                query.append_pair("area", &params.area);
            }

            let per_page = match params.per_page {
                0 => DEFAULT_PER_PAGE,
                n if n > MAX_PER_PAGE => DEFAULT_PER_PAGE,
                n => n,
            };
            query.append_pair("per_page", &per_page.to_string());

            if params.page > 0 {
                query.append_pair("page", &params.page.to_string());
            }
        }
        Ok(url)
    }

    fn details_url(&self, id: &str) -> Result<Url, SourceError> {
        self.transport
            .base_url()
            .join(&format!("vacancies/{id}"))
            .map_err(|err| SourceError::InvalidRequest { message: err.to_string() })
    }
}

#[async_trait::async_trait]
impl Source for HeadHunter {
    fn name(&self) -> &str {
        NAME
    }

    fn health_endpoint(&self) -> String {
        self.transport
            .base_url()
            .join("vacancies?per_page=1")
            .map(|url| url.to_string())
            .unwrap_or_default()
    }

    fn circuit_state(&self) -> breaker::State {
        self.transport.circuit_state()
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<Vacancy>, SourceError> {
        let url = self.search_url(params)?;
        let response: SearchResponse = self.transport.get_json(url, &[]).await?;

        tracing::debug!(
            found = response.found,
            pages = response.pages,
            returned = response.items.len(),
            "hh search completed"
        );
        Ok(response.items.into_iter().map(HhVacancy::normalize).collect())
    }

    async fn fetch_details(&self, id: &str) -> Result<Vacancy, SourceError> {
        if id.is_empty() {
            return Err(SourceError::InvalidRequest {
                message: "vacancy id cannot be empty".to_string(),
            });
        }
        let url = self.details_url(id)?;
        let vacancy: HhVacancy = self.transport.get_json(url, &[]).await?;
        Ok(vacancy.normalize())
    }

    async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}

#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<HhVacancy>,
    #[serde(default)]
    found: u64,
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Default, serde::Deserialize)]
struct HhVacancy {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    salary: Option<HhSalary>,
    #[serde(default)]
    employer: Option<Named>,
    #[serde(default)]
    area: Option<Named>,
    #[serde(default)]
    experience: Option<Named>,
    #[serde(default)]
    schedule: Option<Named>,
    #[serde(default)]
    alternate_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct HhSalary {
    #[serde(default)]
    from: Option<i64>,
    #[serde(default)]
    to: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Snippet {
    #[serde(default)]
    requirement: Option<String>,
    #[serde(default)]
    responsibility: Option<String>,
}

impl HhVacancy {
    fn normalize(self) -> Vacancy {
        let salary = self.salary.unwrap_or_default();
        let from = salary.from.unwrap_or(0).max(0) as u64;
        let to = salary.to.unwrap_or(0).max(0) as u64;
        let currency = salary.currency.unwrap_or_default();

        let description = match self.description {
            Some(description) => description,
            None => {
                let snippet = self.snippet.unwrap_or_default();
                [snippet.requirement, snippet.responsibility]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        };

        Vacancy {
            id: self.id,
            job: self.name,
            company: self.employer.map(|e| e.name).unwrap_or_default(),
            salary_text: salary_text(from, to, &currency),
            currency,
            area: self.area.map(|a| a.name).unwrap_or_default(),
            experience: self.experience.map(|e| e.name).unwrap_or_default(),
            schedule: self.schedule.map(|s| s.name).unwrap_or_default(),
            url: self.alternate_url.or(self.url).unwrap_or_default(),
            published_at: self.published_at.as_deref().and_then(parse_published),
            seeker: NAME.to_string(),
            description,
        }
    }
}

/// HeadHunter emits timestamps like `2024-03-07T12:00:00+0300`, which is not
/// quite RFC 3339 (no colon in the offset); accept both shapes.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|at| at.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> HeadHunter {
        let config = SourceConfig {
            base_url: Url::parse("https://api.hh.ru/").unwrap(),
            ..SourceConfig::default()
        };
        HeadHunter::new(&config).unwrap()
    }

    #[tokio::test]
    async fn builds_search_urls() {
        let adapter = adapter();
        let url = adapter
            .search_url(&SearchParams {
                text: "rust developer".to_string(),
                area: "1".to_string(),
                per_page: 50,
                page: 2,
            })
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.hh.ru/vacancies?text=rust+developer&area=1&per_page=50&page=2"
        );
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn per_page_is_clamped() {
        let adapter = adapter();
        for per_page in [0, 101, 100_000] {
            let url = adapter
                .search_url(&SearchParams {
                    text: "qa".to_string(),
                    per_page,
                    ..SearchParams::default()
                })
                .unwrap();
            let expect = if per_page == 0 || per_page > 100 { 20 } else { per_page };
            assert!(url.query().unwrap().contains(&format!("per_page={expect}")));
        }
        adapter.shutdown().await;
    }

    #[test]
    fn normalizes_wire_records() {
        let raw = serde_json::json!({
            "id": "98765",
            "name": "Backend Engineer",
            "salary": {"from": 250_000, "to": null, "currency": "RUR"},
            "employer": {"id": "1", "name": "Acme"},
            "area": {"id": "1", "name": "Москва"},
            "experience": {"name": "3-6 years"},
            "schedule": {"name": "remote"},
            "alternate_url": "https://hh.ru/vacancy/98765",
            "published_at": "2024-03-07T12:00:00+0300",
            "snippet": {"requirement": "Rust", "responsibility": "Services"}
        });

        let vacancy: HhVacancy = serde_json::from_value(raw).unwrap();
        let vacancy = vacancy.normalize();

        assert_eq!(vacancy.id, "98765");
        assert_eq!(vacancy.job, "Backend Engineer");
        assert_eq!(vacancy.company, "Acme");
        assert_eq!(vacancy.salary_text, "from 250 000 RUR");
        assert_eq!(vacancy.seeker, "hh");
        assert_eq!(vacancy.url, "https://hh.ru/vacancy/98765");
        assert_eq!(vacancy.description, "Rust Services");
        assert_eq!(
            vacancy.published_at.unwrap().to_rfc3339(),
            "2024-03-07T09:00:00+00:00"
        );
    }

    #[test]
    fn missing_salary_reads_as_not_specified() {
        let vacancy: HhVacancy =
            serde_json::from_value(serde_json::json!({"id": "1", "name": "Intern"})).unwrap();
        assert_eq!(vacancy.normalize().salary_text, "not specified");
    }
}
