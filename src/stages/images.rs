//! Image enrichment: find a stock image for each H2 section and insert it
//! directly below the heading.
use super::{EnrichStage, EnrichedContent, ImageSuggestion, Stage, StageFailure, StageResult};
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const RESULTS_PER_SEARCH: usize = 5;

/// One search hit from an image provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub title: String,
    pub url: String,
    pub source: String,
}

pub trait ImageSearch {
    /// Provider name recorded on each inserted image.
    fn name(&self) -> &'static str;
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<ImageCandidate>>;
}

fn http_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(HTTP_TIMEOUT))
        .build()
        .into()
}

pub struct FreepikSearch {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl FreepikSearch {
    pub const NAME: &'static str = "freepik";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            agent: http_agent(),
            api_key: api_key.into(),
            base_url: "https://api.freepik.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FreepikResponse {
    #[serde(default)]
    data: Vec<FreepikResource>,
}

#[derive(Debug, Deserialize)]
struct FreepikResource {
    #[serde(default)]
    title: String,
    image: Option<FreepikImage>,
}

#[derive(Debug, Deserialize)]
struct FreepikImage {
    source: Option<FreepikSource>,
}

#[derive(Debug, Deserialize)]
struct FreepikSource {
    #[serde(default)]
    url: String,
}

impl ImageSearch for FreepikSearch {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn search(&self, query: &str, max_results: usize) -> Result<Vec<ImageCandidate>> {
        let url = format!("{}/resources", self.base_url);
        let mut response = self
            .agent
            .get(&url)
            .header("x-freepik-api-key", self.api_key.as_str())
            .query("term", query)
            .query("limit", max_results.to_string())
            .query("filters[content_type][photo]", "1")
            .call()
            .with_context(|| format!("freepik search {query:?}"))?;
        let response: FreepikResponse = response
            .body_mut()
            .read_json()
            .context("decode freepik response")?;

        Ok(response
            .data
            .into_iter()
            .map(|resource| ImageCandidate {
                url: resource
                    .image
                    .and_then(|image| image.source)
                    .map(|source| source.url)
                    .unwrap_or_default(),
                title: resource.title,
                source: Self::NAME.to_string(),
            })
            .take(max_results)
            .collect())
    }
}

/// Google Images results via DataForSEO.
pub struct DataForSeoSearch {
    agent: ureq::Agent,
    credentials: String,
    base_url: String,
}

impl DataForSeoSearch {
    pub const NAME: &'static str = "dataforseo";

    /// `credentials` is `base64(login:password)`, with or without a leading
    /// `Basic `. Anything that does not decode to `login:password` is rejected.
    pub fn from_credentials(credentials: &str) -> Result<Self> {
        let token = credentials.trim();
        let token = token.strip_prefix("Basic ").unwrap_or(token).trim();
        let decoded = STANDARD
            .decode(token)
            .context("credentials are not valid base64")?;
        let decoded = String::from_utf8(decoded).context("decoded credentials are not UTF-8")?;
        if !decoded.contains(':') {
            bail!("decoded credentials are not in login:password form");
        }
        Ok(Self {
            agent: http_agent(),
            credentials: token.to_string(),
            base_url: "https://api.dataforseo.com/v3".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct DataForSeoResponse {
    #[serde(default)]
    tasks: Vec<DataForSeoTask>,
}

#[derive(Debug, Deserialize)]
struct DataForSeoTask {
    #[serde(default)]
    result: Option<Vec<DataForSeoResult>>,
}

#[derive(Debug, Deserialize)]
struct DataForSeoResult {
    #[serde(default)]
    items: Option<Vec<DataForSeoItem>>,
}

#[derive(Debug, Deserialize)]
struct DataForSeoItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl ImageSearch for DataForSeoSearch {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn search(&self, query: &str, max_results: usize) -> Result<Vec<ImageCandidate>> {
        let url = format!("{}/serp/google/images/live", self.base_url);
        let body = serde_json::json!([{ "keyword": query, "depth": max_results }]);
        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", format!("Basic {}", self.credentials).as_str())
            .send_json(&body)
            .with_context(|| format!("dataforseo search {query:?}"))?;
        let response: DataForSeoResponse = response
            .body_mut()
            .read_json()
            .context("decode dataforseo response")?;

        let items = response
            .tasks
            .into_iter()
            .next()
            .and_then(|task| task.result)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|result| result.items.unwrap_or_default());
        Ok(items
            .map(|item| ImageCandidate {
                title: item.title.unwrap_or_default(),
                url: item.source_url.unwrap_or_default(),
                source: item.source.unwrap_or_else(|| Self::NAME.to_string()),
            })
            .take(max_results)
            .collect())
    }
}

/// Enrich stage over an ordered list of image providers.
pub struct ImageEnricher {
    providers: Vec<Box<dyn ImageSearch>>,
    max_images: usize,
}

impl ImageEnricher {
    pub fn new(providers: Vec<Box<dyn ImageSearch>>, max_images: usize) -> Self {
        Self {
            providers,
            max_images,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    fn find_image(
        &self,
        heading: &str,
        attempts: &mut usize,
        failures: &mut Vec<String>,
    ) -> Option<ImageSuggestion> {
        for provider in &self.providers {
            *attempts += 1;
            match provider.search(heading, RESULTS_PER_SEARCH) {
                Ok(candidates) => {
                    let Some(candidate) = candidates
                        .into_iter()
                        .find(|candidate| !candidate.url.trim().is_empty())
                    else {
                        continue;
                    };
                    let alt_text = if candidate.title.trim().is_empty() {
                        heading.to_string()
                    } else {
                        candidate.title.trim().to_string()
                    };
                    return Some(ImageSuggestion {
                        section_heading: heading.to_string(),
                        search_query: heading.to_string(),
                        image_url: candidate.url.trim().to_string(),
                        alt_text: alt_text.replace(['[', ']'], ""),
                        source: provider.name().to_string(),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        provider = provider.name(),
                        heading,
                        error = %format!("{err:#}"),
                        "image search failed"
                    );
                    failures.push(format!("{}: {err:#}", provider.name()));
                }
            }
        }
        None
    }
}

impl EnrichStage for ImageEnricher {
    fn enrich(&self, content: &str) -> StageResult<EnrichedContent> {
        let mut images = Vec::new();
        let mut output = Vec::new();
        let mut in_fence = false;
        let mut attempts = 0;
        let mut failures = Vec::new();

        for line in content.split('\n') {
            output.push(line.to_string());
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence || images.len() >= self.max_images {
                continue;
            }
            let Some(heading) = section_heading(line) else {
                continue;
            };
            if let Some(image) = self.find_image(heading, &mut attempts, &mut failures) {
                output.push(String::new());
                output.push(markdown_image(&image));
                images.push(image);
            }
        }

        if attempts > 0 && failures.len() == attempts {
            return Err(StageFailure::new(
                Stage::Enrich,
                format!("every image search failed; last error: {}", failures.join("; ")),
            ));
        }

        tracing::debug!(
            images = images.len(),
            searches = attempts,
            "image enrichment complete"
        );
        Ok(EnrichedContent {
            markdown_content: output.join("\n"),
            images,
        })
    }
}

fn section_heading(line: &str) -> Option<&str> {
    let heading = line.strip_prefix("## ")?.trim();
    let heading = heading.trim_end_matches('#').trim();
    (!heading.is_empty()).then_some(heading)
}

fn markdown_image(image: &ImageSuggestion) -> String {
    let url = image.image_url.replace(' ', "%20").replace(')', "%29");
    format!("![{}]({url})", image.alt_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeSearch {
        name: &'static str,
        reply: Box<dyn Fn(&str) -> Result<Vec<ImageCandidate>>>,
        queries: Rc<RefCell<Vec<String>>>,
    }

    impl ImageSearch for FakeSearch {
        fn name(&self) -> &'static str {
            self.name
        }

        fn search(&self, query: &str, _max_results: usize) -> Result<Vec<ImageCandidate>> {
            self.queries.borrow_mut().push(query.to_string());
            (self.reply)(query)
        }
    }

    fn fake(
        name: &'static str,
        reply: impl Fn(&str) -> Result<Vec<ImageCandidate>> + 'static,
    ) -> (Box<dyn ImageSearch>, Rc<RefCell<Vec<String>>>) {
        let queries = Rc::new(RefCell::new(Vec::new()));
        let search = FakeSearch {
            name,
            reply: Box::new(reply),
            queries: Rc::clone(&queries),
        };
        (Box::new(search), queries)
    }

    fn hit(title: &str, url: &str) -> ImageCandidate {
        ImageCandidate {
            title: title.to_string(),
            url: url.to_string(),
            source: "test".to_string(),
        }
    }

    const ARTICLE: &str = "# Marathon Training Basics\n\nIntro.\n\n## Building a Base\n\nRun easy.\n\n## Long Runs\n\nGo long.\n";

    #[test]
    fn inserts_image_after_each_section_heading() {
        let (search, queries) = fake("fake", |query| {
            Ok(vec![hit(&format!("[{query}] photo"), "https://img.test/a b.jpg")])
        });
        let enriched = ImageEnricher::new(vec![search], 5)
            .enrich(ARTICLE)
            .expect("enrich");

        assert_eq!(
            *queries.borrow(),
            vec!["Building a Base".to_string(), "Long Runs".to_string()]
        );
        assert_eq!(enriched.images.len(), 2);
        assert_eq!(enriched.images[0].source, "fake");
        assert_eq!(enriched.images[0].alt_text, "Building a Base photo");
        assert!(enriched.markdown_content.contains(
            "## Building a Base\n\n![Building a Base photo](https://img.test/a%20b.jpg)\n\nRun easy."
        ));
        assert!(enriched.markdown_content.ends_with("Go long.\n"));
    }

    #[test]
    fn respects_max_images() {
        let (search, queries) = fake("fake", |_| Ok(vec![hit("t", "https://img.test/x.jpg")]));
        let enriched = ImageEnricher::new(vec![search], 1)
            .enrich(ARTICLE)
            .expect("enrich");
        assert_eq!(enriched.images.len(), 1);
        assert_eq!(queries.borrow().len(), 1);
    }

    #[test]
    fn falls_back_to_next_provider() {
        let (failing, _) = fake("down", |_| Err(anyhow::anyhow!("503")));
        let (working, _) = fake("up", |_| Ok(vec![hit("", "https://img.test/x.jpg")]));
        let enriched = ImageEnricher::new(vec![failing, working], 5)
            .enrich(ARTICLE)
            .expect("enrich");
        assert_eq!(enriched.images.len(), 2);
        assert_eq!(enriched.images[0].source, "up");
        assert_eq!(enriched.images[0].alt_text, "Building a Base");
    }

    #[test]
    fn no_results_leaves_content_unchanged() {
        let (search, _) = fake("fake", |_| Ok(vec![hit("no url", "  ")]));
        let enriched = ImageEnricher::new(vec![search], 5)
            .enrich(ARTICLE)
            .expect("enrich");
        assert_eq!(enriched.markdown_content, ARTICLE);
        assert!(enriched.images.is_empty());
    }

    #[test]
    fn fails_when_every_search_errors() {
        let (search, _) = fake("fake", |_| Err(anyhow::anyhow!("unauthorized")));
        let err = ImageEnricher::new(vec![search], 5)
            .enrich(ARTICLE)
            .unwrap_err();
        assert_eq!(err.stage, Stage::Enrich);
        assert!(err.message.contains("unauthorized"), "{}", err.message);
    }

    #[test]
    fn skips_headings_inside_code_fences() {
        let content = "```markdown\n## Not a section\n```\n\n## Real Section\n";
        let (search, queries) = fake("fake", |_| Ok(Vec::new()));
        ImageEnricher::new(vec![search], 5)
            .enrich(content)
            .expect("enrich");
        assert_eq!(*queries.borrow(), vec!["Real Section".to_string()]);
    }

    #[test]
    fn section_heading_ignores_other_levels() {
        assert_eq!(section_heading("## Pacing ##"), Some("Pacing"));
        assert_eq!(section_heading("### Sub"), None);
        assert_eq!(section_heading("# Title"), None);
        assert_eq!(section_heading("##   "), None);
    }

    #[test]
    fn dataforseo_accepts_prefixed_credentials() {
        let search = DataForSeoSearch::from_credentials(" Basic dXNlcjpwYXNz ").expect("valid");
        assert_eq!(search.credentials, "dXNlcjpwYXNz");
        let bare = DataForSeoSearch::from_credentials("dXNlcjpwYXNz").expect("valid");
        assert_eq!(bare.credentials, "dXNlcjpwYXNz");
    }

    #[test]
    fn dataforseo_rejects_malformed_credentials() {
        let err = DataForSeoSearch::from_credentials("Basic not-base64-and-no-colon!!")
            .err()
            .expect("not base64");
        assert!(err.to_string().contains("base64"), "{err}");

        // "nocolon"
        let err = DataForSeoSearch::from_credentials("bm9jb2xvbg==")
            .err()
            .expect("no separator");
        assert!(err.to_string().contains("login:password"), "{err}");
    }
}
