use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

use crate::application::content::{ApiError, ContentApi, NeighborDirection};
use crate::config::ContentApiSettings;
use crate::domain::posts::{PageLocator, PostDetail, PostPage, PostRef};
use crate::infra::error::InfraError;

use super::wire::{PageDocument, PostDocument};

static USER_AGENT: &str = concat!("edicola/", env!("CARGO_PKG_VERSION"));

/// `ContentApi` implementation over the real HTTP service.
pub struct HttpContentApi {
    client: Client,
    base_url: Url,
}

impl HttpContentApi {
    pub fn new(settings: &ContentApiSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| {
                InfraError::http_client(format!("failed to build content api client: {err}"))
            })?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn posts_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("http(s) urls always have path segments")
            .pop_if_empty()
            .push("posts");
        url
    }

    fn post_url(&self, id: &str) -> Url {
        let mut url = self.posts_url();
        url.path_segments_mut()
            .expect("http(s) urls always have path segments")
            .push(id);
        url
    }

    /// Locators are minted by the API itself; anything pointing at another
    /// origin is refused rather than dereferenced.
    fn verify_locator(&self, locator: &PageLocator) -> Result<Url, ApiError> {
        let url = Url::parse(locator.as_str())
            .map_err(|_| ApiError::ForeignLocator(locator.as_str().to_string()))?;

        let same_origin = url.scheme() == self.base_url.scheme()
            && url.host_str() == self.base_url.host_str()
            && url.port_or_known_default() == self.base_url.port_or_known_default();
        if !same_origin {
            return Err(ApiError::ForeignLocator(locator.as_str().to_string()));
        }

        Ok(url)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let path = url.path().to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                path,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::decode(err.to_string()))
    }

    async fn fetch_page(&self, url: Url) -> Result<PostPage, ApiError> {
        let document: PageDocument = self.fetch_json(url).await?;
        document.try_into()
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn first_page(&self, page_size: u32) -> Result<PostPage, ApiError> {
        let mut url = self.posts_url();
        url.query_pairs_mut()
            .append_pair("page_size", &page_size.to_string());
        self.fetch_page(url).await
    }

    async fn next_page(&self, locator: &PageLocator) -> Result<PostPage, ApiError> {
        let url = self.verify_locator(locator)?;
        self.fetch_page(url).await
    }

    async fn post(&self, id: &str) -> Result<Option<PostDetail>, ApiError> {
        let url = self.post_url(id);
        let path = url.path().to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                path,
            });
        }

        let document: PostDocument = response
            .json()
            .await
            .map_err(|err| ApiError::decode(err.to_string()))?;
        Ok(Some(document.try_into()?))
    }

    async fn neighbor(
        &self,
        published_at: OffsetDateTime,
        direction: NeighborDirection,
    ) -> Result<Option<PostRef>, ApiError> {
        let timestamp = published_at
            .format(&Rfc3339)
            .expect("rfc 3339 formatting does not fail");

        let mut url = self.posts_url();
        {
            let mut pairs = url.query_pairs_mut();
            match direction {
                NeighborDirection::Before => {
                    pairs.append_pair("published_before", &timestamp);
                    pairs.append_pair("order", "desc");
                }
                NeighborDirection::After => {
                    pairs.append_pair("published_after", &timestamp);
                    pairs.append_pair("order", "asc");
                }
            }
            pairs.append_pair("page_size", "1");
        }

        let page: PageDocument = self.fetch_json(url).await?;
        let Some(first) = page.results.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(PostRef {
            id: first.id,
            title: first.title,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_api(base: &str) -> HttpContentApi {
        let settings = ContentApiSettings {
            base_url: Url::parse(base).unwrap(),
            page_size: 20,
            timeout_secs: 10,
        };
        HttpContentApi::new(&settings).unwrap()
    }

    #[test]
    fn post_urls_nest_under_the_base_path() {
        let api = make_api("https://cms.example.com/api/");
        assert_eq!(
            api.post_url("my-post").as_str(),
            "https://cms.example.com/api/posts/my-post"
        );

        let api = make_api("https://cms.example.com/api");
        assert_eq!(
            api.posts_url().as_str(),
            "https://cms.example.com/api/posts"
        );
    }

    #[test]
    fn locators_on_the_configured_origin_are_accepted() {
        let api = make_api("https://cms.example.com/api");
        let locator = PageLocator::new("https://cms.example.com/api/posts?page=2");

        let url = api.verify_locator(&locator).unwrap();
        assert_eq!(url.as_str(), "https://cms.example.com/api/posts?page=2");
    }

    #[test]
    fn locators_pointing_elsewhere_are_rejected() {
        let api = make_api("https://cms.example.com/api");

        for locator in [
            "https://evil.example.net/api/posts?page=2",
            "http://cms.example.com/api/posts?page=2",
            "https://cms.example.com:8443/api/posts?page=2",
            "not a url",
        ] {
            let error = api.verify_locator(&PageLocator::new(locator)).unwrap_err();
            assert!(matches!(error, ApiError::ForeignLocator(_)), "{locator}");
        }
    }
}
