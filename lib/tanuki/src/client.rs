//! The API client: transport executor and typed decoding.
//!
//! Every call goes through the same pipeline:
//!
//! 1. the client's default options, then the plan's options, are applied
//! 2. an ended [`Context`] fails the call before any I/O
//! 3. the request is materialized against the base URL
//! 4. a fresh tower stack is built for the call (see [`middleware`](crate::middleware))
//!    and driven by a [`RetryPolicy`] resolved from the options
//! 5. [`Client::send`] checks the status and decodes the declared [`ResultShape`]
//!
//! Only the last attempt's response or error is returned.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tower::retry::RetryLayer;
use tower::{ServiceBuilder, ServiceExt};
use tracing::debug;
use url::Url;

use crate::middleware::{CancelLayer, LogLevel, LoggingLayer, RateLimitLayer};
use crate::option::Decorations;
use crate::pager::{PageFuture, Pager};
use crate::{
    ClientConfig, Context, Error, HttpClient, HyperClient, List, Request, RequestOption,
    RequestPlan, RequestPlanBuilder, Response, Result, ResultShape, RetryConfig, RetryPolicy,
    Transport,
};

const API_PATH: &str = "api/v4";
const GRAPHQL_PATH: &str = "api/graphql";

/// Client for the REST and GraphQL APIs of one instance.
///
/// Cloning is cheap: clones share the transport and the rate limiter. The
/// client holds no per-call state, so one instance can serve concurrent
/// calls.
///
/// # Example
///
/// ```no_run
/// use serde::Deserialize;
/// use tanuki::{Client, RequestOption, RequestPlan, Single};
///
/// #[derive(Deserialize)]
/// struct Project {
///     id: u64,
///     path_with_namespace: String,
/// }
///
/// # async fn example() -> tanuki::Result<()> {
/// let client = Client::builder("https://gitlab.example.com")
///     .default_option(RequestOption::header("Private-Token", "glpat-xxx"))
///     .build()?;
///
/// let plan = RequestPlan::get("projects/{}").arg("group/app")?.build()?;
/// let (project, response) = client.send::<Single<Project>>(plan).await?;
/// println!("{} ({})", project.path_with_namespace, response.status());
/// # Ok(())
/// # }
/// ```
pub struct Client<C = HyperClient> {
    http: Arc<C>,
    base_url: Url,
    graphql_url: Url,
    user_agent: String,
    retry: RetryConfig,
    defaults: Vec<RequestOption>,
    limiter: Option<RateLimitLayer>,
    log_level: LogLevel,
}

impl<C> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            http: Arc::clone(&self.http),
            base_url: self.base_url.clone(),
            graphql_url: self.graphql_url.clone(),
            user_agent: self.user_agent.clone(),
            retry: self.retry.clone(),
            defaults: self.defaults.clone(),
            limiter: self.limiter.clone(),
            log_level: self.log_level,
        }
    }
}

impl<C> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("graphql_url", &self.graphql_url.as_str())
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .field("defaults", &self.defaults.len())
            .field("rate_limited", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl Client<HyperClient> {
    /// Start building a client for the instance at `base_url`.
    ///
    /// `https://gitlab.example.com` and `https://gitlab.example.com/api/v4/`
    /// name the same API.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }
}

impl<C> Client<C> {
    /// REST API base URL, always ending with `/api/v4/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GraphQL endpoint.
    #[must_use]
    pub const fn graphql_url(&self) -> &Url {
        &self.graphql_url
    }

    /// The underlying transport.
    #[must_use]
    pub fn http(&self) -> &C {
        &self.http
    }

    /// Retry settings used when a call does not override them.
    #[must_use]
    pub const fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }
}

impl<C> Client<C>
where
    C: HttpClient + 'static,
{
    /// Perform a call and return the final response, whatever its status.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOption`] if an option cannot be applied; nothing is sent
    /// - [`Error::Cancelled`] or [`Error::DeadlineExceeded`] if the call's
    ///   context ended before or during the call
    /// - [`Error::RetriesExhausted`] if the last attempt failed at the
    ///   transport level after the retry budget ran out
    /// - the transport error of the last attempt otherwise
    pub async fn execute(&self, plan: RequestPlan) -> Result<Response<Bytes>> {
        let mut decorations = Decorations::new(plan.query().to_vec());
        decorations.apply_all(self.defaults.iter().chain(plan.options()))?;

        let context = decorations.context.take().unwrap_or_default();
        if let Some(err) = context.err() {
            return Err(err);
        }

        let request = self.materialize(&plan, &decorations)?;
        let policy = self.policy(&mut decorations, context.clone());
        let transport = Transport::new(Arc::clone(&self.http));
        let stack = ServiceBuilder::new()
            .layer(RetryLayer::new(policy))
            .layer(CancelLayer::new(context))
            .layer(LoggingLayer::with_level(self.log_level));

        match &self.limiter {
            Some(limiter) => {
                stack
                    .layer(limiter.clone())
                    .service(transport)
                    .oneshot(request)
                    .await
            }
            None => stack.service(transport).oneshot(request).await,
        }
    }

    /// Perform a call and decode the body into the declared shape.
    ///
    /// `S` is [`Single<T>`](crate::Single), [`List<T>`](crate::List) or
    /// [`NoContent`](crate::NoContent). The response comes back alongside
    /// the value, so headers stay available.
    ///
    /// # Errors
    ///
    /// - any [`execute`](Self::execute) error
    /// - [`Error::NotFound`] for a 404 and [`Error::Http`] for any other
    ///   non-2xx status, both carrying the response
    /// - [`Error::Decode`], carrying the response, if the body does not
    ///   match the shape
    pub async fn send<S: ResultShape>(&self, plan: RequestPlan) -> Result<(S::Output, Response<Bytes>)> {
        let response = self.execute(plan).await?;
        if !response.is_success() {
            return Err(Error::from_response(response));
        }

        debug!(status = response.status(), shape = %S::KIND, "decoding response");
        match S::decode(&response) {
            Ok(value) => Ok((value, response)),
            Err(err) => Err(err.with_response(response)),
        }
    }

    /// Iterate over every item of a list endpoint, page after page.
    ///
    /// The builder is rebuilt for each page with the page's decorator
    /// appended to its options.
    pub fn paginate<T>(
        &self,
        builder: RequestPlanBuilder,
    ) -> Pager<T, impl FnMut(Option<RequestOption>) -> PageFuture<T> + Send + use<T, C>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        Pager::new(move |decorator: Option<RequestOption>| {
            let client = client.clone();
            let builder = builder.clone();
            Box::pin(async move {
                let builder = match decorator {
                    Some(option) => builder.option(option),
                    None => builder,
                };
                client.send::<List<T>>(builder.build()?).await
            }) as PageFuture<T>
        })
    }

    fn materialize(&self, plan: &RequestPlan, decorations: &Decorations) -> Result<Request<Bytes>> {
        let url = self.base_url.join(plan.path())?;

        let mut builder = Request::builder(plan.method(), url)
            .query_pairs(&decorations.query)
            .header("accept", "application/json")
            .header("user-agent", self.user_agent.clone());
        if let Some(body) = plan.body() {
            builder = builder
                .header("content-type", "application/json")
                .body(body.clone());
        }

        Ok(builder
            .headers(decorations.headers.iter().map(|(name, value)| (name.clone(), value.clone())))
            .build())
    }

    fn policy(&self, decorations: &mut Decorations, context: Context) -> RetryPolicy {
        let mut policy = RetryPolicy::new(&self.retry).context(context);
        if let Some(check) = decorations.retry.take() {
            policy = policy.check(check);
        }
        if let Some(backoff) = decorations.backoff.take() {
            policy = policy.backoff(backoff);
        }
        if let Some(max_attempts) = decorations.max_attempts {
            policy = policy.max_attempts(max_attempts);
        }
        policy
    }
}

/// Builder for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    graphql_url: Option<String>,
    user_agent: String,
    config: ClientConfig,
    retry: RetryConfig,
    defaults: Vec<RequestOption>,
    limiter: Option<RateLimitLayer>,
    log_level: LogLevel,
}

impl ClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            graphql_url: None,
            user_agent: concat!("tanuki/", env!("CARGO_PKG_VERSION")).to_string(),
            config: ClientConfig::default(),
            retry: RetryConfig::default(),
            defaults: Vec::new(),
            limiter: None,
            log_level: LogLevel::default(),
        }
    }

    /// Override the GraphQL endpoint (default: `<instance>/api/graphql`).
    #[must_use]
    pub fn graphql_url(mut self, url: impl Into<String>) -> Self {
        self.graphql_url = Some(url.into());
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Transport configuration, used by [`build`](Self::build).
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Retry settings.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Add an option applied to every call, before the call's own options.
    #[must_use]
    pub fn default_option(mut self, option: RequestOption) -> Self {
        self.defaults.push(option);
        self
    }

    /// Add several default options, in order.
    #[must_use]
    pub fn default_options(mut self, options: impl IntoIterator<Item = RequestOption>) -> Self {
        self.defaults.extend(options);
        self
    }

    /// Allow at most `count` requests per second across all calls.
    #[must_use]
    pub fn rate_limit_per_second(mut self, count: NonZeroU32) -> Self {
        self.limiter = Some(RateLimitLayer::per_second(count));
        self
    }

    /// Allow at most `count` requests per minute across all calls.
    #[must_use]
    pub fn rate_limit_per_minute(mut self, count: NonZeroU32) -> Self {
        self.limiter = Some(RateLimitLayer::per_minute(count));
        self
    }

    /// Level of the per-attempt request logs.
    #[must_use]
    pub const fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Build a client on the hyper transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for a malformed URL, or
    /// [`Error::InvalidOption`] for a malformed default option.
    pub fn build(self) -> Result<Client<HyperClient>> {
        let http = HyperClient::with_config(self.config.clone());
        self.build_with(http)
    }

    /// Build a client on a custom transport.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with<C: HttpClient>(self, http: C) -> Result<Client<C>> {
        let base_url = api_base_url(&self.base_url)?;
        let graphql_url = match &self.graphql_url {
            Some(url) => Url::parse(url)?,
            None => graphql_url(&base_url),
        };
        Decorations::default().apply_all(&self.defaults)?;

        Ok(Client {
            http: Arc::new(http),
            base_url,
            graphql_url,
            user_agent: self.user_agent,
            retry: self.retry,
            defaults: self.defaults,
            limiter: self.limiter,
            log_level: self.log_level,
        })
    }
}

/// Normalize to `<instance>/api/v4/`.
fn api_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    let path = url.path().trim_end_matches('/').to_string();
    let path = if path.ends_with(API_PATH) {
        format!("{path}/")
    } else {
        format!("{path}/{API_PATH}/")
    };
    url.set_path(&path);
    Ok(url)
}

/// `<instance>/api/graphql`, next to the REST API.
fn graphql_url(base_url: &Url) -> Url {
    let path = base_url.path().trim_end_matches('/');
    let root = path.strip_suffix(API_PATH).unwrap_or(path);
    let mut url = base_url.clone();
    url.set_path(&format!("{}/{GRAPHQL_PATH}", root.trim_end_matches('/')));
    url
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert2::{check, let_assert};

    use super::*;

    /// Records requests and answers with a fixed response.
    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<Request<Bytes>>>,
    }

    impl HttpClient for Recorder {
        async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
            self.requests.lock().expect("lock").push(request);
            Ok(Response::new(200, HashMap::new(), Bytes::from_static(b"{}")))
        }
    }

    fn client(base_url: &str) -> Client<Recorder> {
        Client::builder(base_url).build_with(Recorder::default()).expect("client")
    }

    #[test]
    fn base_url_is_normalized() {
        for raw in [
            "https://gitlab.example.com",
            "https://gitlab.example.com/",
            "https://gitlab.example.com/api/v4",
            "https://gitlab.example.com/api/v4/",
        ] {
            check!(client(raw).base_url().as_str() == "https://gitlab.example.com/api/v4/", "{raw}");
        }
        check!(client("https://example.com/gitlab").base_url().as_str() == "https://example.com/gitlab/api/v4/");
    }

    #[test]
    fn graphql_url_sits_next_to_rest_api() {
        check!(client("https://gitlab.example.com").graphql_url().as_str() == "https://gitlab.example.com/api/graphql");
        check!(client("https://example.com/gitlab/api/v4").graphql_url().as_str() == "https://example.com/gitlab/api/graphql");

        check!(
            client("https://example.com/api/v4api/v4").graphql_url().as_str()
                == "https://example.com/api/v4/api/graphql"
        );

        let custom = Client::builder("https://gitlab.example.com")
            .graphql_url("https://graph.example.com/graphql")
            .build_with(Recorder::default())
            .expect("client");
        check!(custom.graphql_url().as_str() == "https://graph.example.com/graphql");
    }

    #[test]
    fn invalid_base_url_fails() {
        let_assert!(Err(Error::InvalidUrl(_)) = Client::builder("not a url").build_with(Recorder::default()));
    }

    #[test]
    fn malformed_default_option_fails_build() {
        let result = Client::builder("https://gitlab.example.com")
            .default_option(RequestOption::header("bad header", "x"))
            .build_with(Recorder::default());
        let_assert!(Err(Error::InvalidOption(_)) = result);
    }

    #[tokio::test]
    async fn materializes_headers_query_and_body() {
        let client = Client::builder("https://gitlab.example.com")
            .user_agent("tanuki-tests")
            .default_option(RequestOption::header("Private-Token", "default"))
            .build_with(Recorder::default())
            .expect("client");

        let plan = RequestPlan::post("projects/{}/labels")
            .arg("group/app")
            .and_then(|b| b.params(&serde_json::json!({"name": "bug"})))
            .expect("builder")
            .option(RequestOption::header("private-token", "per-call"))
            .option(RequestOption::query("dry_run", "true"))
            .build()
            .expect("plan");
        client.execute(plan).await.expect("response");

        let requests = client.http().requests.lock().expect("lock");
        let_assert!([request] = requests.as_slice());
        check!(request.url().as_str() == "https://gitlab.example.com/api/v4/projects/group%2Fapp/labels?dry_run=true");
        check!(request.header("private-token") == Some("per-call"));
        check!(request.header("user-agent") == Some("tanuki-tests"));
        check!(request.header("accept") == Some("application/json"));
        check!(request.header("content-type") == Some("application/json"));
        check!(request.body().map(Bytes::as_ref) == Some(br#"{"name":"bug"}"#.as_slice()));
    }

    #[tokio::test]
    async fn dot_segment_ids_never_reach_the_transport() {
        let client = client("https://gitlab.example.com");

        for id in ["..", "."] {
            let_assert!(Err(Error::InvalidId(_)) = RequestPlan::delete("projects/{}/issues").arg(id));
        }

        let plan = RequestPlan::delete("projects/{}/issues")
            .arg("group/..")
            .and_then(RequestPlanBuilder::build)
            .expect("plan");
        client.execute(plan).await.expect("response");

        let requests = client.http().requests.lock().expect("lock");
        let_assert!([request] = requests.as_slice());
        check!(request.url().as_str() == "https://gitlab.example.com/api/v4/projects/group%2F%2E%2E/issues");
    }

    #[tokio::test]
    async fn ended_context_sends_nothing() {
        let client = client("https://gitlab.example.com");
        let context = Context::new();
        context.cancel();

        let plan = RequestPlan::get("version")
            .option(RequestOption::context(context))
            .build()
            .expect("plan");
        let_assert!(Err(Error::Cancelled) = client.execute(plan).await);
        check!(client.http().requests.lock().expect("lock").is_empty());
    }

    #[test]
    fn debug_hides_transport() {
        let rendered = format!("{:?}", client("https://gitlab.example.com"));
        check!(rendered.contains("https://gitlab.example.com/api/v4/"));
    }
}
