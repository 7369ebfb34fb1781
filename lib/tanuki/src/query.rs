//! GraphQL calls.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::graphql::{FragmentRegistry, GraphQlRequest, GraphQlResponse, GraphQlVariables, Operation};
use crate::{Client, Error, HttpClient, RequestOption, RequestPlan, Response, Result};

impl<C> Client<C>
where
    C: HttpClient + 'static,
{
    /// Post a compiled request to the GraphQL endpoint and decode `data`.
    ///
    /// The call runs through the same retry and option pipeline as REST
    /// calls.
    ///
    /// # Errors
    ///
    /// - any [`execute`](Self::execute) error
    /// - [`Error::Http`] or [`Error::NotFound`] for a non-2xx status
    /// - [`Error::GraphQl`] when the `errors` array is not empty, even with
    ///   a 200 status
    /// - [`Error::Decode`] if the envelope or `data` does not decode as `T`
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        request: &GraphQlRequest,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<(T, Response<Bytes>)> {
        let plan = RequestPlan::post(self.graphql_url().as_str())
            .params(request)?
            .options(options)
            .build()?;

        let response = self.execute(plan).await?;
        if !response.is_success() {
            return Err(Error::from_response(response));
        }

        let envelope: GraphQlResponse<T> = match response.json() {
            Ok(envelope) => envelope,
            Err(err) => return Err(err.with_response(response)),
        };
        debug!(
            query_len = request.query.len(),
            errors = envelope.errors.as_ref().map_or(0, Vec::len),
            "graphql response"
        );

        match envelope.into_data() {
            Ok(data) => Ok((data, response)),
            Err(err) => Err(err.with_response(response)),
        }
    }

    /// Compile an operation with its variables, then run it.
    ///
    /// # Errors
    ///
    /// Any [`Operation::compile`] error, before anything is sent, or any
    /// [`graphql`](Self::graphql) error.
    pub async fn query<T, V>(
        &self,
        operation: &Operation,
        registry: &FragmentRegistry,
        variables: &V,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<(T, Response<Bytes>)>
    where
        T: DeserializeOwned,
        V: GraphQlVariables + ?Sized,
    {
        let request = operation.compile(registry, variables)?;
        self.graphql(&request, options).await
    }
}
