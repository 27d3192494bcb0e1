use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client as AsyncClient, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use super::types::{
    ApiError, Collection, Container, PullTask, Service, ServiceConsumeMap, ServiceLink,
    SetServiceLinksInput, Stack,
};
use crate::consts::VERSION;
use crate::errors::{Error, Result};

/// Everything the reconciliation engine needs from the remote platform:
/// lookup by name and scope, create, named actions, reload and list. All
/// calls are synchronous request/response; "not found" is a normal absent
/// signal only on the find paths.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn find_stack(&self, name: &str) -> Result<Option<Stack>>;
    async fn create_stack(&self, stack: &Stack) -> Result<Stack>;
    async fn reload_stack(&self, stack: &Stack) -> Result<Stack>;

    async fn find_service(&self, name: &str, stack_id: &str) -> Result<Option<Service>>;
    async fn create_service(&self, service: &Service) -> Result<Service>;
    async fn reload_service(&self, service: &Service) -> Result<Service>;
    async fn service_action(
        &self,
        service: &Service,
        action: &str,
        input: Option<Value>,
    ) -> Result<Service>;
    async fn list_service_links(&self, service: &Service) -> Result<Vec<ServiceLink>>;
    async fn set_service_links(
        &self,
        service: &Service,
        links: &[ServiceLink],
    ) -> Result<Service>;

    async fn find_container(&self, name: &str, stack_id: &str) -> Result<Option<Container>>;
    async fn create_container(&self, container: &Container) -> Result<Container>;
    async fn reload_container(&self, container: &Container) -> Result<Container>;

    async fn create_pull_task(&self, task: &PullTask) -> Result<PullTask>;
    async fn reload_pull_task(&self, task: &PullTask) -> Result<PullTask>;
}

#[derive(Debug, Clone)]
pub struct RancherClient {
    pub client: AsyncClient,
    pub base_url: String,
    access_key: String,
    secret_key: String,
}

impl RancherClient {
    pub fn new(base_url: String, access_key: String, secret_key: String) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert("accept", "application/json".parse().unwrap());

        let ua = format!(
            "corral/{VERSION} on {}",
            sys_info::os_type().unwrap_or_else(|_| "unknown".to_string())
        );

        Ok(Self {
            client: AsyncClient::builder()
                .user_agent(ua)
                .default_headers(headers)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
            secret_key,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.access_key, Some(&self.secret_key))
    }

    async fn handle_response<T>(&self, response: Response) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();

        if !status.is_success() {
            return Err(self.handle_error(response, status).await);
        }

        Ok(response.json::<T>().await?)
    }

    async fn handle_error(&self, response: Response, status: StatusCode) -> Error {
        match response.json::<ApiError>().await {
            Ok(body) if !body.message.is_empty() => Error::Api(body.message),
            Ok(body) if !body.code.is_empty() => Error::Api(body.code),
            _ => Error::Api(format!("HTTP {status}")),
        }
    }

    async fn get<T>(&self, url: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        log::debug!("GET {url} {query:?}");

        let response = self.request(Method::GET, url).query(query).send().await?;

        self.handle_response(response).await
    }

    async fn post<T>(&self, url: &str, body: &Value) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        log::debug!("POST {url}");

        let response = self.request(Method::POST, url).json(body).send().await?;

        self.handle_response(response).await
    }

    fn collection_url(&self, kind: &str) -> String {
        format!("{}/{kind}", self.base_url)
    }

    /// Follow the resource's own self link when it has one.
    fn self_url<'a>(&self, links: &'a std::collections::BTreeMap<String, String>) -> Option<&'a str> {
        links.get("self").map(String::as_str)
    }

    async fn find_first<T>(&self, kind: &str, name: &str, stack_id: Option<&str>) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut query = vec![("name", name), ("removed_null", "")];
        if let Some(stack_id) = stack_id {
            query.push(("stackId", stack_id));
        }

        let response = self
            .request(Method::GET, &self.collection_url(kind))
            .query(&query)
            .send()
            .await?;

        // absence is a normal signal on the lookup-by-name path only
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let collection: Collection<T> = self.handle_response(response).await?;

        Ok(collection.data.into_iter().next())
    }

    async fn action<T>(
        &self,
        actions: &std::collections::BTreeMap<String, String>,
        name: &str,
        action: &str,
        input: Option<Value>,
    ) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = actions
            .get(action)
            .ok_or_else(|| Error::Api(format!("action {action} is not available on {name}")))?;

        self.post(url, &input.unwrap_or(Value::Null)).await
    }
}

#[async_trait]
impl Platform for RancherClient {
    async fn find_stack(&self, name: &str) -> Result<Option<Stack>> {
        self.find_first("stacks", name, None).await
    }

    async fn create_stack(&self, stack: &Stack) -> Result<Stack> {
        self.post(&self.collection_url("stacks"), &serde_json::to_value(stack)?)
            .await
    }

    async fn reload_stack(&self, stack: &Stack) -> Result<Stack> {
        match self.self_url(&stack.links) {
            Some(url) => self.get(url, &[]).await,
            None => {
                self.get(&format!("{}/{}", self.collection_url("stacks"), stack.id), &[])
                    .await
            }
        }
    }

    async fn find_service(&self, name: &str, stack_id: &str) -> Result<Option<Service>> {
        self.find_first("services", name, Some(stack_id)).await
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        self.post(
            &self.collection_url("services"),
            &serde_json::to_value(service)?,
        )
        .await
    }

    async fn reload_service(&self, service: &Service) -> Result<Service> {
        match self.self_url(&service.links) {
            Some(url) => self.get(url, &[]).await,
            None => {
                self.get(
                    &format!("{}/{}", self.collection_url("services"), service.id),
                    &[],
                )
                .await
            }
        }
    }

    async fn service_action(
        &self,
        service: &Service,
        action: &str,
        input: Option<Value>,
    ) -> Result<Service> {
        self.action(&service.actions, &service.name, action, input)
            .await
    }

    async fn list_service_links(&self, service: &Service) -> Result<Vec<ServiceLink>> {
        let collection: Collection<ServiceConsumeMap> = self
            .get(
                &self.collection_url("serviceconsumemaps"),
                &[("serviceId", service.id.as_str()), ("removed_null", "")],
            )
            .await?;

        Ok(collection
            .data
            .into_iter()
            .map(|link| ServiceLink {
                name: link.name,
                service_id: link.consumed_service_id,
            })
            .collect())
    }

    async fn set_service_links(
        &self,
        service: &Service,
        links: &[ServiceLink],
    ) -> Result<Service> {
        let input = SetServiceLinksInput {
            service_links: links.to_vec(),
        };

        self.action(
            &service.actions,
            &service.name,
            "setservicelinks",
            Some(serde_json::to_value(input)?),
        )
        .await
    }

    async fn find_container(&self, name: &str, stack_id: &str) -> Result<Option<Container>> {
        self.find_first("containers", name, Some(stack_id)).await
    }

    async fn create_container(&self, container: &Container) -> Result<Container> {
        self.post(
            &self.collection_url("containers"),
            &serde_json::to_value(container)?,
        )
        .await
    }

    async fn reload_container(&self, container: &Container) -> Result<Container> {
        match self.self_url(&container.links) {
            Some(url) => self.get(url, &[]).await,
            None => {
                self.get(
                    &format!("{}/{}", self.collection_url("containers"), container.id),
                    &[],
                )
                .await
            }
        }
    }

    async fn create_pull_task(&self, task: &PullTask) -> Result<PullTask> {
        self.post(
            &self.collection_url("pulltasks"),
            &serde_json::to_value(task)?,
        )
        .await
    }

    async fn reload_pull_task(&self, task: &PullTask) -> Result<PullTask> {
        match self.self_url(&task.links) {
            Some(url) => self.get(url, &[]).await,
            None => {
                self.get(
                    &format!("{}/{}", self.collection_url("pulltasks"), task.id),
                    &[],
                )
                .await
            }
        }
    }
}
