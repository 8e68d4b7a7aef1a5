//! Hydra JSON API client.

use crate::error::{BuildError, Result};
use crate::hydra::{BuildStatus, BuildSystem};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Deserialize)]
struct EvalPage {
    #[serde(default)]
    evals: Vec<Evaluation>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    id: serde_json::Value,
    #[serde(default)]
    jobsetevalinputs: HashMap<String, EvalInput>,
}

#[derive(Debug, Deserialize)]
struct EvalInput {
    #[serde(default)]
    revision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Build {
    #[serde(default)]
    finished: u8,
    #[serde(default)]
    buildstatus: Option<i64>,
    #[serde(default)]
    nixname: String,
}

impl Evaluation {
    fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Any input pinned to `commit` counts as a match
    fn built_commit(&self, commit: &str) -> bool {
        self.jobsetevalinputs
            .values()
            .any(|input| input.revision.as_deref() == Some(commit))
    }
}

/// Client for one Hydra project
#[derive(Debug, Clone)]
pub struct HydraClient {
    http: reqwest::Client,
    base: Url,
    project: String,
}

impl HydraClient {
    /// Client for `project` on the Hydra instance at `base`
    pub fn new(base: Url, project: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base, project)
    }

    /// Client using a preconfigured HTTP client
    pub fn with_http(http: reqwest::Client, mut base: Url, project: impl Into<String>) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http,
            base,
            project: project.into(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| {
            BuildError::InvalidResponse {
                url: format!("{}{path}", self.base),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &Url) -> Result<T> {
        log::debug!("GET {url}");
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        response.json::<T>().await.map_err(|e| {
            BuildError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl BuildSystem for HydraClient {
    async fn find_evaluation(&self, branch: &str, commit: &str) -> Result<Option<String>> {
        let first = self.endpoint(&format!("jobset/{}/{branch}/evals", self.project))?;
        let mut next = Some(first.clone());

        while let Some(url) = next.take() {
            let page: EvalPage = self.get_json(&url).await?;
            if let Some(eval) = page.evals.iter().find(|e| e.built_commit(commit)) {
                return Ok(Some(eval.id_string()));
            }
            next = match page.next.as_deref().filter(|n| !n.is_empty()) {
                Some(rel) => Some(first.join(rel).map_err(|e| BuildError::InvalidResponse {
                    url: url.to_string(),
                    reason: format!("bad pagination link '{rel}': {e}"),
                })?),
                None => None,
            };
        }
        Ok(None)
    }

    async fn get_build(&self, eval_id: &str, job: &str) -> Result<BuildStatus> {
        let url = self.endpoint(&format!("eval/{eval_id}/job/{job}"))?;
        let build: Build = self.get_json(&url).await?;
        Ok(BuildStatus {
            finished: build.finished == 1,
            succeeded: build.finished == 1 && build.buildstatus == Some(0),
            artifact_name: build.nixname,
        })
    }

    fn evaluations_url(&self, branch: &str) -> String {
        format!(
            "{}/jobset/{}/{branch}/evals",
            self.base.as_str().trim_end_matches('/'),
            self.project
        )
    }

    fn build_url(&self, eval_id: &str, job: &str) -> String {
        format!("{}/eval/{eval_id}/job/{job}", self.base.as_str().trim_end_matches('/'))
    }
}
