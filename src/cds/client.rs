//! Client for the Climate Data Store web API.
//!
//! A retrieval is submitted to `resources/<dataset>`, then polled at
//! `tasks/<request_id>` until the server has finished preparing the file,
//! which is then streamed from the location in the final reply. The file only
//! appears at its target once its length matches the reply's `content_length`.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use indicatif::ProgressBar;
use reqwest::{Client, RequestBuilder, Response, Url};
use tracing::{debug, info, instrument, warn};

use super::{CdsConfig, CdsError, PollSchedule, TaskReply, TaskState};
use crate::{
    download::{save_verified, show_download_size},
    request::{RequestPayload, Retrieve},
};

pub struct CdsClient {
    http: Client,
    config: CdsConfig,
    poll: PollSchedule,
}

impl CdsClient {
    pub fn new(config: CdsConfig) -> Result<Self, CdsError> {
        config.credentials()?;
        Url::parse(&config.url).map_err(|_| CdsError::InvalidUrl(config.url.clone()))?;

        let http = Client::builder()
            .danger_accept_invalid_certs(!config.verify)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            config,
            poll: PollSchedule::default(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorised(&self, builder: RequestBuilder) -> Result<RequestBuilder, CdsError> {
        let (uid, key) = self.config.credentials()?;
        Ok(builder.basic_auth(uid, Some(key)))
    }

    /// Download locations may be absolute or relative to the API url.
    pub fn resolve_location(&self, location: &str) -> Result<Url, CdsError> {
        let base = format!("{}/", self.config.url.trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|base| base.join(location))
            .map_err(|_| CdsError::InvalidUrl(location.to_string()))
    }

    #[instrument(skip(self, request), fields(variable = %request.variable))]
    pub async fn submit(
        &self,
        dataset: &str,
        request: &RequestPayload,
    ) -> Result<TaskReply, CdsError> {
        let url = self.endpoint(&format!("resources/{}", dataset));
        let response = self.authorised(self.http.post(url))?.json(request).send().await?;
        let reply = read_reply(response).await?;

        info!(state = %reply.state, request_id = ?reply.request_id, "Request submitted");

        Ok(reply)
    }

    /// Polls until the task completes or fails.
    pub async fn wait(
        &self,
        reply: TaskReply,
        label: &str,
        progress: &ProgressBar,
    ) -> Result<TaskReply, CdsError> {
        wait_for_task(self, &self.poll, reply, label, progress).await
    }

    async fn delete_task(&self, request_id: &str) {
        let url = self.endpoint(&format!("tasks/{}", request_id));
        let result = async {
            self.authorised(self.http.delete(url))?.send().await?;
            Ok::<_, CdsError>(())
        }
        .await;

        if let Err(e) = result {
            warn!(request_id = %request_id, error = %e, "Failed to delete task");
        }
    }
}

/// Current state of a submitted request.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn task(&self, request_id: &str) -> Result<TaskReply, CdsError>;
}

#[async_trait]
impl TaskSource for CdsClient {
    async fn task(&self, request_id: &str) -> Result<TaskReply, CdsError> {
        let url = self.endpoint(&format!("tasks/{}", request_id));
        let response = self.authorised(self.http.get(url))?.send().await?;

        read_reply(response).await
    }
}

/// Polls `source` on `poll`'s schedule until the task completes or fails.
pub async fn wait_for_task<T: TaskSource + ?Sized>(
    source: &T,
    poll: &PollSchedule,
    mut reply: TaskReply,
    label: &str,
    progress: &ProgressBar,
) -> Result<TaskReply, CdsError> {
    let mut delay = poll.initial;

    loop {
        match reply.state {
            TaskState::Completed => return Ok(reply),
            TaskState::Failed => {
                let error = reply.error.unwrap_or_default();
                return Err(CdsError::TaskFailed {
                    message: error.message,
                    reason: error.reason,
                });
            }
            TaskState::Queued | TaskState::Running => {
                let request_id = reply.request_id.clone().ok_or(CdsError::MissingRequestId)?;
                progress.set_message(format!("{}: {}", label, reply.state));
                debug!(request_id = %request_id, state = %reply.state, delay = ?delay, "Polling task");

                tokio::time::sleep(delay).await;
                delay = poll.next(delay);
                reply = source.task(&request_id).await?;
            }
            TaskState::Unknown => {
                return Err(CdsError::UnknownState(reply.state.to_string()));
            }
        }
    }
}

async fn read_reply(response: Response) -> Result<TaskReply, CdsError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CdsError::Status { status, message });
    }

    Ok(response.json::<TaskReply>().await?)
}

#[async_trait]
impl Retrieve for CdsClient {
    async fn retrieve(
        &self,
        dataset: &str,
        request: &RequestPayload,
        target: &Path,
        progress: &ProgressBar,
    ) -> anyhow::Result<()> {
        let label = request.describe();

        let reply = self.submit(dataset, request).await?;
        let reply = self.wait(reply, &label, progress).await?;
        let location = reply.location.as_deref().ok_or(CdsError::MissingLocation)?;
        let url = self.resolve_location(location)?;

        progress.set_message(format!("{}: downloading", label));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(CdsError::from)?;

        if let Some(total) = reply.content_length.or(response.content_length()) {
            show_download_size(progress, total)?;
        }

        let written =
            save_verified(response.bytes_stream(), target, reply.content_length, progress).await?;

        info!(path = %target.display(), bytes = written, "Download complete");

        if let Some(request_id) = reply.request_id.as_deref() {
            self.delete_task(request_id).await;
        }

        Ok(())
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::{collections::VecDeque, sync::Mutex};

    use reqwest::StatusCode;

    use super::*;
    use crate::cds::reply::TaskError;

    /// Hands out scripted replies in order and records the ids it was asked for.
    struct ScriptedTasks {
        replies: Mutex<VecDeque<Result<TaskReply, CdsError>>>,
        asked: Mutex<Vec<String>>,
    }

    impl ScriptedTasks {
        fn new(replies: Vec<Result<TaskReply, CdsError>>) -> Self {
            ScriptedTasks {
                replies: Mutex::new(replies.into()),
                asked: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl TaskSource for ScriptedTasks {
        async fn task(&self, request_id: &str) -> Result<TaskReply, CdsError> {
            self.asked.lock().unwrap().push(request_id.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CdsError::MissingRequestId))
        }
    }

    fn quick_poll() -> PollSchedule {
        PollSchedule {
            initial: Duration::from_millis(1),
            factor: 1.5,
            max: Duration::from_millis(5),
        }
    }

    fn config(url: &str) -> CdsConfig {
        CdsConfig {
            url: url.to_string(),
            key: "12345:abc-def".to_string(),
            verify: true,
        }
    }

    fn reply(state: TaskState) -> TaskReply {
        TaskReply {
            state,
            request_id: Some("a1b2c3".to_string()),
            location: None,
            content_length: None,
            error: None,
        }
    }

    #[test]
    fn should_reject_bad_key() {
        let mut config = config("https://cds.climate.copernicus.eu/api/v2");
        config.key = "abc".to_string();

        assert!(matches!(CdsClient::new(config), Err(CdsError::InvalidKey)));
    }

    #[test]
    fn should_reject_bad_url() {
        let result = CdsClient::new(config("not a url"));

        assert!(matches!(result, Err(CdsError::InvalidUrl(_))));
    }

    #[test]
    fn should_build_endpoints() {
        let client = CdsClient::new(config("https://cds.climate.copernicus.eu/api/v2/")).unwrap();

        assert_eq!(
            client.endpoint("resources/reanalysis-era5-single-levels"),
            "https://cds.climate.copernicus.eu/api/v2/resources/reanalysis-era5-single-levels"
        );
    }

    #[test]
    fn should_resolve_locations() {
        let client = CdsClient::new(config("https://cds.climate.copernicus.eu/api/v2")).unwrap();

        let absolute = client
            .resolve_location("https://download-0001.copernicus-climate.eu/cache/adaptor.nc")
            .unwrap();
        assert_eq!(
            absolute.as_str(),
            "https://download-0001.copernicus-climate.eu/cache/adaptor.nc"
        );

        let relative = client.resolve_location("tasks/a1b2c3/result.nc").unwrap();
        assert_eq!(
            relative.as_str(),
            "https://cds.climate.copernicus.eu/api/v2/tasks/a1b2c3/result.nc"
        );
    }

    #[tokio::test]
    async fn should_return_completed_reply_without_polling() {
        let client = CdsClient::new(config("https://cds.climate.copernicus.eu/api/v2")).unwrap();

        let done = client
            .wait(reply(TaskState::Completed), "skin_temperature 1979-1990", &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(done.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn should_surface_task_failure() {
        let client = CdsClient::new(config("https://cds.climate.copernicus.eu/api/v2")).unwrap();
        let mut failed = reply(TaskState::Failed);
        failed.error = Some(TaskError {
            message: "the request you have submitted is not valid".to_string(),
            reason: "Ambiguous".to_string(),
        });

        let err = client
            .wait(failed, "skin_temperature 1979-1990", &ProgressBar::hidden())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "CDS request failed: the request you have submitted is not valid (Ambiguous)"
        );
    }

    #[tokio::test]
    async fn should_require_request_id_to_poll() {
        let client = CdsClient::new(config("https://cds.climate.copernicus.eu/api/v2")).unwrap();
        let mut queued = reply(TaskState::Queued);
        queued.request_id = None;

        let result = client
            .wait(queued, "skin_temperature 1979-1990", &ProgressBar::hidden())
            .await;

        assert!(matches!(result, Err(CdsError::MissingRequestId)));
    }

    #[tokio::test]
    async fn should_reject_unknown_state() {
        let client = CdsClient::new(config("https://cds.climate.copernicus.eu/api/v2")).unwrap();

        let result = client
            .wait(reply(TaskState::Unknown), "skin_temperature 1979-1990", &ProgressBar::hidden())
            .await;

        assert!(matches!(result, Err(CdsError::UnknownState(_))));
    }

    #[tokio::test]
    async fn should_poll_until_completed() {
        let mut done = reply(TaskState::Completed);
        done.location = Some("https://download-0001.copernicus-climate.eu/cache/adaptor.nc".to_string());
        done.content_length = Some(52311040);
        let tasks = ScriptedTasks::new(vec![Ok(reply(TaskState::Running)), Ok(done)]);

        let result = wait_for_task(
            &tasks,
            &quick_poll(),
            reply(TaskState::Queued),
            "skin_temperature 1979-1990",
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(result.state, TaskState::Completed);
        assert_eq!(result.content_length, Some(52311040));
        assert_eq!(*tasks.asked.lock().unwrap(), vec!["a1b2c3", "a1b2c3"]);
    }

    #[tokio::test]
    async fn should_fail_when_polled_task_fails() {
        let mut failed = reply(TaskState::Failed);
        failed.error = Some(TaskError {
            message: "Request too large".to_string(),
            reason: "cost limits exceeded".to_string(),
        });
        let tasks = ScriptedTasks::new(vec![Ok(reply(TaskState::Queued)), Ok(failed)]);

        let result = wait_for_task(
            &tasks,
            &quick_poll(),
            reply(TaskState::Queued),
            "skin_temperature 2015-2018",
            &ProgressBar::hidden(),
        )
        .await;

        assert!(matches!(result, Err(CdsError::TaskFailed { ref reason, .. }) if reason == "cost limits exceeded"));
        assert_eq!(tasks.asked.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_stop_polling_on_server_error() {
        let tasks = ScriptedTasks::new(vec![Err(CdsError::Status {
            status: StatusCode::UNAUTHORIZED,
            message: "Authorization Required".to_string(),
        })]);

        let result = wait_for_task(
            &tasks,
            &quick_poll(),
            reply(TaskState::Running),
            "skin_temperature 1991-2002",
            &ProgressBar::hidden(),
        )
        .await;

        assert!(matches!(
            result,
            Err(CdsError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED
        ));
        assert_eq!(tasks.asked.lock().unwrap().len(), 1);
    }
}
