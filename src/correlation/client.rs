//! Request/response correlation against the build service.
//!
//! A request goes out on `{command}/{correlation_id}` after subscribing to
//! `response/{command}/{correlation_id}`. The response names a job id; the client then
//! swaps the response subscription for `result/{job_id}` and drops that one too once
//! the result arrives. Bookkeeping is keyed by correlation id and job id so each
//! outstanding request holds at most one subscription of each kind.
//!
//! Abandoned requests are never expired: a response or result that does not arrive
//! keeps its subscription for the lifetime of the client.

use std::collections::HashMap;

use super::payload::{self, Job, JobReport, JobResponse, JobResult};
use super::topics::{self, Command, CorrelationId, JobId, Route};
use crate::bridge::{InboundMessage, Transport};

/// What a dispatched message amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Response handled, now subscribed to the job's result topic.
    AwaitingResult { command: Command, job_id: JobId },
    /// Result handled.
    Finished(JobReport),
    /// Retained sketch differed from the editor; the editor has to show this source.
    SketchReplaced(String),
    /// Retained sketch matched the editor already.
    SketchUnchanged,
    /// Payload could not be handled. Already logged.
    Failed { route: &'static str, reason: String },
    /// Nothing to do (unknown topic, other sketch, stale response).
    Ignored,
}

pub struct CorrelationClient<T: Transport> {
    transport: T,
    /// Open sketch name, without `.ino`
    sketch: String,
    /// Last known editor content
    editor_source: String,
    pending_responses: HashMap<CorrelationId, Command>,
    pending_results: HashMap<JobId, Command>,
}

impl<T: Transport> CorrelationClient<T> {
    pub fn new(transport: T, sketch: impl Into<String>) -> Self {
        Self {
            transport,
            sketch: sketch.into(),
            editor_source: String::new(),
            pending_responses: HashMap::new(),
            pending_results: HashMap::new(),
        }
    }

    pub fn sketch(&self) -> &str {
        &self.sketch
    }

    pub fn editor_source(&self) -> &str {
        &self.editor_source
    }

    /// Record an edit made in the UI so sketch sync compares against it.
    pub fn set_editor_source(&mut self, source: String) {
        self.editor_source = source;
    }

    /// Number of live response and result subscriptions.
    pub fn outstanding(&self) -> usize {
        self.pending_responses.len() + self.pending_results.len()
    }

    /// Swap in the handle of a new broker connection and hand back the old one.
    ///
    /// Pending requests are kept; [`CorrelationClient::resubscribe`] restores their
    /// topics once the new connection is up.
    pub fn replace_transport(&mut self, transport: T) -> T {
        std::mem::replace(&mut self.transport, transport)
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a job to the build service.
    ///
    /// The response subscription is in place before anything is published, a fast
    /// service cannot answer into the void. The sketch is also published retained on
    /// `sketch/{name}` for other editors.
    pub fn submit(&mut self, command: Command, sketch: &str, source: &str) -> anyhow::Result<CorrelationId> {
        let correlation_id = CorrelationId::generate();
        let response_topic = topics::response_topic(command, &correlation_id);
        let job = Job::new(topics::sketch_file_name(sketch), source);
        let body = job.to_bytes()?;

        self.transport.subscribe(&response_topic)?;
        self.pending_responses.insert(correlation_id.clone(), command);

        let published = self
            .transport
            .publish(&topics::sketch_topic(sketch), body.clone(), true)
            .and_then(|_| self.transport.publish(&topics::request_topic(command, &correlation_id), body, false));
        if let Err(e) = published {
            self.pending_responses.remove(&correlation_id);
            if let Err(unsub) = self.transport.unsubscribe(&response_topic) {
                log::error!("{:#}", unsub);
            }
            return Err(e);
        }

        if sketch == self.sketch {
            self.editor_source = source.to_string();
        }
        log::info!("Submitted {} of {} as {}", command, sketch, correlation_id);
        Ok(correlation_id)
    }

    /// Route an inbound message by topic prefix.
    pub fn dispatch(&mut self, message: &InboundMessage) -> Outcome {
        log::debug!("Topic: {} payload: {}", message.topic, message.payload_text());
        let route = Route::classify(&message.topic);
        let kind = route.kind();
        let outcome = match route {
            Route::Response { command, correlation_id } => {
                if command.is_none() {
                    log::warn!("Response topic {} names no known command", message.topic);
                }
                self.on_response(&message.topic, correlation_id, &message.payload)
            }
            Route::Result { job_id } => self.on_result(&message.topic, job_id, &message.payload),
            Route::SketchSync { name } if name != self.sketch => {
                log::debug!("Sketch {} is not open, ignoring", name);
                Outcome::Ignored
            }
            Route::SketchSync { .. } => self.on_sketch_sync(&message.payload),
            Route::Unknown => {
                log::info!("Unknown topic: {}", message.topic);
                Outcome::Ignored
            }
        };
        if let Outcome::Failed { reason, .. } = &outcome {
            log::error!("Error handling {} payload on {}: {}", kind, message.topic, reason);
        }
        outcome
    }

    /// Swap the response subscription for the result subscription.
    ///
    /// The response topic is unsubscribed on every path, including malformed payloads
    /// and responses nobody is waiting for.
    pub fn on_response(&mut self, topic: &str, correlation_id: Option<CorrelationId>, payload: &[u8]) -> Outcome {
        let command = correlation_id.and_then(|id| self.pending_responses.remove(&id));
        let job_id = payload::parse::<JobResponse>(payload, "response").and_then(|response| response.job_id());
        let outcome = match (job_id, command) {
            (Ok(job_id), Some(command)) => {
                let result_topic = topics::result_topic(&job_id);
                match self.transport.subscribe(&result_topic) {
                    Ok(()) => {
                        self.pending_results.insert(job_id.clone(), command);
                        Outcome::AwaitingResult { command, job_id }
                    }
                    Err(e) => Outcome::Failed {
                        route: "response",
                        reason: format!("{:#}", e),
                    },
                }
            }
            (Ok(job_id), None) => {
                log::warn!("Response on {} for job {} was not expected, ignoring", topic, job_id);
                Outcome::Ignored
            }
            (Err(e), _) => Outcome::Failed {
                route: "response",
                reason: format!("{:#}", e),
            },
        };
        self.unsubscribe(topic);
        outcome
    }

    /// Drop the result subscription and turn the payload into a report.
    pub fn on_result(&mut self, topic: &str, job_id: JobId, payload: &[u8]) -> Outcome {
        self.unsubscribe(topic);
        let pending = self.pending_results.remove(&job_id);

        let result: JobResult = match payload::parse(payload, "result") {
            Ok(result) => result,
            Err(e) => {
                return Outcome::Failed {
                    route: "result",
                    reason: format!("{:#}", e),
                };
            }
        };

        let command = match result.command.or(pending) {
            Some(command) => command,
            None => {
                log::warn!("Result for job {} names no command, assuming verify", job_id);
                Command::Verify
            }
        };

        if result.is_success() {
            log::info!("Exit code: {:?}", result.exit_code);
            log::info!("Stdout: {}", result.stdout);
            log::info!("Stderr: {}", result.stderr);
            log::info!("Errors: {}", result.errors);
        } else {
            log::warn!("Fail: job {} ended with type '{}'", job_id, result.kind);
        }
        Outcome::Finished(JobReport::from_result(&result, command))
    }

    /// Last writer wins: a retained copy of the open sketch replaces differing editor content.
    pub fn on_sketch_sync(&mut self, payload: &[u8]) -> Outcome {
        let job: Job = match payload::parse(payload, "sketch") {
            Ok(job) => job,
            Err(e) => {
                return Outcome::Failed {
                    route: "sketch",
                    reason: format!("{:#}", e),
                };
            }
        };
        if job.sketch != topics::sketch_file_name(&self.sketch) {
            return Outcome::Ignored;
        }
        match job.decode_source() {
            Ok(source) if source == self.editor_source => Outcome::SketchUnchanged,
            Ok(source) => {
                log::info!("Sketch {} updated from broker", job.sketch);
                self.editor_source = source.clone();
                Outcome::SketchReplaced(source)
            }
            Err(e) => Outcome::Failed {
                route: "sketch",
                reason: format!("{:#}", e),
            },
        }
    }

    /// Subscribe the open sketch and every outstanding response/result topic again.
    ///
    /// Called after each CONNACK; the broker forgets subscriptions of a clean session.
    pub fn resubscribe(&mut self) -> anyhow::Result<()> {
        self.transport.subscribe(&topics::sketch_topic(&self.sketch))?;
        for (correlation_id, command) in &self.pending_responses {
            self.transport.subscribe(&topics::response_topic(*command, correlation_id))?;
        }
        for job_id in self.pending_results.keys() {
            self.transport.subscribe(&topics::result_topic(job_id))?;
        }
        if self.outstanding() > 0 {
            log::info!("Restored {} outstanding subscriptions", self.outstanding());
        }
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) {
        if let Err(e) = self.transport.unsubscribe(topic) {
            log::error!("{:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::recording::{Call, RecordingTransport};

    fn client() -> CorrelationClient<RecordingTransport> {
        CorrelationClient::new(RecordingTransport::new(), "blinky")
    }

    fn sketch_payload(name: &str, source: &str) -> Vec<u8> {
        Job::new(name.to_string(), source).to_bytes().unwrap()
    }

    #[test]
    fn test_submit_subscribes_before_publishing() {
        let mut client = client();
        let id = client.submit(Command::Verify, "blinky", "void loop(){}").unwrap();

        let response_topic = format!("response/verify/{}", id);
        let request_topic = format!("verify/{}", id);
        let transport = client.transport();
        let sub = transport.position(|c| *c == Call::Subscribe(response_topic.clone())).unwrap();
        let publish = transport
            .position(|c| matches!(c, Call::Publish { topic, .. } if *topic == request_topic))
            .unwrap();
        assert!(sub < publish);
        assert_eq!(sub, 0);

        let Call::Publish { payload, retained, .. } = transport.published_to(&request_topic)[0] else {
            panic!("Expected publish");
        };
        assert!(!retained);
        let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(json["sketch"], "blinky.ino");
        assert_eq!(json["src"], "dm9pZCBsb29wKCl7fQ==");
        assert_eq!(client.outstanding(), 1);
    }

    #[test]
    fn test_submit_publishes_retained_sketch() {
        let mut client = client();
        client.submit(Command::Upload, "blinky", "int x;").unwrap();

        let published = client.transport().published_to("sketch/blinky");
        assert_eq!(published.len(), 1);
        let Call::Publish { payload, retained, .. } = published[0] else {
            panic!("Expected publish");
        };
        assert!(retained);
        let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(json["src"], "aW50IHg7");
        assert_eq!(client.editor_source(), "int x;");
    }

    #[test]
    fn test_submit_nothing_published_when_subscribe_fails() {
        let mut transport = RecordingTransport::new();
        transport.fail = true;
        let mut client = CorrelationClient::new(transport, "blinky");
        assert!(client.submit(Command::Verify, "blinky", "x").is_err());
        assert_eq!(client.transport().calls.len(), 1);
        assert_eq!(client.outstanding(), 0);
    }

    #[test]
    fn test_response_swaps_subscription() {
        let mut client = client();
        let id = client.submit(Command::Verify, "blinky", "void loop(){}").unwrap();
        let response_topic = format!("response/verify/{}", id);

        let outcome = client.dispatch(&InboundMessage::new(response_topic.clone(), br#"{"id":"job1"}"#.to_vec()));
        assert_eq!(
            outcome,
            Outcome::AwaitingResult {
                command: Command::Verify,
                job_id: JobId::from("job1"),
            }
        );

        let transport = client.transport();
        let sub = transport.position(|c| *c == Call::Subscribe("result/job1".to_string())).unwrap();
        let unsub = transport.position(|c| *c == Call::Unsubscribe(response_topic.clone())).unwrap();
        assert!(sub < unsub);
        assert_eq!(transport.count(&Call::Unsubscribe(response_topic)), 1);
        assert_eq!(client.outstanding(), 1);
    }

    #[test]
    fn test_numeric_job_id_is_followed() {
        let mut client = client();
        let id = client.submit(Command::Verify, "blinky", "x").unwrap();

        let outcome = client.dispatch(&InboundMessage::new(format!("response/verify/{}", id), br#"{"id":42}"#.to_vec()));
        assert_eq!(
            outcome,
            Outcome::AwaitingResult {
                command: Command::Verify,
                job_id: JobId::from("42"),
            }
        );
        assert!(client.transport().subscribed("result/42"));
        assert_eq!(client.outstanding(), 1);

        let outcome = client.dispatch(&InboundMessage::new("result/42", br#"{"type":"success","exitCode":0}"#.to_vec()));
        assert_eq!(outcome, Outcome::Finished(JobReport::Succeeded { command: Command::Verify }));
        assert_eq!(client.outstanding(), 0);
    }

    #[test]
    fn test_duplicate_response_subscribes_once() {
        let mut client = client();
        let id = client.submit(Command::Verify, "blinky", "x").unwrap();
        let response = InboundMessage::new(format!("response/verify/{}", id), br#"{"id":"job1"}"#.to_vec());

        assert!(matches!(client.dispatch(&response), Outcome::AwaitingResult { .. }));
        assert_eq!(client.dispatch(&response), Outcome::Ignored);
        assert_eq!(client.transport().count(&Call::Subscribe("result/job1".to_string())), 1);
        assert_eq!(client.outstanding(), 1);
    }

    #[test]
    fn test_response_without_id_is_malformed() {
        let mut client = client();
        let id = client.submit(Command::Verify, "blinky", "x").unwrap();
        let outcome = client.dispatch(&InboundMessage::new(format!("response/verify/{}", id), br#"{"id":null}"#.to_vec()));
        assert!(matches!(outcome, Outcome::Failed { route: "response", .. }));
        assert_eq!(client.outstanding(), 0);
    }

    #[test]
    fn test_malformed_response_still_unsubscribes() {
        let mut client = client();
        let id = client.submit(Command::Upload, "blinky", "x").unwrap();
        let response_topic = format!("response/upload/{}", id);

        let outcome = client.dispatch(&InboundMessage::new(response_topic.clone(), b"not json".to_vec()));
        assert!(matches!(outcome, Outcome::Failed { route: "response", .. }));
        assert_eq!(client.transport().count(&Call::Unsubscribe(response_topic)), 1);
        assert!(!client.transport().calls.iter().any(|c| matches!(c, Call::Subscribe(t) if t.starts_with("result/"))));
        assert_eq!(client.outstanding(), 0);
    }

    #[test]
    fn test_unexpected_response_is_not_followed() {
        let mut client = client();
        let outcome = client.dispatch(&InboundMessage::new("response/verify/someone-else", br#"{"id":"job9"}"#.to_vec()));
        assert_eq!(outcome, Outcome::Ignored);
        assert!(!client.transport().subscribed("result/job9"));
        assert_eq!(client.transport().count(&Call::Unsubscribe("response/verify/someone-else".to_string())), 1);
    }

    #[test]
    fn test_success_result_finishes_and_unsubscribes() {
        let mut client = client();
        let id = client.submit(Command::Verify, "blinky", "x").unwrap();
        client.dispatch(&InboundMessage::new(format!("response/verify/{}", id), br#"{"id":"job1"}"#.to_vec()));

        let outcome = client.dispatch(&InboundMessage::new("result/job1", br#"{"type":"success","exitCode":0}"#.to_vec()));
        assert_eq!(outcome, Outcome::Finished(JobReport::Succeeded { command: Command::Verify }));
        assert_eq!(client.transport().count(&Call::Unsubscribe("result/job1".to_string())), 1);
        assert_eq!(client.outstanding(), 0);
    }

    #[test]
    fn test_result_command_falls_back_to_request() {
        let mut client = client();
        let id = client.submit(Command::Upload, "blinky", "x").unwrap();
        client.dispatch(&InboundMessage::new(format!("response/upload/{}", id), br#"{"id":"job2"}"#.to_vec()));

        let outcome = client.dispatch(&InboundMessage::new("result/job2", br#"{"type":"success","exitCode":1}"#.to_vec()));
        assert_eq!(
            outcome,
            Outcome::Finished(JobReport::CompileFailed {
                command: Command::Upload,
                exit_code: Some(1),
            })
        );
    }

    #[test]
    fn test_unknown_result_command_uses_request() {
        let mut client = client();
        let id = client.submit(Command::Upload, "blinky", "x").unwrap();
        client.dispatch(&InboundMessage::new(format!("response/upload/{}", id), br#"{"id":"job4"}"#.to_vec()));

        let outcome = client.dispatch(&InboundMessage::new("result/job4", br#"{"type":"success","command":"compile","exitCode":0}"#.to_vec()));
        assert_eq!(outcome, Outcome::Finished(JobReport::Succeeded { command: Command::Upload }));
    }

    #[test]
    fn test_replace_transport_keeps_pending() {
        let mut client = client();
        let id = client.submit(Command::Verify, "blinky", "x").unwrap();
        let previous = client.replace_transport(RecordingTransport::new());
        assert!(previous.subscribed(&format!("response/verify/{}", id)));
        assert!(client.transport().calls.is_empty());

        client.resubscribe().unwrap();
        assert!(client.transport().subscribed(&format!("response/verify/{}", id)));
        assert!(client.transport().subscribed("sketch/blinky"));
        assert_eq!(client.outstanding(), 1);
    }

    #[test]
    fn test_malformed_result_still_unsubscribes() {
        let mut client = client();
        let outcome = client.dispatch(&InboundMessage::new("result/job3", b"{".to_vec()));
        assert!(matches!(outcome, Outcome::Failed { route: "result", .. }));
        assert_eq!(client.transport().count(&Call::Unsubscribe("result/job3".to_string())), 1);
    }

    #[test]
    fn test_sketch_sync_is_idempotent() {
        let mut client = client();
        client.set_editor_source("old".to_string());
        let message = InboundMessage::new("sketch/blinky", sketch_payload("blinky.ino", "new"));

        assert_eq!(client.dispatch(&message), Outcome::SketchReplaced("new".to_string()));
        assert_eq!(client.editor_source(), "new");
        assert_eq!(client.dispatch(&message), Outcome::SketchUnchanged);
        assert!(client.transport().calls.is_empty());
    }

    #[test]
    fn test_sketch_sync_ignores_other_sketches() {
        let mut client = client();
        client.set_editor_source("mine".to_string());
        let message = InboundMessage::new("sketch/thermo", sketch_payload("thermo.ino", "theirs"));
        assert_eq!(client.dispatch(&message), Outcome::Ignored);
        assert_eq!(client.editor_source(), "mine");
    }

    #[test]
    fn test_sketch_sync_bad_base64() {
        let mut client = client();
        let message = InboundMessage::new("sketch/blinky", br#"{"sketch":"blinky.ino","src":"***"}"#.to_vec());
        assert!(matches!(client.dispatch(&message), Outcome::Failed { route: "sketch", .. }));
    }

    #[test]
    fn test_unknown_topic_ignored() {
        let mut client = client();
        assert_eq!(client.dispatch(&InboundMessage::new("verify/abc", b"{}".to_vec())), Outcome::Ignored);
        assert!(client.transport().calls.is_empty());
    }

    #[test]
    fn test_resubscribe_restores_outstanding() {
        let mut client = client();
        let first = client.submit(Command::Verify, "blinky", "a").unwrap();
        let second = client.submit(Command::Upload, "blinky", "b").unwrap();
        client.dispatch(&InboundMessage::new(format!("response/upload/{}", second), br#"{"id":"job7"}"#.to_vec()));

        client.resubscribe().unwrap();
        let transport = client.transport();
        assert!(transport.subscribed("sketch/blinky"));
        assert_eq!(transport.count(&Call::Subscribe(format!("response/verify/{}", first))), 2);
        assert_eq!(transport.count(&Call::Subscribe("result/job7".to_string())), 2);
        assert_eq!(transport.count(&Call::Subscribe(format!("response/upload/{}", second))), 1);
    }
}
