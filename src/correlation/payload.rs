//! JSON payloads exchanged with the build service.

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::topics::{Command, JobId};

/// Request body, also used for the retained `sketch/{name}` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// File name, `{name}.ino`
    pub sketch: String,
    /// Base64 encoded source
    pub src: String,
}

impl Job {
    pub fn new(sketch_file: String, source: &str) -> Self {
        Self {
            sketch: sketch_file,
            src: STANDARD.encode(source.as_bytes()),
        }
    }

    pub fn decode_source(&self) -> anyhow::Result<String> {
        let bytes = STANDARD.decode(self.src.trim()).context("sketch source is not valid base64")?;
        String::from_utf8(bytes).context("sketch source is not valid UTF-8")
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to encode job")
    }
}

/// Body of `response/{command}/{correlation_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResponse {
    /// Any JSON scalar the service chose, `null` when absent
    #[serde(default)]
    pub id: Value,
}

impl JobResponse {
    /// Job id as it appears in `result/{job_id}`.
    ///
    /// Strings are taken verbatim, numbers and booleans in their JSON spelling.
    pub fn job_id(&self) -> anyhow::Result<JobId> {
        let id = match &self.id {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => anyhow::bail!("response carries no job id"),
            other => anyhow::bail!("job id {} is not a scalar", other),
        };
        if id.is_empty() || id.contains(['+', '#']) {
            anyhow::bail!("job id '{}' is not usable as a topic segment", id);
        }
        Ok(JobId::from(id.as_str()))
    }
}

/// Body of `result/{job_id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[serde(rename = "type")]
    pub kind: String,
    /// `None` when absent or not a command this client knows
    #[serde(default, deserialize_with = "known_command")]
    pub command: Option<Command>,
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub errors: serde_json::Value,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.kind == "success"
    }
}

fn known_command<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Command>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(Command::parse))
}

pub fn parse<T: DeserializeOwned>(payload: &[u8], what: &str) -> anyhow::Result<T> {
    serde_json::from_slice(payload).with_context(|| format!("malformed {} payload", what))
}

/// What the user is told once a job is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    Succeeded { command: Command },
    CompileFailed { command: Command, exit_code: Option<i64> },
    /// The service answered with a `type` other than `success`.
    Rejected { command: Command, kind: String },
}

impl JobReport {
    /// Derive the report. A missing exit code counts as a failure.
    pub fn from_result(result: &JobResult, command: Command) -> Self {
        if !result.is_success() {
            return JobReport::Rejected {
                command,
                kind: result.kind.clone(),
            };
        }
        match result.exit_code {
            Some(0) => JobReport::Succeeded { command },
            exit_code => JobReport::CompileFailed { command, exit_code },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobReport::Succeeded { .. })
    }

    pub fn title(&self) -> &'static str {
        if self.is_success() { "Success!" } else { "Failed!" }
    }

    pub fn message(&self) -> String {
        match self {
            JobReport::Succeeded { command: Command::Verify } => "No compilation errors".to_string(),
            JobReport::Succeeded { command: Command::Upload } => "No compilation errors and upload was performed correctly".to_string(),
            JobReport::CompileFailed { command: Command::Verify, .. } => "Compilation errors detected".to_string(),
            JobReport::CompileFailed { command: Command::Upload, .. } => "Compilation errors detected, upload not performed".to_string(),
            JobReport::Rejected { kind, .. } => format!("Build server reported '{}'", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_encodes_source_as_base64() {
        let job = Job::new("blinky.ino".to_string(), "void loop(){}");
        assert_eq!(job.src, "dm9pZCBsb29wKCl7fQ==");
        let json: serde_json::Value = serde_json::from_slice(&job.to_bytes().unwrap()).unwrap();
        assert_eq!(json["sketch"], "blinky.ino");
        assert_eq!(json["src"], "dm9pZCBsb29wKCl7fQ==");
        assert_eq!(job.decode_source().unwrap(), "void loop(){}");
    }

    #[test]
    fn test_decode_source_rejects_bad_base64() {
        let job = Job {
            sketch: "blinky.ino".to_string(),
            src: "%%%".to_string(),
        };
        assert!(job.decode_source().is_err());
    }

    #[test]
    fn test_parse_full_result() {
        let payload = br#"{"type":"success","command":"upload","exitCode":1,"stdout":"","stderr":"boom","errors":[{"line":3}]}"#;
        let result: JobResult = parse(payload, "result").unwrap();
        assert!(result.is_success());
        assert_eq!(result.command, Some(Command::Upload));
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.stderr, "boom");
        assert_eq!(result.errors[0]["line"], 3);
    }

    #[test]
    fn test_response_job_id_forms() {
        fn id(payload: &[u8]) -> anyhow::Result<JobId> {
            parse::<JobResponse>(payload, "response")?.job_id()
        }
        assert_eq!(id(br#"{"id":"job1"}"#).unwrap(), JobId::from("job1"));
        assert_eq!(id(br#"{"id":42}"#).unwrap(), JobId::from("42"));
        assert_eq!(id(br#"{"id":1.5}"#).unwrap(), JobId::from("1.5"));
        assert!(id(br#"{}"#).is_err());
        assert!(id(br#"{"id":null}"#).is_err());
        assert!(id(br#"{"id":""}"#).is_err());
        assert!(id(br##"{"id":"#"}"##).is_err());
        assert!(id(br#"{"id":{"n":1}}"#).is_err());
    }

    #[test]
    fn test_unknown_command_in_result_is_dropped() {
        let result: JobResult = parse(br#"{"type":"success","command":"compile","exitCode":0}"#, "result").unwrap();
        assert_eq!(result.command, None);
        assert_eq!(result.exit_code, Some(0));

        let result: JobResult = parse(br#"{"type":"success","command":7,"exitCode":0}"#, "result").unwrap();
        assert_eq!(result.command, None);

        let result: JobResult = parse(br#"{"type":"success","command":null}"#, "result").unwrap();
        assert_eq!(result.command, None);
    }

    #[test]
    fn test_parse_minimal_result() {
        let result: JobResult = parse(br#"{"type":"success","exitCode":0}"#, "result").unwrap();
        assert_eq!(result.command, None);
        assert!(result.stdout.is_empty());
        assert!(result.errors.is_null());
    }

    #[test]
    fn test_report_messages() {
        let ok = JobReport::Succeeded { command: Command::Verify };
        assert_eq!(ok.title(), "Success!");
        assert_eq!(ok.message(), "No compilation errors");

        let failed = JobReport::CompileFailed {
            command: Command::Upload,
            exit_code: Some(2),
        };
        assert_eq!(failed.title(), "Failed!");
        assert_eq!(failed.message(), "Compilation errors detected, upload not performed");
    }

    #[test]
    fn test_report_from_non_success_type() {
        let result: JobResult = parse(br#"{"type":"error","exitCode":0}"#, "result").unwrap();
        let report = JobReport::from_result(&result, Command::Verify);
        assert_eq!(
            report,
            JobReport::Rejected {
                command: Command::Verify,
                kind: "error".to_string()
            }
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_missing_exit_code_is_failure() {
        let result: JobResult = parse(br#"{"type":"success"}"#, "result").unwrap();
        assert!(matches!(JobReport::from_result(&result, Command::Verify), JobReport::CompileFailed { exit_code: None, .. }));
    }
}
