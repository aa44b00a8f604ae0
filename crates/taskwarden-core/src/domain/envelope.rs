//! TaskEnvelope - the `{task, kwargs}` document carried in a message body.

use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::{DecodeError, EncodeError};

/// Keyword arguments of a task, as decoded from the wire.
pub type Kwargs = Map<String, Value>;

const TASK_FIELD: &str = "task";
const KWARGS_FIELD: &str = "kwargs";

/// A task name plus its keyword arguments.
///
/// The wire form is a JSON object with exactly the two fields `task` and
/// `kwargs`. Values that JSON has no type for (dates, decimals, ...) travel
/// in whatever string form their `Serialize` impl produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskEnvelope {
    pub task: String,
    pub kwargs: Kwargs,
}

impl TaskEnvelope {
    pub fn new(task: impl Into<String>, kwargs: Kwargs) -> Self {
        Self {
            task: task.into(),
            kwargs,
        }
    }

    /// Build an envelope from any serializable kwargs value.
    ///
    /// The value must serialize to a JSON object.
    pub fn from_serializable<K: Serialize + ?Sized>(
        task: impl Into<String>,
        kwargs: &K,
    ) -> Result<Self, EncodeError> {
        match serde_json::to_value(kwargs)? {
            Value::Object(kwargs) => Ok(Self::new(task, kwargs)),
            _ => Err(EncodeError::KwargsNotAnObject),
        }
    }

    pub fn encode(&self) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(body).map_err(DecodeError::Malformed)?;
        let Value::Object(mut fields) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let task = fields
            .remove(TASK_FIELD)
            .ok_or(DecodeError::MissingField(TASK_FIELD))?;
        let kwargs = fields
            .remove(KWARGS_FIELD)
            .ok_or(DecodeError::MissingField(KWARGS_FIELD))?;

        if let Some(extra) = fields.keys().next() {
            return Err(DecodeError::UnexpectedField(extra.clone()));
        }

        let Value::String(task) = task else {
            return Err(DecodeError::InvalidField {
                field: TASK_FIELD,
                expected: "a string",
            });
        };
        let Value::Object(kwargs) = kwargs else {
            return Err(DecodeError::InvalidField {
                field: KWARGS_FIELD,
                expected: "an object",
            });
        };

        Ok(Self { task, kwargs })
    }

    pub fn into_parts(self) -> (String, Kwargs) {
        (self.task, self.kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Serialize)]
    struct Report {
        date: NaiveDate,
        region: String,
        retries: u32,
    }

    #[test]
    fn decode_valid_envelope() {
        let env = TaskEnvelope::decode(r#"{"task":"T","kwargs":{"x":1}}"#).unwrap();
        assert_eq!(env.task, "T");
        assert_eq!(Value::Object(env.kwargs), json!({"x": 1}));
    }

    #[test]
    fn dates_travel_as_strings() {
        let kwargs = Report {
            date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            region: "eu".to_string(),
            retries: 3,
        };
        let body = TaskEnvelope::from_serializable("report", &kwargs)
            .unwrap()
            .encode()
            .unwrap();

        let decoded = TaskEnvelope::decode(&body).unwrap();
        assert_eq!(decoded.task, "report");
        assert_eq!(
            Value::Object(decoded.kwargs),
            json!({"date": "2019-01-01", "region": "eu", "retries": 3})
        );
    }

    #[test]
    fn submit_then_decode_reproduces_nested_kwargs() {
        let kwargs = json!({"ids": [1, 2, 3], "opts": {"dry_run": true, "note": null}});
        let env = TaskEnvelope::from_serializable("sync", &kwargs).unwrap();
        let decoded = TaskEnvelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn kwargs_must_be_an_object() {
        let err = TaskEnvelope::from_serializable("t", &vec![1, 2]).unwrap_err();
        assert!(matches!(err, EncodeError::KwargsNotAnObject));
    }

    #[rstest]
    #[case::truncated(r#"{"task":"T""#, "decode_error")]
    #[case::not_json("hello", "decode_error")]
    #[case::list(r#"["T", {}]"#, "decode_error")]
    #[case::no_task(r#"{"kwargs":{}}"#, "missing_field")]
    #[case::no_kwargs(r#"{"task":"T"}"#, "missing_field")]
    #[case::extra_field(r#"{"task":"T","kwargs":{},"priority":1}"#, "decode_error")]
    #[case::task_not_string(r#"{"task":7,"kwargs":{}}"#, "decode_error")]
    #[case::kwargs_not_object(r#"{"task":"T","kwargs":[1]}"#, "decode_error")]
    fn rejects_bad_bodies(#[case] body: &str, #[case] label: &str) {
        let err = TaskEnvelope::decode(body).unwrap_err();
        assert_eq!(err.as_label(), label);
    }
}
