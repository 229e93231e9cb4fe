//! Reading back the JSON trace written by the binary when `OKRS_TRACE_FILE` is set.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TraceEvent {
	pub level: String,
	pub target: String,
	pub fields: HashMap<String, serde_json::Value>,
}

impl TraceEvent {
	pub fn message(&self) -> Option<&str> {
		self.fields.get("message").and_then(|m| m.as_str())
	}
}

pub struct TraceLog {
	events: Vec<TraceEvent>,
}

impl TraceLog {
	pub fn from_file(path: &Path) -> Self {
		let content = fs::read_to_string(path).unwrap_or_default();
		let events = content.lines().filter(|line| !line.is_empty()).filter_map(|line| serde_json::from_str(line).ok()).collect();
		Self { events }
	}

	pub fn find(&self, message: &str) -> Option<&TraceEvent> {
		self.events.iter().find(|e| e.message() == Some(message))
	}

	pub fn messages(&self) -> Vec<&str> {
		self.events.iter().filter_map(TraceEvent::message).collect()
	}
}

/// Assert that an event with the given message was traced
#[macro_export]
macro_rules! assert_traced {
	($log:expr, $message:expr) => {
		assert!(
			$log.find($message).is_some(),
			"Expected '{}' to be traced, but it wasn't. Traced messages:\n{:#?}",
			$message,
			$log.messages()
		);
	};
}
