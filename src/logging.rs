//! Structured logging helpers for maintenance events.
//!
//! Components never reach for a global logger object. Each one receives a
//! [`LogContext`] at construction, derives children with [`LogContext::named`]
//! and [`LogContext::with`], and emits through `lake_log!`. Records go to
//! the `log` facade under a single target; installing a sink is the
//! application's job.

use std::fmt::{self, Display};

/// Single logging target for the crate.
pub(crate) const LOG_TARGET: &str = "lakemanage";

/// Logger name plus key/value pairs appended to every record in a scope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogContext {
    name: String,
    common_kv: String,
}

impl LogContext {
    /// Root context with the given logger name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            common_kv: String::new(),
        }
    }

    /// Child context whose name is this name extended by `segment`.
    pub fn named(&self, segment: &str) -> Self {
        let name = if self.name.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.name, segment)
        };
        Self {
            name,
            common_kv: self.common_kv.clone(),
        }
    }

    /// Child context carrying an additional `key=value` pair.
    pub fn with(&self, key: &str, value: impl Display) -> Self {
        let mut common_kv = self.common_kv.clone();
        if !common_kv.is_empty() {
            common_kv.push(' ');
        }
        common_kv.push_str(key);
        common_kv.push('=');
        common_kv.push_str(&value.to_string());
        Self {
            name: self.name.clone(),
            common_kv,
        }
    }

    /// Dotted logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn common_kv(&self) -> Option<&str> {
        if self.common_kv.is_empty() {
            None
        } else {
            Some(&self.common_kv)
        }
    }
}

impl Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "logger={}", self.name)?;
        if let Some(kv) = self.common_kv() {
            write!(f, " {kv}")?;
        }
        Ok(())
    }
}

macro_rules! lake_log {
    ($level:expr, ctx: $ctx:expr, $event:expr, $fmt:expr $(, $args:expr)* $(,)?) => {{
        let level: log::Level = $level;
        if log::log_enabled!(target: crate::logging::LOG_TARGET, level) {
            log::log!(
                target: crate::logging::LOG_TARGET,
                level,
                "event={} {} {}",
                $event,
                $ctx,
                format_args!($fmt $(, $args)*)
            );
        }
    }};
}

pub(crate) use lake_log;
