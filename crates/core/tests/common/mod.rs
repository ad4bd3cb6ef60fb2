#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use context_snapshot_core::{
    Category, CollectContext, CollectOptions, Collector, CollectorResult, CommandRunner,
    ExecOutput, Platform,
};

struct Rule {
    pattern: String,
    delay: Option<Duration>,
    output: ExecOutput,
}

/// Replays canned command output. A command line matches the first rule whose
/// pattern it contains; unmatched commands fail as if the utility were
/// missing. A delay at or past the caller's deadline reports a timeout.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    files: HashMap<String, String>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(mut self, pattern: &str, output: ExecOutput) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            delay: None,
            output,
        });
        self
    }

    pub fn delayed(mut self, pattern: &str, delay: Duration, output: ExecOutput) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            delay: Some(delay),
            output,
        });
        self
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> ExecOutput {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let Some(rule) = self.rules.iter().find(|rule| line.contains(&rule.pattern)) else {
            return ExecOutput::failure(format!("{program}: command not found"));
        };
        if let Some(delay) = rule.delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return ExecOutput::timeout();
            }
            tokio::time::sleep(delay).await;
        }
        rule.output.clone()
    }

    async fn read_file(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }
}

pub fn context(options: CollectOptions, platform: Platform, runner: ScriptedRunner) -> CollectContext {
    CollectContext::new(options, platform, Arc::new(runner))
}

/// Collector returning a preset result, optionally after a delay or by
/// panicking.
pub struct Fixed<T> {
    category: Category,
    result: CollectorResult<T>,
    delay: Duration,
    panics: bool,
}

impl<T> Fixed<T> {
    pub fn new(category: Category, result: CollectorResult<T>) -> Self {
        Self {
            category,
            result,
            delay: Duration::ZERO,
            panics: false,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn panicking(category: Category) -> Self {
        Self {
            category,
            result: CollectorResult::default(),
            delay: Duration::ZERO,
            panics: true,
        }
    }

    pub fn shared(self) -> Arc<dyn Collector<Output = T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        Arc::new(self)
    }
}

#[async_trait]
impl<T> Collector for Fixed<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn category(&self) -> Category {
        self.category
    }

    async fn collect(&self, _ctx: &CollectContext) -> CollectorResult<T> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("{} collector blew up", self.category);
        }
        self.result.clone()
    }
}

pub fn all_enabled() -> CollectOptions {
    CollectOptions {
        include_clipboard: true,
        include_frontmost_window: true,
        include_apps: true,
        include_battery: true,
        include_network: true,
        include_calendar: true,
        include_reminders: true,
        ..CollectOptions::default()
    }
}
