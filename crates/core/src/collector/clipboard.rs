use std::time::Instant;

use async_trait::async_trait;

use super::{CollectContext, Collector, CollectorResult};
use crate::model::{Category, Clipboard};
use crate::platform::Platform;
use crate::redact::SensitiveText;

const TEXT_PLAIN: &str = "text/plain";

/// Linux readers in preference order: Wayland first, then the X11 tools.
const LINUX_READERS: &[(&str, &[&str])] = &[
    ("wl-paste", &["--no-newline"]),
    ("xclip", &["-selection", "clipboard", "-o"]),
    ("xsel", &["--clipboard", "--output"]),
];

const MACOS_READERS: &[(&str, &[&str])] = &[("pbpaste", &[])];

#[derive(Debug, Clone, Copy, Default)]
pub struct ClipboardCollector;

#[async_trait]
impl Collector for ClipboardCollector {
    type Output = Clipboard;

    fn category(&self) -> Category {
        Category::Clipboard
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Clipboard> {
        let started = Instant::now();
        let result = match &ctx.platform {
            Platform::MacOs => read_first_available(ctx, MACOS_READERS).await,
            Platform::Linux => read_first_available(ctx, LINUX_READERS).await,
            other => {
                CollectorResult::unsupported(Category::Clipboard, other, Some(Clipboard::default()))
            }
        };
        result.with_elapsed(started)
    }
}

async fn read_first_available(
    ctx: &CollectContext,
    readers: &[(&str, &[&str])],
) -> CollectorResult<Clipboard> {
    let mut timed_out = Vec::new();
    for (program, args) in readers {
        let output = ctx.runner.run(program, args, ctx.timeout()).await;
        if output.succeeded {
            return CollectorResult::ok(clipboard_from_text(&output.stdout, ctx.options.redact));
        }
        if output.timed_out {
            timed_out.push(*program);
        }
    }

    if !readers.is_empty() && timed_out.len() == readers.len() {
        return CollectorResult::timed_out(Category::Clipboard);
    }
    let warnings = timed_out
        .into_iter()
        .map(|program| format!("clipboard: {program} timed out"))
        .collect();
    CollectorResult::ok(Clipboard::default()).with_warnings(warnings)
}

pub fn clipboard_from_text(text: &str, redact: bool) -> Clipboard {
    if text.is_empty() {
        return Clipboard {
            available: true,
            ..Clipboard::default()
        };
    }
    let sensitive = SensitiveText::from_raw(text, redact);
    Clipboard {
        available: true,
        types: vec![TEXT_PLAIN.to_string()],
        text: sensitive.text,
        text_sha256: sensitive.sha256,
        text_length: sensitive.length,
    }
}
