//! Configuration & Prompt Seams
//!
//! The shell core never parses configuration files; it receives a
//! populated [`Config`] value at startup and calls a [`PromptRenderer`]
//! before each read. Slow prompt enrichment (git status and the like)
//! runs on a short-lived worker thread whose result lands in a
//! [`PromptSlot`] — the REPL polls it with a deadline and falls back to
//! the plain prompt when the worker is late.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::editor::history;

/// Everything the embedding layer decided for us.
#[derive(Debug, Clone)]
pub struct Config {
    /// History file; None falls back to `$HISTFILE` or `~/.den_history`
    pub histfile: Option<PathBuf>,
    pub histsize: usize,
    /// `~name` targets
    pub named_dirs: HashMap<String, String>,
    /// Aliases installed before the first prompt
    pub aliases: HashMap<String, String>,
    /// Capacity of the expansion LRU caches
    pub cache_capacity: usize,
    /// How long the prompt may wait for its enrichment worker
    pub prompt_deadline: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            histfile: None,
            histsize: history::DEFAULT_CAPACITY,
            named_dirs: HashMap::new(),
            aliases: HashMap::new(),
            cache_capacity: 256,
            prompt_deadline: Duration::from_millis(200),
        }
    }
}

/// What a prompt renderer gets to look at.
pub struct PromptContext<'a> {
    pub cwd: &'a str,
    pub home: &'a str,
    pub last_status: i32,
    pub columns: u16,
}

/// Prompt rendering is external; the REPL only calls `render`.
pub trait PromptRenderer {
    fn render(&mut self, ctx: &PromptContext) -> String;
}

/// Fallback renderer: `PS1`-less `dir $ ` with the home directory
/// shortened to `~` and a status marker after failures.
pub struct DefaultPrompt;

impl PromptRenderer for DefaultPrompt {
    fn render(&mut self, ctx: &PromptContext) -> String {
        let dir = match ctx.cwd.strip_prefix(ctx.home) {
            Some("") => "~".to_string(),
            Some(rest) => format!("~{}", rest),
            None => ctx.cwd.to_string(),
        };
        if ctx.last_status == 0 {
            format!("{} $ ", dir)
        } else {
            format!("{} [{}] $ ", dir, ctx.last_status)
        }
    }
}

/// Single-producer single-consumer result slot for prompt enrichment.
/// The worker writes once; the consumer polls with a deadline and simply
/// drops late results.
#[derive(Clone, Default)]
pub struct PromptSlot {
    slot: Arc<Mutex<Option<String>>>,
}

impl PromptSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kick off a worker that deposits its result in the slot.
    pub fn spawn(&self, work: impl FnOnce() -> String + Send + 'static) {
        let slot = Arc::clone(&self.slot);
        std::thread::spawn(move || {
            let result = work();
            if let Ok(mut guard) = slot.lock() {
                *guard = Some(result);
            }
        });
    }

    /// Poll until the deadline; None when the worker was too slow.
    pub fn poll(&self, deadline: Duration) -> Option<String> {
        let until = Instant::now() + deadline;
        loop {
            if let Ok(mut guard) = self.slot.try_lock() {
                if let Some(value) = guard.take() {
                    return Some(value);
                }
            }
            if Instant::now() >= until {
                return None;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_shortens_home() {
        let mut prompt = DefaultPrompt;
        let rendered = prompt.render(&PromptContext {
            cwd: "/home/user/src",
            home: "/home/user",
            last_status: 0,
            columns: 80,
        });
        assert_eq!(rendered, "~/src $ ");

        let rendered = prompt.render(&PromptContext {
            cwd: "/etc",
            home: "/home/user",
            last_status: 2,
            columns: 80,
        });
        assert_eq!(rendered, "/etc [2] $ ");
    }

    #[test]
    fn prompt_slot_delivers_result() {
        let slot = PromptSlot::new();
        slot.spawn(|| "enriched".to_string());
        let value = slot.poll(Duration::from_millis(500));
        assert_eq!(value, Some("enriched".to_string()));
        // Consumed: a second poll times out empty.
        assert_eq!(slot.poll(Duration::from_millis(10)), None);
    }

    #[test]
    fn prompt_slot_deadline_expires() {
        let slot = PromptSlot::new();
        slot.spawn(|| {
            std::thread::sleep(Duration::from_millis(200));
            "late".to_string()
        });
        assert_eq!(slot.poll(Duration::from_millis(10)), None);
    }
}
