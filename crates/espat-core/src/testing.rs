//! Test doubles for driving an [`AtLink`](crate::AtLink) without hardware.
//!
//! [`ScriptedSerial`] answers written commands from a list of rules, and
//! [`ManualClock`] only moves when slept on, so timeouts elapse instantly.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;

use crate::transport::{Clock, SerialPort};

/// Clock that advances only when slept on or advanced explicitly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

#[derive(Debug)]
struct Rule {
    trigger: String,
    reply: Vec<u8>,
    repeat: bool,
    used: bool,
}

/// Serial port that replies to written frames according to scripted rules.
///
/// A rule fires when a written frame (without its trailing `\r\n`) starts
/// with the rule's trigger. One-shot rules fire once, in insertion order;
/// repeating rules fire every time. Frames with no matching rule get no
/// reply, which lets tests exercise timeouts.
#[derive(Debug, Default)]
pub struct ScriptedSerial {
    rules: Vec<Rule>,
    rx: VecDeque<u8>,
    written: Vec<String>,
    chunk_size: Option<usize>,
}

impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver at most `size` bytes per read to exercise fragmentation.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Reply once to the next frame starting with `trigger`.
    pub fn on(&mut self, trigger: &str, reply: &str) -> &mut Self {
        self.add_rule(trigger, reply, false)
    }

    /// Reply to every frame starting with `trigger`.
    pub fn always(&mut self, trigger: &str, reply: &str) -> &mut Self {
        self.add_rule(trigger, reply, true)
    }

    /// Queue bytes as if the module sent them on its own.
    pub fn push_unsolicited(&mut self, bytes: &str) {
        self.rx.extend(bytes.as_bytes());
    }

    /// Every frame written so far, without the trailing delimiter.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Number of written frames starting with `prefix`.
    pub fn count_written(&self, prefix: &str) -> usize {
        self.written.iter().filter(|w| w.starts_with(prefix)).count()
    }

    fn add_rule(&mut self, trigger: &str, reply: &str, repeat: bool) -> &mut Self {
        self.rules.push(Rule {
            trigger: trigger.to_string(),
            reply: reply.as_bytes().to_vec(),
            repeat,
            used: false,
        });
        self
    }
}

impl SerialPort for ScriptedSerial {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        let frame = text.strip_suffix("\r\n").unwrap_or(&text).to_string();

        let rule = self
            .rules
            .iter_mut()
            .find(|r| (r.repeat || !r.used) && frame.starts_with(&r.trigger));
        if let Some(rule) = rule {
            rule.used = true;
            self.rx.extend(rule.reply.iter().copied());
        }

        self.written.push(frame);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.chunk_size.unwrap_or(buf.len()).min(buf.len());
        let n = limit.min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }
}
