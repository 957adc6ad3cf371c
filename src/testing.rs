// ABOUTME: Scripted shells, connectors and wait policies shared by unit and integration tests
//
// Nothing here opens a network connection. A `Recorder` collects one
// timeline of sends, settles, idles and closes so tests can assert exact
// ordering across the shell and the wait policy.

use crate::hosts::HostEntry;
use crate::ssh::{Connector, Recv, RemoteShell, SessionError, TransportError, WaitPolicy};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Send(String),
    Settle,
    Idle,
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, event: Event) {
        self.guard().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.guard().clone()
    }

    /// Every line sent to any shell, newline stripped.
    pub fn sends(&self) -> Vec<String> {
        self.guard()
            .iter()
            .filter_map(|e| match e {
                Event::Send(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.guard().iter().filter(|e| *e == wanted).count()
    }

    pub fn closes(&self) -> usize {
        self.count(&Event::Close)
    }

    pub fn settles(&self) -> usize {
        self.count(&Event::Settle)
    }
}

/// Shell that replays a fixed output script.
pub struct ScriptedShell {
    recorder: Recorder,
    script: VecDeque<Recv>,
    exhausted: Recv,
    fail_on_send: Option<usize>,
    sent: usize,
    cancel_when_drained: Option<CancellationToken>,
}

impl ScriptedShell {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            script: VecDeque::new(),
            exhausted: Recv::Idle,
            fail_on_send: None,
            sent: 0,
            cancel_when_drained: None,
        }
    }

    /// Output chunks returned in order before the shell reports idle.
    pub fn with_output(mut self, chunks: &[&str]) -> Self {
        self.script
            .extend(chunks.iter().map(|c| Recv::Data(c.as_bytes().to_vec())));
        self
    }

    /// Insert an idle gap into the output script.
    pub fn with_gap(mut self) -> Self {
        self.script.push_back(Recv::Idle);
        self
    }

    /// Report a closed channel once the script runs out.
    pub fn then_close(mut self) -> Self {
        self.exhausted = Recv::Closed;
        self
    }

    /// Fail the n-th send (zero based, escalation included).
    pub fn fail_on_send(mut self, index: usize) -> Self {
        self.fail_on_send = Some(index);
        self
    }

    /// Fire `token` the first time the script is exhausted.
    pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.cancel_when_drained = Some(token);
        self
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let index = self.sent;
        self.sent += 1;
        if self.fail_on_send == Some(index) {
            return Err(TransportError("broken pipe".to_string()));
        }
        let line = String::from_utf8_lossy(data).trim_end_matches('\n').to_string();
        self.recorder.push(Event::Send(line));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Recv, TransportError> {
        if let Some(next) = self.script.pop_front() {
            return Ok(next);
        }
        if let Some(token) = self.cancel_when_drained.take() {
            token.cancel();
        }
        Ok(self.exhausted.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        self.recorder.push(Event::Close);
        Ok(())
    }
}

type OpenFn = dyn Fn(&HostEntry, usize) -> Result<Box<dyn RemoteShell>, SessionError> + Send + Sync;

/// Connector whose behavior is decided per call by a closure receiving
/// the host and the zero based call number.
pub struct ScriptedConnector {
    open: Box<OpenFn>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new<F>(open: F) -> Self
    where
        F: Fn(&HostEntry, usize) -> Result<Box<dyn RemoteShell>, SessionError> + Send + Sync + 'static,
    {
        Self {
            open: Box::new(open),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Connector that hands out a fresh idle shell on every call.
    pub fn idle(recorder: Recorder) -> Self {
        Self::new(move |_, _| Ok(Box::new(ScriptedShell::new(recorder.clone())) as Box<dyn RemoteShell>))
    }

    /// Host names passed to `open`, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, host: &HostEntry) -> Result<Box<dyn RemoteShell>, SessionError> {
        let call = {
            let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
            opened.push(host.name.clone());
            opened.len() - 1
        };
        (self.open)(host, call)
    }
}

/// Zero-delay wait policy that records each pause.
#[derive(Debug, Clone, Default)]
pub struct RecordingWait {
    recorder: Recorder,
}

impl RecordingWait {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl WaitPolicy for RecordingWait {
    async fn settle(&self) {
        self.recorder.push(Event::Settle);
    }

    async fn idle(&self) {
        self.recorder.push(Event::Idle);
        tokio::task::yield_now().await;
    }
}

/// Cloneable in-memory writer standing in for the operator console.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The two-VM lab used across tests.
pub fn lab_hosts() -> Vec<HostEntry> {
    vec![
        HostEntry::new("vm1", "localhost", 2222, "vm1", "1"),
        HostEntry::new("vm2", "localhost", 2223, "vm2", "1"),
    ]
}
