//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use postal_chess::{
    CommentarySource, CorrespondenceService, Difficulty, InboundEvent, LlmError, MailTransport,
    MemorySessionStore, MoveSource, MoveSourceError, NewGameSettings, Notifier, OracleError,
    OracleVerdict, PositionOracle, Proposal, RateLimiter, Session, SessionStore, Terminal,
    ThreadHandle, TickLock, TransportError, TurnMachine,
};
use postal_chess_notation::{STARTING_FEN, Side, is_well_formed};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const PLAYER: &str = "pat@example.com";
pub const BOT: &str = "chess@example.com";

pub const START: &str = STARTING_FEN;
pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
pub const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
pub const AFTER_E4_E5_NF3: &str =
    "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2";
pub const AFTER_E4_E5_NF3_NC6: &str =
    "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";

/// Oracle answering from a script keyed on (position, token).
#[derive(Default)]
pub struct ScriptedOracle {
    verdicts: Mutex<HashMap<(String, String), Result<OracleVerdict, String>>>,
    histories: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn legal(&self, position: &str, token: &str, new_position: &str, notation: &str) {
        self.insert(
            position,
            token,
            Ok(OracleVerdict::Legal {
                new_position: new_position.into(),
                notation: notation.into(),
                terminal: None,
            }),
        );
    }

    pub fn terminal(
        &self,
        position: &str,
        token: &str,
        new_position: &str,
        notation: &str,
        terminal: Terminal,
    ) {
        self.insert(
            position,
            token,
            Ok(OracleVerdict::Legal {
                new_position: new_position.into(),
                notation: notation.into(),
                terminal: Some(terminal),
            }),
        );
    }

    pub fn illegal(&self, position: &str, token: &str, reason: &str, alternatives: &[&str]) {
        self.insert(
            position,
            token,
            Ok(OracleVerdict::Illegal {
                reason: reason.into(),
                alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
            }),
        );
    }

    pub fn failing(&self, position: &str, token: &str) {
        self.insert(position, token, Err("validator timed out".into()));
    }

    fn insert(&self, position: &str, token: &str, verdict: Result<OracleVerdict, String>) {
        self.verdicts
            .lock()
            .unwrap()
            .insert((position.to_string(), token.to_string()), verdict);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Move histories passed in, one per call.
    pub fn histories(&self) -> Vec<String> {
        self.histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl PositionOracle for ScriptedOracle {
    async fn validate_and_apply(
        &self,
        position: &str,
        move_history: &str,
        token: &str,
    ) -> Result<OracleVerdict, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().unwrap().push(move_history.to_string());
        let scripted = self
            .verdicts
            .lock()
            .unwrap()
            .get(&(position.to_string(), token.to_string()))
            .cloned();
        match scripted {
            Some(Ok(verdict)) => Ok(verdict),
            Some(Err(message)) => Err(OracleError::new(message)),
            None => Ok(OracleVerdict::Illegal {
                reason: format!("{} is not legal here", token),
                alternatives: Vec::new(),
            }),
        }
    }

    fn is_well_formed(&self, position: &str) -> bool {
        is_well_formed(position)
    }
}

/// Move source replaying queued proposals.
#[derive(Default)]
pub struct ScriptedMoveSource {
    proposals: Mutex<VecDeque<Result<Proposal, String>>>,
    calls: AtomicUsize,
}

impl ScriptedMoveSource {
    pub fn propose(&self, token: &str) {
        self.proposals
            .lock()
            .unwrap()
            .push_back(Ok(Proposal::new(token.to_string(), None)));
    }

    pub fn propose_with_eval(&self, token: &str, evaluation: &str) {
        self.proposals
            .lock()
            .unwrap()
            .push_back(Ok(Proposal::new(token.to_string(), Some(evaluation.to_string()))));
    }

    pub fn fail(&self, message: &str) {
        self.proposals.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MoveSource for ScriptedMoveSource {
    async fn propose(
        &self,
        _position: &str,
        _difficulty: Difficulty,
    ) -> Result<Proposal, MoveSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.proposals.lock().unwrap().pop_front() {
            Some(Ok(proposal)) => Ok(proposal),
            Some(Err(message)) => Err(MoveSourceError::new(message)),
            None => Err(MoveSourceError::new("no proposal scripted")),
        }
    }

    async fn probe(&self) -> Result<(), MoveSourceError> {
        Ok(())
    }
}

/// Commentary that always fails.
pub struct BrokenCommentary;

#[async_trait]
impl CommentarySource for BrokenCommentary {
    async fn explain(
        &self,
        _position: &str,
        _move_history: &str,
        _player_move: &str,
        _opponent_move: &str,
        _difficulty: Difficulty,
    ) -> Result<String, LlmError> {
        Err(LlmError::new("model overloaded".to_string()))
    }
}

/// Commentary with a fixed text.
pub struct FixedCommentary(pub &'static str);

#[async_trait]
impl CommentarySource for FixedCommentary {
    async fn explain(
        &self,
        _position: &str,
        _move_history: &str,
        _player_move: &str,
        _opponent_move: &str,
        _difficulty: Difficulty,
    ) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

#[derive(Debug, Clone)]
struct FakeThread {
    handle: ThreadHandle,
    subject: String,
    events: Vec<InboundEvent>,
}

/// A mailbox held in memory. Sends land in threads as messages from [`BOT`].
#[derive(Default)]
pub struct FakeMailbox {
    threads: Mutex<Vec<FakeThread>>,
    labels: Mutex<Vec<(ThreadHandle, String)>>,
    sends: AtomicUsize,
    missed_lookups: AtomicUsize,
    failed_sends: AtomicUsize,
}

/// Consumes one pending failure, if any.
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl FakeMailbox {
    fn push(&self, thread: &ThreadHandle, sender: &str, body: &str) {
        let mut threads = self.threads.lock().unwrap();
        let thread = threads
            .iter_mut()
            .find(|t| &t.handle == thread)
            .expect("thread exists");
        let index = thread.events.len();
        thread.events.push(InboundEvent::new(
            sender.to_string(),
            body.to_string(),
            "Mon, 5 Oct 2026 10:00:00 +0000".to_string(),
            index,
        ));
    }

    /// The player (or anyone) writes into a thread.
    pub fn write(&self, thread: &ThreadHandle, sender: &str, body: &str) {
        self.push(thread, sender, body);
    }

    /// Body of the newest message in `thread`.
    pub fn last_body(&self, thread: &ThreadHandle) -> String {
        let threads = self.threads.lock().unwrap();
        let thread = threads.iter().find(|t| &t.handle == thread).expect("thread exists");
        thread.events.last().map(|e| e.raw_body().clone()).unwrap_or_default()
    }

    /// The next `n` thread searches find nothing.
    pub fn miss_lookups(&self, n: usize) {
        self.missed_lookups.store(n, Ordering::SeqCst);
    }

    /// The next `n` new-thread sends fail.
    pub fn fail_sends(&self, n: usize) {
        self.failed_sends.store(n, Ordering::SeqCst);
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().unwrap().len()
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn labels(&self) -> Vec<(ThreadHandle, String)> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for FakeMailbox {
    async fn send_new(&self, _to: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        if take(&self.failed_sends) {
            return Err(TransportError::new("send rejected"));
        }
        let handle = {
            let mut threads = self.threads.lock().unwrap();
            let handle = ThreadHandle::new(format!("thread-{}", threads.len() + 1));
            threads.push(FakeThread {
                handle: handle.clone(),
                subject: subject.to_string(),
                events: Vec::new(),
            });
            handle
        };
        self.push(&handle, BOT, body);
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_thread(&self, token: &str) -> Result<Option<ThreadHandle>, TransportError> {
        if take(&self.missed_lookups) {
            return Ok(None);
        }
        Ok(self
            .threads
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|t| t.subject.contains(token))
            .map(|t| t.handle.clone()))
    }

    async fn reply(
        &self,
        thread: &ThreadHandle,
        _to: &str,
        _subject: &str,
        body: &str,
    ) -> Result<(), TransportError> {
        self.push(thread, BOT, body);
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn thread_events(&self, thread: &ThreadHandle) -> Result<Vec<InboundEvent>, TransportError> {
        self.threads
            .lock()
            .unwrap()
            .iter()
            .find(|t| &t.handle == thread)
            .map(|t| t.events.clone())
            .ok_or_else(|| TransportError::new("no such thread"))
    }

    async fn label_thread(&self, thread: &ThreadHandle, label: &str) -> Result<(), TransportError> {
        self.labels
            .lock()
            .unwrap()
            .push((thread.clone(), label.to_string()));
        Ok(())
    }

    async fn archive_thread(&self, _thread: &ThreadHandle) -> Result<(), TransportError> {
        Err(TransportError::new("archive not supported"))
    }

    async fn probe(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A service wired to scripted collaborators.
pub struct Harness {
    pub service: CorrespondenceService,
    pub store: Arc<MemorySessionStore>,
    pub mailbox: Arc<FakeMailbox>,
    pub oracle: Arc<ScriptedOracle>,
    pub source: Arc<ScriptedMoveSource>,
    pub lock: TickLock,
    _dir: TempDir,
}

pub struct HarnessOptions {
    pub human_side: Side,
    pub min_spacing: chrono::Duration,
    pub commentary: Option<Arc<dyn CommentarySource>>,
    pub move_log_cap: usize,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            human_side: Side::White,
            min_spacing: chrono::Duration::zero(),
            commentary: None,
            move_log_cap: 100,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    pub fn with(options: HarnessOptions) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(MemorySessionStore::new());
        let mailbox = Arc::new(FakeMailbox::default());
        let oracle = Arc::new(ScriptedOracle::default());
        let source = Arc::new(ScriptedMoveSource::default());
        let lock = TickLock::new(dir.path().join("tick.lock"), Duration::from_millis(300));

        let notifier = Notifier::new(
            mailbox.clone(),
            PLAYER.to_string(),
            Some("Chess".to_string()),
            true,
            Duration::ZERO,
        );
        let machine = TurnMachine::new(
            oracle.clone(),
            source.clone(),
            options.commentary,
            store.clone(),
            RateLimiter::new(store.clone(), options.min_spacing),
            NewGameSettings::new(options.human_side, Difficulty::Intermediate, options.move_log_cap),
        );
        let service = CorrespondenceService::new(
            store.clone(),
            lock.clone(),
            mailbox.clone(),
            notifier,
            machine,
            PLAYER.to_string(),
        );

        Self {
            service,
            store,
            mailbox,
            oracle,
            source,
            lock,
            _dir: dir,
        }
    }

    pub fn session(&self) -> Session {
        self.store
            .load_session()
            .expect("store readable")
            .expect("session exists")
    }

    pub fn thread(&self) -> ThreadHandle {
        self.session().thread_handle().clone().expect("thread bound")
    }

    /// The player writes into the game thread.
    pub fn player_says(&self, body: &str) {
        self.mailbox.write(&self.thread(), PLAYER, body);
    }

    pub fn last_body(&self) -> String {
        self.mailbox.last_body(&self.thread())
    }

    /// Scripts the oracle and move source for 1.e4 e5.
    pub fn script_e4_e5(&self) {
        self.oracle.legal(START, "e4", AFTER_E4, "e4");
        self.source.propose("e7e5");
        self.oracle.legal(AFTER_E4, "e7e5", AFTER_E4_E5, "e5");
    }
}
