//! Application service: the alarm engine worker.
//!
//! [`AlarmService`] owns every piece of mutable engine state: the mode, the
//! per-event phases, the confirmation windows, the dispatcher and the timer
//! queue.  It is driven by one consumer loop that pops [`Signal`]s in
//! arrival order; all I/O flows through the [`AlarmIo`] port set passed in
//! at call sites, so the whole engine runs against mock adapters in tests.
//!
//! ```text
//!  SignalQueue ──▶ ┌──────────────────────────────┐ ──▶ OutputPort
//!                  │         AlarmService         │ ──▶ NotifyPort
//!   TimerQueue ◀──▶│  match · gates · dispatch    │ ──▶ PublishPort
//!                  └──────────────────────────────┘ ──▶ EventSink
//! ```

use core::fmt::Write;
use core::time::Duration;
use std::cell::Cell;
use std::rc::Rc;

use burster::Limiter;
use log::{debug, info, warn};

use crate::alarm::dispatcher::{Dispatch, ResponseDispatcher};
use crate::alarm::gates::{Confirmation, ConfirmationGate, Count};
use crate::alarm::matcher::{Match, match_code};
use crate::alarm::mode::{ModeController, PublishedMode};
use crate::alarm::registry::{EventId, Registry};
use crate::alarm::state::{EventTable, PersistedState};
use crate::alarm::{Direction, EventKind, EventPhase, MAX_EVENTS, Mode, ResponseKind};
use crate::config::AlarmConfig;
use crate::error::{OperationalError, SignalError};
use crate::events::{InputSignal, Signal, SignalQueue};
use crate::timers::{EventTimer, TimerQueue, TimerTag};

use super::commands::AdminCommand;
use super::events::{AlarmEvent, StatusSnapshot};
use super::ports::{AlarmIo, TimerDelegate};

/// Undefined-signal notifications: sustained rate per second and burst.
const UNDEFINED_NOTIFY_RATE: u64 = 1;
const UNDEFINED_NOTIFY_BURST: u64 = 3;

// ───────────────────────────────────────────────────────────────
// Timer delegate
// ───────────────────────────────────────────────────────────────

/// Posts due timers into the input queue as synthetic signals.
pub struct QueueDelegate<'a> {
    queue: &'a SignalQueue,
}

impl<'a> QueueDelegate<'a> {
    pub fn new(queue: &'a SignalQueue) -> Self {
        Self { queue }
    }
}

impl TimerDelegate for QueueDelegate<'_> {
    fn on_timer_fired(&mut self, tag: TimerTag, now_ms: u32) -> bool {
        self.queue
            .post(Signal::Timer { tag, at_ms: now_ms })
            .is_ok()
    }
}

// ───────────────────────────────────────────────────────────────
// AlarmService
// ───────────────────────────────────────────────────────────────

pub struct AlarmService {
    registry: Registry,
    config: AlarmConfig,
    events: EventTable,
    confirmations: ConfirmationGate,
    modes: ModeController,
    dispatcher: ResponseDispatcher,
    timers: TimerQueue,
    undefined_limiter: burster::TokenBucket<Box<dyn Fn() -> Duration>>,
    /// Engine time fed to the limiter, advanced by signal timestamps.
    limiter_clock: Rc<Cell<Duration>>,
    limiter_last_ms: Option<u32>,
    stopped: bool,
}

impl AlarmService {
    /// Construct the worker around a frozen registry.
    ///
    /// Starts DISABLED with every event idle.  Call [`start`](Self::start)
    /// to restore the persisted state before processing signals.
    pub fn new(registry: Registry, config: AlarmConfig) -> Self {
        Self::build(registry, config, ModeController::new(Mode::Disabled))
    }

    /// Like [`new`](Self::new) but publishing the mode into `snapshot`
    /// instead of the process-wide one.
    pub fn with_snapshot(
        registry: Registry,
        config: AlarmConfig,
        snapshot: &'static PublishedMode,
    ) -> Self {
        Self::build(
            registry,
            config,
            ModeController::with_snapshot(Mode::Disabled, snapshot),
        )
    }

    fn build(registry: Registry, config: AlarmConfig, modes: ModeController) -> Self {
        let events = EventTable::new(registry.event_count());
        let dispatcher = ResponseDispatcher::new(&config);
        let limiter_clock = Rc::new(Cell::new(Duration::ZERO));
        let provider = Rc::clone(&limiter_clock);
        let time_provider: Box<dyn Fn() -> Duration> = Box::new(move || provider.get());
        Self {
            registry,
            config,
            events,
            confirmations: ConfirmationGate::new(),
            modes,
            dispatcher,
            timers: TimerQueue::new(),
            undefined_limiter: burster::TokenBucket::new_with_time_provider(
                UNDEFINED_NOTIFY_RATE,
                UNDEFINED_NOTIFY_BURST,
                time_provider,
            ),
            limiter_clock,
            limiter_last_ms: None,
            stopped: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the persisted mode, alarm counter and active events, then
    /// announce the start.  The siren always starts off.
    pub fn start(&mut self, now_ms: u32, io: &mut impl AlarmIo) {
        let mut restored = 0;
        if let Some(saved) = PersistedState::load(&*io) {
            self.modes.restore(saved.mode);
            self.dispatcher.restore_alarms(saved.alarms);
            for raw in saved.active.iter().copied() {
                let Some(id) = self.registry.event_id(raw) else {
                    warn!("AlarmService: stored event #{} no longer exists", raw);
                    continue;
                };
                self.enter_active(id, now_ms);
                self.restore_outputs(id, now_ms, io);
                restored += 1;
            }
            info!(
                "AlarmService: restored {:?}, {} active event(s), {} alarm(s)",
                saved.mode, restored, saved.alarms
            );
        }

        let mode = self.modes.current();
        io.set_armed_led(mode != Mode::Disabled);
        io.emit(&AlarmEvent::Started {
            mode,
            restored_active: restored,
        });
        self.publish_status(io);
    }

    /// Drain and stop.  The queue is closed first so producers get
    /// `QueueClosed`; what is already queued is still processed.
    pub fn shutdown(&mut self, queue: &SignalQueue, io: &mut impl AlarmIo) {
        if self.stopped {
            return;
        }
        queue.close();
        let mut drained = 0;
        while let Some(signal) = queue.pop() {
            self.process(signal, io);
            drained += 1;
        }
        let cancelled = self.timers.cancel_all();
        self.persist(io);
        self.stopped = true;
        info!(
            "AlarmService: stopped ({} drained, {} timer(s) cancelled)",
            drained, cancelled
        );
        io.emit(&AlarmEvent::Stopped);
    }

    // ── Worker loop ───────────────────────────────────────────

    /// Post every due timer into `queue`.
    pub fn fire_due_timers(&mut self, now_ms: u32, queue: &SignalQueue) -> usize {
        let mut delegate = QueueDelegate::new(queue);
        self.timers.poll(now_ms, &mut delegate)
    }

    /// One worker iteration: report drops, fire due timers, then process
    /// everything queued.  Returns the number of signals processed.
    pub fn run_once(&mut self, queue: &SignalQueue, now_ms: u32, io: &mut impl AlarmIo) -> usize {
        if self.stopped {
            return 0;
        }
        let dropped = queue.take_dropped();
        if dropped > 0 {
            warn!("AlarmService: {} signal(s) dropped on a full queue", dropped);
            io.emit(&AlarmEvent::SignalsDropped(dropped));
        }
        self.fire_due_timers(now_ms, queue);

        let mut handled = 0;
        while let Some(signal) = queue.pop() {
            self.process(signal, io);
            handled += 1;
        }
        handled
    }

    /// Process one signal to completion.
    pub fn process(&mut self, signal: Signal, io: &mut impl AlarmIo) {
        if self.stopped {
            debug!("AlarmService: stopped, ignoring {:?}", signal);
            return;
        }
        match signal {
            Signal::Input(input) => self.on_input(input, io),
            Signal::Timer { tag, at_ms } => self.on_timer(tag, at_ms, io),
            Signal::Admin { command, at_ms } => self.on_admin(command, at_ms, io),
        }
    }

    // ── Inputs ────────────────────────────────────────────────

    fn on_input(&mut self, input: InputSignal, io: &mut impl AlarmIo) {
        let Some(sensor) = self.registry.find_sensor(input.kind, input.address) else {
            self.undefined(
                SignalError::UnknownSensor {
                    kind: input.kind,
                    address: input.address,
                },
                input.at_ms,
                io,
            );
            return;
        };
        match match_code(&self.registry, sensor, input.code) {
            Match::Event(id, Direction::Trigger) => self.on_trigger(id, input.at_ms, io),
            Match::Event(id, Direction::Cancel) => self.on_cancel(id, input.at_ms, io),
            Match::Unmatched => self.undefined(
                SignalError::UnknownCommand {
                    kind: input.kind,
                    address: input.address,
                    code: input.code,
                },
                input.at_ms,
                io,
            ),
        }
    }

    fn undefined(&mut self, error: SignalError, at_ms: u32, io: &mut impl AlarmIo) {
        warn!("AlarmService: {}", error);
        io.emit(&AlarmEvent::Undefined(error));
        let wanted = match error {
            SignalError::UnknownSensor { .. } => self.config.notify_undefined_sensor,
            SignalError::UnknownCommand { .. } => self.config.notify_undefined_command,
            SignalError::MalformedFrame => false,
        };
        if !wanted {
            return;
        }
        self.advance_limiter_clock(at_ms);
        if self.undefined_limiter.try_consume(1).is_err() {
            debug!("AlarmService: undefined-signal notification rate limited");
            return;
        }
        let mut text: heapless::String<96> = heapless::String::new();
        let _ = write!(text, "{}", error);
        io.notify(&text, "", EventKind::Alarm);
    }

    fn advance_limiter_clock(&mut self, now_ms: u32) {
        if let Some(last) = self.limiter_last_ms {
            let delta = now_ms.wrapping_sub(last);
            // Out-of-order timestamps never move the clock back.
            if delta > u32::MAX / 2 {
                return;
            }
            let now = self.limiter_clock.get() + Duration::from_millis(u64::from(delta));
            self.limiter_clock.set(now);
        }
        self.limiter_last_ms = Some(now_ms);
    }

    fn on_trigger(&mut self, id: EventId, now_ms: u32, io: &mut impl AlarmIo) {
        let binding = self.registry.event(id);
        let zone = binding.zone;
        let threshold = binding.spec.threshold;
        let auto_reset_ms = binding.spec.auto_reset_ms;
        let confirm = binding.spec.confirm;

        let state = self.events.get_mut(id);
        state.last_signal_ms = Some(now_ms);
        let phase = state.phase();

        if phase == EventPhase::Active {
            if auto_reset_ms > 0 {
                let token = state.token();
                arm_timer(
                    &mut self.timers,
                    event_tag(EventTimer::AutoReset, id, token),
                    now_ms,
                    auto_reset_ms,
                );
            }
            debug!("AlarmService: event #{} re-triggered while active", id.raw());
            return;
        }

        let window = if auto_reset_ms > 0 {
            auto_reset_ms
        } else {
            self.config.threshold_window_ms
        };
        if let Count::Counting(count) = state.gate.register(now_ms, threshold, window) {
            let token = match phase {
                EventPhase::Idle => state.enter(EventPhase::Pending),
                // A lapsed window restarts the count; the old window timer goes stale.
                EventPhase::Pending if count == 1 => state.enter(EventPhase::Pending),
                _ => state.token(),
            };
            if count == 1 {
                let tag = event_tag(EventTimer::CountWindow, id, token);
                arm_timer(&mut self.timers, tag, now_ms, window);
            }
            debug!("AlarmService: event #{} counting {}/{}", id.raw(), count, threshold);
            io.emit(&AlarmEvent::Counting {
                event: id,
                count,
                threshold,
            });
            return;
        }
        self.timers.cancel(EventTimer::CountWindow, id);

        let response = self
            .registry
            .zone(zone)
            .response(self.modes.current(), Direction::Trigger);

        if response == Some(ResponseKind::Control) {
            // Remote buttons are momentary: dispatch and fall back to idle.
            self.events.get_mut(id).enter(EventPhase::Idle);
            self.dispatch(id, Direction::Trigger, now_ms, io);
            return;
        }

        if confirm && response.is_some_and(ResponseKind::escalates) {
            let window = self.config.confirmation_window_ms;
            match self.confirmations.offer(zone, id, now_ms, window) {
                Confirmation::Opened { token, superseded } => {
                    if let Some(old) = superseded {
                        self.timers.cancel(EventTimer::ConfirmWindow, old);
                        let old_state = self.events.get_mut(old);
                        if old_state.phase() == EventPhase::AwaitingConfirmation {
                            old_state.enter(EventPhase::Idle);
                        }
                    }
                    self.events
                        .get_mut(id)
                        .enter(EventPhase::AwaitingConfirmation);
                    let tag = event_tag(EventTimer::ConfirmWindow, id, token);
                    arm_timer(&mut self.timers, tag, now_ms, window);
                    let zone = self.registry.zone(zone).name.clone();
                    info!(
                        "AlarmService: event #{} awaiting confirmation in '{}'",
                        id.raw(),
                        zone
                    );
                    io.emit(&AlarmEvent::AwaitingConfirmation { event: id, zone });
                    return;
                }
                Confirmation::Confirmed { opener } => {
                    self.timers.cancel(EventTimer::ConfirmWindow, opener);
                    if opener != id {
                        let opener_state = self.events.get_mut(opener);
                        if opener_state.phase() == EventPhase::AwaitingConfirmation {
                            opener_state.enter(EventPhase::Idle);
                        }
                    }
                    info!(
                        "AlarmService: event #{} confirmed by event #{}",
                        opener.raw(),
                        id.raw()
                    );
                }
            }
        }

        self.enter_active(id, now_ms);
        self.dispatch(id, Direction::Trigger, now_ms, io);
        self.persist(io);
    }

    fn on_cancel(&mut self, id: EventId, now_ms: u32, io: &mut impl AlarmIo) {
        let state = self.events.get_mut(id);
        state.last_signal_ms = Some(now_ms);
        match state.phase() {
            EventPhase::Active => {
                state.enter(EventPhase::Idle);
                self.timers.cancel(EventTimer::AutoReset, id);
                self.timers.cancel(EventTimer::Republish, id);
                self.dispatch(id, Direction::Cancel, now_ms, io);
                self.persist(io);
            }
            EventPhase::Pending => {
                state.enter(EventPhase::Idle);
                self.timers.cancel(EventTimer::CountWindow, id);
                debug!("AlarmService: event #{} cancelled while counting", id.raw());
            }
            EventPhase::AwaitingConfirmation => {
                // The zone's window stays open for a sibling.
                state.enter(EventPhase::Idle);
                debug!(
                    "AlarmService: event #{} cancelled while awaiting confirmation",
                    id.raw()
                );
            }
            EventPhase::Idle => {
                debug!("AlarmService: cancel for idle event #{}", id.raw());
            }
        }
    }

    fn enter_active(&mut self, id: EventId, now_ms: u32) {
        let spec = &self.registry.event(id).spec;
        let state = self.events.get_mut(id);
        let token = state.enter(EventPhase::Active);
        state.active_since_ms = Some(now_ms);
        if spec.auto_reset_ms > 0 {
            arm_timer(
                &mut self.timers,
                event_tag(EventTimer::AutoReset, id, token),
                now_ms,
                spec.auto_reset_ms,
            );
        }
        if spec.republish_secs > 0 {
            arm_timer(
                &mut self.timers,
                event_tag(EventTimer::Republish, id, token),
                now_ms,
                spec.republish_secs.saturating_mul(1000),
            );
        }
    }

    fn restore_outputs(&self, id: EventId, now_ms: u32, io: &mut impl AlarmIo) {
        let binding = self.registry.event(id);
        let d = Dispatch {
            event: id,
            binding,
            sensor: self.registry.sensor(binding.sensor),
            zone: self.registry.zone(binding.zone),
            direction: Direction::Trigger,
            now_ms,
        };
        self.dispatcher.restore_active(&d, self.modes.current(), io);
    }

    fn dispatch(&mut self, id: EventId, direction: Direction, now_ms: u32, io: &mut impl AlarmIo) {
        let binding = self.registry.event(id);
        let d = Dispatch {
            event: id,
            binding,
            sensor: self.registry.sensor(binding.sensor),
            zone: self.registry.zone(binding.zone),
            direction,
            now_ms,
        };
        let outcome = self
            .dispatcher
            .execute(&d, &mut self.modes, &mut self.timers, io);
        if outcome.mode_change.is_some() {
            self.persist(io);
        }
        self.publish_status(io);
    }

    // ── Timers ────────────────────────────────────────────────

    fn on_timer(&mut self, tag: TimerTag, at_ms: u32, io: &mut impl AlarmIo) {
        let (kind, id, token) = match tag {
            TimerTag::Siren { token } => {
                if self
                    .dispatcher
                    .siren_timeout(token, &mut self.timers, io)
                {
                    self.publish_status(io);
                } else {
                    debug!("AlarmService: siren timer: {}", OperationalError::StaleTimer);
                }
                return;
            }
            TimerTag::Event { kind, event, token } => (kind, event, token),
        };
        if self.registry.event_id(id.raw()).is_none() {
            warn!("AlarmService: timer for unknown event #{}", id.raw());
            return;
        }

        if kind == EventTimer::ConfirmWindow {
            let zone = self.registry.event(id).zone;
            if !self.confirmations.expire(zone, id, token) {
                debug!("AlarmService: confirm window: {}", OperationalError::StaleTimer);
                return;
            }
            let state = self.events.get_mut(id);
            if state.phase() == EventPhase::AwaitingConfirmation {
                state.enter(EventPhase::Idle);
                let zone = self.registry.zone(zone).name.clone();
                info!("AlarmService: event #{} unconfirmed in '{}'", id.raw(), zone);
                io.emit(&AlarmEvent::Unconfirmed { event: id, zone });
            }
            return;
        }

        let state = self.events.get_mut(id);
        if state.token() != token {
            debug!(
                "AlarmService: {:?} for event #{}: {}",
                kind,
                id.raw(),
                OperationalError::StaleTimer
            );
            return;
        }
        match (kind, state.phase()) {
            (EventTimer::AutoReset, EventPhase::Active) => {
                info!("AlarmService: event #{} auto-reset", id.raw());
                self.on_cancel(id, at_ms, io);
            }
            (EventTimer::CountWindow, EventPhase::Pending) => {
                state.enter(EventPhase::Idle);
                debug!("AlarmService: event #{} count window lapsed", id.raw());
            }
            (EventTimer::Republish, EventPhase::Active) => {
                let binding = self.registry.event(id);
                let d = Dispatch {
                    event: id,
                    binding,
                    sensor: self.registry.sensor(binding.sensor),
                    zone: self.registry.zone(binding.zone),
                    direction: Direction::Trigger,
                    now_ms: at_ms,
                };
                self.dispatcher.republish(&d, self.modes.current(), io);
                arm_timer(
                    &mut self.timers,
                    tag,
                    at_ms,
                    binding.spec.republish_secs.saturating_mul(1000),
                );
            }
            (kind, phase) => {
                debug!(
                    "AlarmService: {:?} ignored for event #{} in {:?}",
                    kind,
                    id.raw(),
                    phase
                );
            }
        }
    }

    // ── Administrative overrides ──────────────────────────────

    fn on_admin(&mut self, command: AdminCommand, _at_ms: u32, io: &mut impl AlarmIo) {
        info!("AlarmService: admin {:?}", command);
        match command {
            AdminCommand::SilenceSiren => {
                if self.dispatcher.silence(&mut self.timers, io) {
                    self.publish_status(io);
                }
            }
            AdminCommand::ForceClear => {
                let busy: heapless::Vec<u8, MAX_EVENTS> = self.events.busy().collect();
                for raw in busy.iter().copied() {
                    let Some(id) = self.registry.event_id(raw) else {
                        continue;
                    };
                    let state = self.events.get_mut(id);
                    let was_active = state.phase() == EventPhase::Active;
                    state.enter(EventPhase::Idle);
                    self.timers.cancel_event(id);
                    if was_active {
                        let zone = self.registry.zone(self.registry.event(id).zone);
                        if let Some(relay) = zone.relay {
                            io.set_relay(relay, false);
                        }
                    }
                }
                self.confirmations.clear_all();
                self.dispatcher.silence(&mut self.timers, io);
                io.emit(&AlarmEvent::ForcedClear {
                    cleared: busy.len(),
                });
                self.persist(io);
                self.publish_status(io);
            }
            AdminCommand::PublishStatus => self.publish_status(io),
        }
    }

    // ── Persistence and status ────────────────────────────────

    fn persist(&self, io: &mut impl AlarmIo) {
        let state = PersistedState::new(
            self.modes.current(),
            self.dispatcher.alarms(),
            self.events.active(),
        );
        if let Err(e) = state.save(io) {
            warn!("AlarmService: persist failed ({})", e);
        }
    }

    fn publish_status(&self, io: &mut impl AlarmIo) {
        self.dispatcher.publish_status(&self.snapshot(), io);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.modes.current()
    }

    pub fn phase(&self, id: EventId) -> EventPhase {
        self.events.get(id).phase()
    }

    pub fn siren_active(&self) -> bool {
        self.dispatcher.siren_on()
    }

    pub fn alarm_count(&self) -> u32 {
        self.dispatcher.alarms()
    }

    pub fn active_count(&self) -> usize {
        self.events.active_count()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.dispatcher
            .status(self.modes.current(), self.events.active_count())
    }
}

fn event_tag(kind: EventTimer, event: EventId, token: u16) -> TimerTag {
    TimerTag::Event { kind, event, token }
}

fn arm_timer(timers: &mut TimerQueue, tag: TimerTag, now_ms: u32, duration_ms: u32) {
    if !timers.arm(tag, now_ms, duration_ms) {
        warn!("AlarmService: {:?} not armed, timer queue full", tag);
    }
}
