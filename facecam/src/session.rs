use uuid::Uuid;

use crate::camera::Surface;
use crate::command::Command;
use crate::encoder::FrameEncoder;
use crate::messages::{parse_inbound, Inbound, Outbound};
use crate::pacer::Pacer;
use crate::palette::Color;
use crate::roster::{Edit, Patch, Roster, RosterError};
use crate::view::RosterView;

/// What an inbound text frame turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// An annotation batch was folded into the roster.
    Annotated { new_rows: usize },
    /// A frame was acknowledged; current credit after the increment.
    Credit(u32),
    /// Unknown type or malformed text, logged and dropped.
    Ignored,
}

pub struct Session<S, V> {
    id: Uuid,
    surface: S,
    encoder: FrameEncoder,
    pacer: Pacer,
    roster: Roster,
    view: V,
    palette: Vec<Color>,
    open: bool,
}

impl<S: Surface, V: RosterView> Session<S, V> {
    pub fn new(
        surface: S,
        encoder: FrameEncoder,
        pacer: Pacer,
        palette: Vec<Color>,
        view: V,
    ) -> Self {
        let id = Uuid::new_v4();
        log::debug!("session {id} created");
        Self {
            id,
            surface,
            encoder,
            pacer,
            roster: Roster::new(),
            view,
            palette,
            open: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The channel is open: report it and seed the backend's palette.
    pub fn opened(&mut self, peer: &str) -> Outbound {
        self.open = true;
        log::info!("session {} connected to {peer}", self.id);
        self.view.status(&format!("Connected to {peer}"));
        Outbound::palette(&self.palette)
    }

    /// One pacing tick. Returns a `FRAME` only when the channel is open,
    /// the surface has a frame and credit is available.
    pub fn tick(&mut self) -> Option<Outbound> {
        if !self.open || !self.pacer.is_armed() {
            return None;
        }
        let snapshot = self.surface.snapshot()?;

        let data_url = match self.encoder.capture(&snapshot) {
            Ok(data_url) => data_url,
            Err(err) => {
                log::warn!("frame capture failed: {err}");
                return None;
            }
        };
        // Armed was checked above, so this cannot be throttled.
        self.pacer.record_send().ok()?;
        log::trace!(
            "frame sent, credit {} in flight {}",
            self.pacer.credit(),
            self.pacer.in_flight()
        );
        Some(Outbound::Frame { data_url })
    }

    /// Dispatch one inbound text frame. Never fails.
    pub fn receive(&mut self, text: &str) -> Received {
        match parse_inbound(text) {
            Ok(Inbound::Annotated(batch)) => {
                let patches = self.roster.reconcile(&batch);
                let new_rows = patches
                    .iter()
                    .filter(|patch| matches!(patch, Patch::InsertRow(_)))
                    .count();
                for patch in &patches {
                    self.view.apply(patch);
                }
                self.view.flush();
                Received::Annotated { new_rows }
            }
            Ok(Inbound::Processed) => {
                self.pacer.acknowledge();
                Received::Credit(self.pacer.credit())
            }
            Ok(Inbound::Unknown(kind)) => {
                log::warn!("unrecognized message type: {kind}");
                Received::Ignored
            }
            Err(err) => {
                log::warn!("dropping inbound message: {err}");
                Received::Ignored
            }
        }
    }

    /// Apply an operator command. `Stop` is handled by the channel and
    /// yields nothing here.
    pub fn command(&mut self, command: Command) -> Result<Option<Outbound>, RosterError> {
        let edit = match command {
            Command::Label { target, name } => self.roster.rename(&target, &name)?,
            Command::Train { target, on } => self.roster.set_training(&target, on)?,
            Command::List => {
                self.list();
                return Ok(None);
            }
            Command::Stop => return Ok(None),
        };
        Ok(Some(self.render(edit)))
    }

    pub fn errored(&mut self, reason: &str) {
        log::error!("session {} channel error: {reason}", self.id);
        self.view.status(&format!("Error: {reason}"));
    }

    /// The channel closed; it stays closed.
    pub fn closed(&mut self, reason: &str) {
        self.open = false;
        log::info!(
            "session {} closed ({reason}); sent {} frames, {} acknowledged",
            self.id,
            self.pacer.sent(),
            self.pacer.acknowledged()
        );
        self.view.status("Disconnected.");
    }

    fn render(&mut self, edit: Edit) -> Outbound {
        for patch in &edit.patches {
            self.view.apply(patch);
        }
        self.view.flush();
        edit.message
    }

    fn list(&self) {
        if self.roster.is_empty() {
            log::info!("no faces seen yet");
            return;
        }
        for (n, entry) in self.roster.entries().iter().enumerate() {
            log::info!(
                "{:>3}  {}  {:<20} samples {:<5} training {}{}",
                n + 1,
                entry.id,
                entry.name,
                entry.samples,
                if entry.training { "on" } else { "off" },
                if entry.toggle_enabled { "" } else { " (locked)" }
            );
        }
    }
}
