use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, TryRecvError};

use anyhow::{anyhow, Context, Result};
use ws::util::{Timeout, Token};
use url::Url;
use ws::{CloseCode, Handler, Handshake, Message, Sender, Settings};

use crate::camera::{Camera, Surface};
use crate::command::{spawn_stdin_reader, Command};
use crate::config::Config;
use crate::encoder::FrameEncoder;
use crate::messages::Outbound;
use crate::pacer::Pacer;
use crate::palette::palette;
use crate::session::Session;
use crate::view::{HtmlPage, LogView, RosterView};

const TICK: Token = Token(1);

// Timer wheel resolution; timeouts are rounded up to a multiple of it.
const TIMER_TICK_MS: u64 = 10;

/// Open the camera, connect to the backend and stream until the
/// channel closes.
pub fn start(config: &Config) -> Result<()> {
    config.validate()?;
    let interval_ms = u64::try_from(config.interval.as_millis()).context("interval too long")?;
    let colors = palette(&config.palette_scheme, config.palette_size)?;
    let encoder = FrameEncoder::new(config.width, config.height, config.quality)?;
    let camera = Camera::start(
        &config.device,
        config.capture_width,
        config.capture_height,
        config.fps,
    );
    let view: Box<dyn RosterView> = match &config.html {
        Some(path) => {
            log::info!("writing roster page to {}", path.display());
            Box::new(HtmlPage::new(path))
        }
        None => Box::new(LogView),
    };
    let session = Session::new(
        camera,
        encoder,
        Pacer::new(config.initial_credit),
        colors,
        view,
    );

    let (command_sender, command_receiver) = channel();
    spawn_stdin_reader(command_sender);

    let session = connect(&config.url, session, command_receiver, interval_ms)?;
    log::info!(
        "session {} ended after {} frames",
        session.id(),
        session.pacer().sent()
    );
    Ok(())
}

/// Run `session` over a websocket to `url` until the connection
/// closes, then hand the session back.
///
/// There is no reconnect: a closed channel stays closed.
pub fn connect<S, V>(
    url: &str,
    session: Session<S, V>,
    commands: Receiver<Command>,
    interval_ms: u64,
) -> Result<Session<S, V>>
where
    S: Surface,
    V: RosterView,
{
    let session = Rc::new(RefCell::new(session));
    let commands = Rc::new(commands);
    let handler_session = Rc::clone(&session);
    let peer = url.to_string();

    let url = Url::parse(url).with_context(|| format!("invalid websocket url {url}"))?;
    let settings = Settings::default();

    log::info!("connecting to {url}");
    let mut socket = ws::Builder::new()
        .with_settings(settings)
        .build(move |out| Client {
            out,
            peer: peer.clone(),
            session: Rc::clone(&handler_session),
            commands: Rc::clone(&commands),
            interval_ms,
            ticker: None,
            stopping: false,
        })?;
    socket.connect(url)?;
    socket.run()?;

    Rc::try_unwrap(session)
        .map(RefCell::into_inner)
        .map_err(|_| anyhow!("session still in use after the channel closed"))
}

/// Websocket handler driving one [`Session`].
struct Client<S, V> {
    out: Sender,
    peer: String,
    session: Rc<RefCell<Session<S, V>>>,
    commands: Rc<Receiver<Command>>,
    interval_ms: u64,
    ticker: Option<Timeout>,
    stopping: bool,
}

impl<S: Surface, V: RosterView> Client<S, V> {
    fn send(&self, message: &Outbound) -> ws::Result<()> {
        match message.to_json() {
            Ok(json) => {
                log::debug!("send {} ({} bytes)", message.kind(), json.len());
                self.out.send(Message::text(json))
            }
            Err(err) => {
                log::error!("failed to serialize {}: {err}", message.kind());
                Ok(())
            }
        }
    }

    fn drain_commands(&mut self) -> ws::Result<()> {
        loop {
            let command = match self.commands.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            };
            if command == Command::Stop {
                return self.stop();
            }
            let outcome = self.session.borrow_mut().command(command);
            match outcome {
                Ok(Some(message)) => self.send(&message)?,
                Ok(None) => {}
                Err(err) => log::warn!("{err}"),
            }
        }
    }

    fn cancel_ticker(&mut self) -> ws::Result<()> {
        match self.ticker.take() {
            Some(timeout) => self.out.cancel(timeout),
            None => Ok(()),
        }
    }

    /// Stop ticking and close the channel.
    fn stop(&mut self) -> ws::Result<()> {
        if self.stopping {
            return Ok(());
        }
        log::info!("stopping");
        self.stopping = true;
        self.cancel_ticker()?;
        self.out.close(CloseCode::Normal)
    }
}

impl<S: Surface, V: RosterView> Handler for Client<S, V> {
    fn on_open(&mut self, shake: Handshake) -> ws::Result<()> {
        let peer = shake
            .peer_addr
            .map(|addr| format!("{} ({addr})", self.peer))
            .unwrap_or_else(|| self.peer.clone());
        let palette = self.session.borrow_mut().opened(&peer);
        self.send(&palette)?;
        self.out.timeout(self.interval_ms, TICK)
    }

    fn on_message(&mut self, msg: Message) -> ws::Result<()> {
        match msg {
            Message::Text(text) => {
                let received = self.session.borrow_mut().receive(&text);
                log::trace!("received {received:?}");
            }
            Message::Binary(data) => log::warn!("ignoring {} byte binary message", data.len()),
        }
        Ok(())
    }

    fn on_timeout(&mut self, event: Token) -> ws::Result<()> {
        if event != TICK {
            return Ok(());
        }
        self.ticker = None;
        self.drain_commands()?;
        if self.stopping {
            return Ok(());
        }

        let frame = self.session.borrow_mut().tick();
        if let Some(frame) = frame {
            self.send(&frame)?;
        }
        self.out.timeout(self.interval_ms, TICK)
    }

    fn on_new_timeout(&mut self, event: Token, timeout: Timeout) -> ws::Result<()> {
        if event == TICK {
            self.ticker = Some(timeout);
        }
        Ok(())
    }

    fn on_error(&mut self, err: ws::Error) {
        self.session.borrow_mut().errored(&err.to_string());
    }

    fn on_close(&mut self, code: CloseCode, reason: &str) {
        self.stopping = true;
        if let Err(err) = self.cancel_ticker() {
            log::debug!("failed to cancel tick: {err}");
        }
        let reason = if reason.is_empty() {
            format!("{code:?}")
        } else {
            format!("{code:?}: {reason}")
        };
        self.session.borrow_mut().closed(&reason);
    }
}
