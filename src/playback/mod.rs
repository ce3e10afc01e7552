//! Mode state machine deciding what the cylinder shows.

pub mod assets;

use std::sync::Arc;

use log::*;
use serde::Serialize;
use thiserror::Error;

use crate::config::{DisplayConfig, PlaybackConfig};
use crate::frame::FrameBuffer;
use crate::render::{render_frame, ColumnSink, Pacer};
use crate::storage::{Arena, ArenaError};

pub use assets::{AssetError, AssetKind, AssetLibrary, DirLibrary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Menu,
    Characters,
    Pictures,
    Videos,
}

impl Mode {
    fn asset_kind(self) -> Option<AssetKind> {
        match self {
            Mode::Characters => Some(AssetKind::Characters),
            Mode::Pictures => Some(AssetKind::Pictures),
            Mode::Menu | Mode::Videos => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubMode {
    None,
    RotatingText,
    StaticText,
}

/// Everything the console can change. Only `Controller::step` mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub mode: Mode,
    pub sub_mode: SubMode,
    pub assets: Vec<String>,
    pub selection: Option<usize>,
    pub running: bool,
    pub frame: usize,
    pub rotation: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            mode: Mode::Menu,
            sub_mode: SubMode::None,
            assets: Vec::new(),
            selection: None,
            running: false,
            frame: 0,
            rotation: 0,
        }
    }
}

impl Session {
    fn return_to_menu(&mut self) {
        *self = Session::default();
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("frame unavailable: {0}")]
    Frame(#[from] ArenaError),
    #[error("column emission failed: {0}")]
    Render(String),
}

/// Outcome of one console symbol.
#[derive(Debug)]
pub enum Report {
    Entered(Mode),
    Selected(usize),
    NoMore,
    NoPrevious,
    SubMode(SubMode),
    ReturnedToMenu,
    Unrecognized { mode: Mode, symbol: char },
    Paused,
    PlaybackStopped { frame: usize, error: PlaybackError },
}

impl Report {
    fn log(&self) {
        match self {
            Report::Entered(Mode::Characters) => info!(
                "Entered Characters mode. Use 'n'/'p' to browse, 'r' for rotating text or 's' for static text."
            ),
            Report::Entered(Mode::Pictures) => {
                info!("Entered Pictures mode. Use 'n' for next and 'p' for previous.")
            }
            Report::Entered(Mode::Videos) => {
                info!("Entered Videos mode. Use 's' to start and 'p' to pause playback.")
            }
            Report::Entered(Mode::Menu) | Report::ReturnedToMenu => info!("Returning to General Menu."),
            Report::Selected(i) => info!("Selected asset {}", i),
            Report::NoMore => info!("No more files."),
            Report::NoPrevious => info!("No previous files."),
            Report::SubMode(sub) => info!("Text mode: {:?}", sub),
            Report::Unrecognized { mode, symbol } => {
                warn!("Unrecognized command {:?} in {:?} mode", symbol, mode)
            }
            Report::Paused => info!("Playback paused"),
            Report::PlaybackStopped { frame, error } => {
                error!("Playback stopped at frame {}: {}", frame, error)
            }
        }
    }
}

/// A stream of single-character commands.
pub trait CommandSource {
    /// Next symbol if one is already waiting.
    fn poll(&mut self) -> Option<char>;

    /// Blocks for the next symbol; `None` once the source is closed.
    fn next(&mut self) -> Option<char>;
}

pub struct Controller<S, P, L> {
    sink: S,
    pacer: P,
    library: L,
    arena: Arc<Arena>,
    frame: FrameBuffer,
    blank: FrameBuffer,
    config: PlaybackConfig,
}

impl<S, P, L> Controller<S, P, L>
where
    S: ColumnSink,
    P: Pacer,
    L: AssetLibrary,
{
    pub fn new(
        sink: S,
        pacer: P,
        library: L,
        arena: Arc<Arena>,
        display: &DisplayConfig,
        config: PlaybackConfig,
    ) -> Self {
        let blank = FrameBuffer::blank(display.width, display.height);
        if blank.byte_len() != arena.geometry().block_size {
            warn!(
                "Frame is {} bytes but arena blocks are {}; video frames will fail to load",
                blank.byte_len(),
                arena.geometry().block_size
            );
        }
        Self {
            sink,
            pacer,
            library,
            arena,
            frame: blank.clone(),
            blank,
            config,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes symbols until the source closes.
    pub fn run<C: CommandSource>(&mut self, session: &mut Session, input: &mut C) {
        info!("Controller ready in {:?} mode", session.mode);
        while let Some(symbol) = input.next() {
            self.step(session, symbol, input);
        }
        info!("Command source closed");
    }

    /// Handles one symbol to completion. Video playback blocks in here until
    /// `input` yields a symbol or a frame fails to load.
    pub fn step<C: CommandSource>(&mut self, session: &mut Session, symbol: char, input: &mut C) -> Report {
        let report = match session.mode {
            Mode::Menu => self.menu(session, symbol),
            Mode::Characters | Mode::Pictures => self.browse(session, symbol),
            Mode::Videos => self.video(session, symbol, input),
        };
        report.log();

        if session.mode == Mode::Videos && !session.running && !self.config.idle.is_zero() {
            std::thread::sleep(self.config.idle);
        }
        report
    }

    fn menu(&mut self, session: &mut Session, symbol: char) -> Report {
        match symbol {
            'c' => self.enter(session, Mode::Characters),
            'p' => self.enter(session, Mode::Pictures),
            'v' => {
                *session = Session {
                    mode: Mode::Videos,
                    ..Session::default()
                };
                Report::Entered(Mode::Videos)
            }
            symbol => Report::Unrecognized {
                mode: Mode::Menu,
                symbol,
            },
        }
    }

    fn enter(&mut self, session: &mut Session, mode: Mode) -> Report {
        let assets = match mode.asset_kind().map(|kind| self.library.list(kind)) {
            Some(Ok(assets)) => assets,
            Some(Err(e)) => {
                warn!("{}", e);
                Vec::new()
            }
            None => Vec::new(),
        };
        if assets.is_empty() {
            info!("No {:?} files are uploaded", mode);
        }

        *session = Session {
            mode,
            selection: if assets.is_empty() { None } else { Some(0) },
            assets,
            ..Session::default()
        };
        self.show_selection(session);
        Report::Entered(mode)
    }

    fn browse(&mut self, session: &mut Session, symbol: char) -> Report {
        let mode = session.mode;
        let report = match symbol {
            'n' => match session.selection {
                Some(i) if i + 1 < session.assets.len() => {
                    session.selection = Some(i + 1);
                    Report::Selected(i + 1)
                }
                _ => Report::NoMore,
            },
            'p' => match session.selection {
                Some(i) if i > 0 => {
                    session.selection = Some(i - 1);
                    Report::Selected(i - 1)
                }
                _ => Report::NoPrevious,
            },
            'm' | 'q' => {
                session.return_to_menu();
                Report::ReturnedToMenu
            }
            'r' if mode == Mode::Characters => {
                session.sub_mode = SubMode::RotatingText;
                Report::SubMode(SubMode::RotatingText)
            }
            's' if mode == Mode::Characters => {
                session.sub_mode = SubMode::StaticText;
                session.rotation = 0;
                Report::SubMode(SubMode::StaticText)
            }
            symbol => Report::Unrecognized { mode, symbol },
        };

        self.show_selection(session);
        report
    }

    /// Renders the selected asset, or the blank frame when there is none.
    fn show_selection(&mut self, session: &mut Session) {
        let selected = session
            .selection
            .and_then(|i| session.assets.get(i))
            .zip(session.mode.asset_kind());

        let result = match selected {
            Some((name, kind)) => {
                if let Err(e) = self.library.load(kind, name, &mut self.frame) {
                    error!("Failed to load {}: {}", name, e);
                    return;
                }
                info!("Displaying file: {}", name);
                render_frame(&mut self.sink, &mut self.pacer, &self.frame, session.rotation)
            }
            None => render_frame(&mut self.sink, &mut self.pacer, &self.blank, 0),
        };
        if let Err(e) = result {
            error!("Render failed: {:?}", e);
            return;
        }

        if session.sub_mode == SubMode::RotatingText {
            let width = self.frame.width().max(1);
            session.rotation = (session.rotation + self.config.rotate_step) % width;
        }
    }

    fn video<C: CommandSource>(&mut self, session: &mut Session, symbol: char, input: &mut C) -> Report {
        match symbol {
            's' => {
                session.running = true;
                info!("Playback started at frame {}", session.frame);
                self.play(session, input)
            }
            'p' => {
                session.running = false;
                Report::Paused
            }
            'm' | 'q' => {
                session.return_to_menu();
                self.blank_out();
                Report::ReturnedToMenu
            }
            symbol => {
                session.running = false;
                Report::Unrecognized {
                    mode: Mode::Videos,
                    symbol,
                }
            }
        }
    }

    /// Renders arena slots in order, wrapping at the populated count, until
    /// a symbol arrives or a slot cannot be read.
    fn play<C: CommandSource>(&mut self, session: &mut Session, input: &mut C) -> Report {
        loop {
            let index = session.frame;
            if let Err(e) = self.arena.read_into(index, self.frame.as_bytes_mut()) {
                return self.stop(session, index, e.into());
            }
            if let Err(e) = render_frame(&mut self.sink, &mut self.pacer, &self.frame, 0) {
                return self.stop(session, index, PlaybackError::Render(format!("{e:?}")));
            }

            let populated = self.arena.populated().max(1);
            session.frame = (index + 1) % populated;

            if let Some(symbol) = input.poll() {
                if symbol == 's' {
                    debug!("Already playing");
                    continue;
                }
                session.running = false;
                return match symbol {
                    'p' => Report::Paused,
                    'm' | 'q' => {
                        session.return_to_menu();
                        self.blank_out();
                        Report::ReturnedToMenu
                    }
                    symbol => Report::Unrecognized {
                        mode: Mode::Videos,
                        symbol,
                    },
                };
            }
        }
    }

    fn stop(&mut self, session: &mut Session, frame: usize, error: PlaybackError) -> Report {
        session.running = false;
        session.frame = 0;
        Report::PlaybackStopped { frame, error }
    }

    fn blank_out(&mut self) {
        if let Err(e) = render_frame(&mut self.sink, &mut self.pacer, &self.blank, 0) {
            error!("Render failed: {:?}", e);
        }
    }
}
