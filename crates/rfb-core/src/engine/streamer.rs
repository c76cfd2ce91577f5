//! Dirty-region tracker and update streamer.
//!
//! A pass walks every chunk of the grid in raster order. For each chunk the
//! framebuffer checksum is compared with the value cached when that chunk
//! was last delivered; unchanged chunks are skipped, changed ones are sent
//! as a one-rectangle raw FramebufferUpdate.
//!
//! ```text
//!          update requested
//!   Idle ────────────────────▶ Header ──header sent──▶ Data
//!    ▲                          ▲  │                    │
//!    │      last chunk          │  └─unchanged: next────┤
//!    └──────────────────────────┴──────all bytes sent───┘
//! ```
//!
//! Backpressure can interrupt the walk at any write. The state records
//! exactly where it stopped (including the checksum of a header that could
//! not be queued, and how many pixel bytes of the chunk have gone out), and
//! the next call to [`UpdateStreamer::pump`] resumes from there.
//!
//! The grid is fixed to the screen size announced in ServerInit. A pass that
//! finds the framebuffer at a different size fails with
//! [`ConnectionError::ModeChanged`] rather than send rectangles the viewer
//! was never told about.

use std::collections::TryReserveError;

use tracing::{debug, trace, warn};

use crate::domain::grid::{ChecksumGrid, ChunkGrid, ChunkIndex, Rect};
use crate::engine::transport::{SendError, Transport};
use crate::engine::{ConnectionError, EngineConfig};
use crate::framebuffer::Framebuffer;
use crate::protocol::codec::encode_rectangle_header;
use crate::protocol::messages::{RectangleHeader, UpdateRequest};

/// Where the streamer is within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// No pass in progress.
    Idle,
    /// About to examine `chunk`. `blocked` holds the rectangle and checksum
    /// of a header that hit backpressure.
    Header {
        chunk: ChunkIndex,
        blocked: Option<(Rect, u32)>,
    },
    /// Streaming the pixels of `chunk`; `sent` of `len` bytes are out.
    Data {
        chunk: ChunkIndex,
        checksum: u32,
        sent: usize,
        len: usize,
    },
}

/// Per-connection send side.
#[derive(Debug)]
pub struct UpdateStreamer {
    max_segment: usize,
    retry_ticks: u32,
    bytes_per_pixel: usize,
    grid: ChunkGrid,
    checksums: ChecksumGrid,
    scratch: Vec<u8>,
    state: SendState,
    update_requested: bool,
    incremental: bool,
    requested: Rect,
    sent_this_pass: bool,
    retry_countdown: u32,
}

impl UpdateStreamer {
    /// Builds a streamer for the `width` × `height` screen announced to the
    /// viewer.
    ///
    /// # Errors
    ///
    /// Fails if the scratch buffer for the largest chunk cannot be allocated.
    pub fn new(
        config: &EngineConfig,
        width: u16,
        height: u16,
        bytes_per_pixel: usize,
    ) -> Result<Self, TryReserveError> {
        let grid = ChunkGrid::new(width, height, config.grid_columns, config.grid_rows);
        let scratch = allocate_scratch(grid.max_chunk_pixels() * bytes_per_pixel)?;
        Ok(Self {
            max_segment: config.max_segment.max(1),
            retry_ticks: config.retry_ticks,
            bytes_per_pixel,
            grid,
            checksums: ChecksumGrid::new(grid.columns(), grid.rows()),
            scratch,
            state: SendState::Idle,
            update_requested: false,
            incremental: true,
            requested: Rect::default(),
            sent_this_pass: false,
            retry_countdown: 0,
        })
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SendState::Idle
    }

    pub fn update_requested(&self) -> bool {
        self.update_requested
    }

    /// Ticks left before a deferred retry fires; zero when none is armed.
    pub fn retry_countdown(&self) -> u32 {
        self.retry_countdown
    }

    /// Rectangle named in the most recent update request.
    pub fn requested_area(&self) -> Rect {
        self.requested
    }

    /// Checksum cached for a chunk.
    pub fn cached_checksum(&self, chunk: ChunkIndex) -> u32 {
        self.checksums.get(chunk)
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// Records a FramebufferUpdateRequest.
    pub fn request(&mut self, req: &UpdateRequest) {
        self.requested = Rect {
            x: req.x,
            y: req.y,
            width: req.width,
            height: req.height,
        };
        // A full refresh sticks until the pass that honours it starts.
        self.incremental &= req.incremental;
        self.update_requested = true;
        // The viewer asked first; a pending deferred retry is superseded.
        self.retry_countdown = 0;
    }

    /// Runs the state machine until it goes idle with nothing requested, or
    /// the transport pushes back.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Transport`] if the transport is closed, and
    /// [`ConnectionError::ModeChanged`] if the framebuffer no longer has the
    /// size the viewer was given.
    pub fn pump(
        &mut self,
        framebuffer: &dyn Framebuffer,
        transport: &mut dyn Transport,
    ) -> Result<(), ConnectionError> {
        loop {
            match self.state {
                SendState::Idle => {
                    if !self.update_requested {
                        return Ok(());
                    }
                    if !self.begin_pass(framebuffer)? {
                        return Ok(());
                    }
                }
                SendState::Header { chunk, blocked } => {
                    let (rect, checksum) = match blocked {
                        Some(saved) => saved,
                        None => {
                            let rect = self.grid.chunk_rect(chunk);
                            if rect.is_empty() {
                                self.advance(chunk);
                                continue;
                            }
                            let checksum = framebuffer.checksum_rect(rect);
                            if checksum == self.checksums.get(chunk) {
                                self.advance(chunk);
                                continue;
                            }
                            self.sent_this_pass = true;
                            (rect, checksum)
                        }
                    };

                    let header = encode_rectangle_header(&RectangleHeader {
                        x: rect.x,
                        y: rect.y,
                        width: rect.width,
                        height: rect.height,
                    });
                    match transport.send(&header) {
                        Ok(()) => {}
                        Err(SendError::WouldBlock) => {
                            trace!("header for chunk {:?} blocked", chunk);
                            self.state = SendState::Header {
                                chunk,
                                blocked: Some((rect, checksum)),
                            };
                            return Ok(());
                        }
                        Err(e) => return Err(e.into()),
                    }

                    let len = rect.area() * self.bytes_per_pixel;
                    framebuffer.copy_pixels(rect, &mut self.scratch[..len]);
                    trace!("sending chunk {:?} {:?}", chunk, rect);
                    self.state = SendState::Data {
                        chunk,
                        checksum,
                        sent: 0,
                        len,
                    };
                }
                SendState::Data {
                    chunk,
                    checksum,
                    mut sent,
                    len,
                } => {
                    while sent < len {
                        let end = (sent + self.max_segment).min(len);
                        match transport.send(&self.scratch[sent..end]) {
                            Ok(()) => sent = end,
                            Err(SendError::WouldBlock) => {
                                trace!("chunk {:?} blocked at {sent}/{len}", chunk);
                                self.state = SendState::Data {
                                    chunk,
                                    checksum,
                                    sent,
                                    len,
                                };
                                return Ok(());
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                    self.checksums.commit(chunk, checksum);
                    self.advance(chunk);
                }
            }
        }
    }

    /// Periodic tick: resume streaming, then count down a deferred retry.
    /// When the countdown expires an update is requested and streaming is
    /// kicked straight away.
    pub fn tick(
        &mut self,
        framebuffer: &dyn Framebuffer,
        transport: &mut dyn Transport,
    ) -> Result<(), ConnectionError> {
        self.pump(framebuffer, transport)?;
        if self.retry_countdown > 0 {
            self.retry_countdown -= 1;
            if self.retry_countdown == 0 {
                trace!("deferred retry fired");
                self.update_requested = true;
                self.pump(framebuffer, transport)?;
            }
        }
        Ok(())
    }

    /// Starts a pass. Returns `false` when there is nothing to walk.
    fn begin_pass(&mut self, framebuffer: &dyn Framebuffer) -> Result<bool, ConnectionError> {
        self.update_requested = false;
        self.sent_this_pass = false;

        let Some(mode) = framebuffer.current_mode() else {
            debug!("no framebuffer mode; skipping update pass");
            self.finish_pass();
            return Ok(false);
        };
        let advertised = self.grid.screen_size();
        if (mode.width, mode.height) != advertised {
            warn!(
                "screen is now {}x{}, viewer was told {}x{}",
                mode.width, mode.height, advertised.0, advertised.1
            );
            return Err(ConnectionError::ModeChanged {
                advertised,
                current: (mode.width, mode.height),
            });
        }
        if !self.incremental {
            self.checksums.reset();
        }
        self.incremental = true;

        debug!("update pass started");
        self.state = SendState::Header {
            chunk: ChunkIndex::default(),
            blocked: None,
        };
        Ok(true)
    }

    fn advance(&mut self, chunk: ChunkIndex) {
        match self.grid.next(chunk) {
            Some(next) => {
                self.state = SendState::Header {
                    chunk: next,
                    blocked: None,
                }
            }
            None => self.finish_pass(),
        }
    }

    fn finish_pass(&mut self) {
        self.state = SendState::Idle;
        if !self.sent_this_pass {
            trace!("nothing changed; retry in {} ticks", self.retry_ticks);
            self.retry_countdown = self.retry_ticks;
        }
    }
}

fn allocate_scratch(len: usize) -> Result<Vec<u8>, TryReserveError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
