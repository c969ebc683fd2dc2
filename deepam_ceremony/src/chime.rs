//! Temple-bell chimes over MIDI.
//!
//! A background thread turns phase notices into notes: a rising bell
//! arpeggio when the lamp is kindled, a held chord while the blessing is
//! shown, and silence when the ceremony returns to idle. Dropping the
//! [`Chime`] handle releases every note and joins the thread.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ceremony_core::PhaseNotice;
use tracing::{debug, info, warn};

/// General MIDI program 14 (0-based): Tubular Bells.
pub const TUBULAR_BELLS: u8 = 14;

/// Spacing between the notes of the kindling arpeggio.
const ARPEGGIO_STEP: Duration = Duration::from_millis(140);

// C major bell voicings, MIDI note numbers.
const KINDLE_NOTES: [u8; 4] = [72, 76, 79, 84];
const BLESSING_CHORD: [u8; 4] = [60, 67, 72, 76];

// ════════════════════════════════════════════════════════════════════════════
// ChimeCommand: sent to the chime thread
// ════════════════════════════════════════════════════════════════════════════

pub enum ChimeCommand {
    /// React to a ceremony phase change.
    Notice(PhaseNotice),
    /// Terminate the thread.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// Voicing: what a notice sounds like
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voicing {
    /// Strike the notes one after another, letting each ring.
    Arpeggio(&'static [u8]),
    /// Strike all notes together and hold them.
    Chord(&'static [u8]),
    /// Release everything that is sounding.
    Silence,
    /// No sound for this notice.
    Rest,
}

pub fn voicing_for(notice: PhaseNotice) -> Voicing {
    match notice {
        PhaseNotice::EnteredLit => Voicing::Arpeggio(&KINDLE_NOTES),
        PhaseNotice::EnteredBlessing => Voicing::Chord(&BLESSING_CHORD),
        PhaseNotice::EnteredIdle => Voicing::Silence,
        PhaseNotice::EnteredApproaching => Voicing::Rest,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut: abstraction over midir / null (for testing)
// ════════════════════════════════════════════════════════════════════════════

trait MidiOut: Send {
    fn program_change(&mut self, channel: u8, program: u8);
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
    fn all_notes_off(&mut self, channel: u8);
}

// ── midir backend ─────────────────────────────────────────────────────────

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn program_change(&mut self, channel: u8, program: u8) {
        let _ = self.conn.send(&[0xC0 | (channel & 0x0F), program & 0x7F]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let _ = self.conn.send(&[0x90 | (channel & 0x0F), note, velocity]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        let _ = self.conn.send(&[0x80 | (channel & 0x0F), note, 0]);
    }
    fn all_notes_off(&mut self, channel: u8) {
        // Controller 123: All Notes Off.
        let _ = self.conn.send(&[0xB0 | (channel & 0x0F), 123, 0]);
    }
}

// ── null backend (used when no MIDI port is available) ────────────────────

struct NullOut;
impl MidiOut for NullOut {
    fn program_change(&mut self, _ch: u8, _p: u8) {}
    fn note_on(&mut self, _ch: u8, _n: u8, _v: u8) {}
    fn note_off(&mut self, _ch: u8, _n: u8) {}
    fn all_notes_off(&mut self, _ch: u8) {}
}

// ════════════════════════════════════════════════════════════════════════════
// open_midi_output: enumerate ports and pick first available
// ════════════════════════════════════════════════════════════════════════════

/// Try to open the first available MIDI output port.
/// Falls back to `NullOut` with a warning if none found.
fn open_midi_output() -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("deepam_ceremony") {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "MIDI init failed, chimes disabled");
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports found, chimes disabled");
        info!("install a MIDI synthesiser such as `timidity -iA` or `fluidsynth` to hear the bells");
        return Box::new(NullOut);
    }

    // Prefer a softsynth if visible
    let port_idx = ports
        .iter()
        .position(|p| {
            midi_out
                .port_name(p)
                .map(|n| {
                    let n = n.to_lowercase();
                    n.contains("fluid") || n.contains("timidity") || n.contains("microsoft") || n.contains("synth")
                })
                .unwrap_or(false)
        })
        .unwrap_or(0);

    let port = &ports[port_idx];
    let name = midi_out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
    info!(port = %name, "opening MIDI port");

    match midi_out.connect(port, "deepam-chime") {
        Ok(conn) => Box::new(MidirOut { conn }),
        Err(e) => {
            warn!(error = %e, "failed to connect MIDI port, chimes disabled");
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Chime: the bell thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChimeConfig {
    pub instrument: u8,
    pub velocity: u8,
    pub channel: u8,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        ChimeConfig { instrument: TUBULAR_BELLS, velocity: 96, channel: 0 }
    }
}

/// Handle to the chime thread.
pub struct Chime {
    cmd_tx: Sender<ChimeCommand>,
    thread: Option<JoinHandle<()>>,
}

impl Chime {
    /// Open the MIDI port (or the null fallback) and spawn the chime thread.
    pub fn spawn(config: ChimeConfig) -> Self {
        Self::with_output(open_midi_output(), config)
    }

    fn with_output(midi: Box<dyn MidiOut>, config: ChimeConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<ChimeCommand>();
        let thread = thread::spawn(move || chime_thread(midi, config, cmd_rx));
        Chime { cmd_tx, thread: Some(thread) }
    }

    pub fn notify(&self, notice: PhaseNotice) {
        let _ = self.cmd_tx.send(ChimeCommand::Notice(notice));
    }

    pub fn quit(&self) {
        let _ = self.cmd_tx.send(ChimeCommand::Quit);
    }
}

impl Drop for Chime {
    fn drop(&mut self) {
        self.quit();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("chime thread panicked");
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// chime_thread: the actual loop
// ════════════════════════════════════════════════════════════════════════════

fn chime_thread(mut midi: Box<dyn MidiOut>, config: ChimeConfig, cmd_rx: Receiver<ChimeCommand>) {
    let ChimeConfig { instrument, velocity, channel } = config;
    midi.program_change(channel, instrument);

    let mut sounding: Vec<u8> = Vec::new();

    for cmd in cmd_rx {
        match cmd {
            ChimeCommand::Notice(notice) => {
                let voicing = voicing_for(notice);
                debug!(?notice, ?voicing, "chime");
                play(midi.as_mut(), voicing, channel, velocity, &mut sounding);
            }
            ChimeCommand::Quit => break,
        }
    }

    release(midi.as_mut(), channel, &mut sounding);
}

fn play(midi: &mut dyn MidiOut, voicing: Voicing, channel: u8, velocity: u8, sounding: &mut Vec<u8>) {
    match voicing {
        Voicing::Arpeggio(notes) => {
            for (i, &note) in notes.iter().enumerate() {
                if i > 0 {
                    thread::sleep(ARPEGGIO_STEP);
                }
                midi.note_on(channel, note, velocity);
                sounding.push(note);
            }
        }
        Voicing::Chord(notes) => {
            release(midi, channel, sounding);
            for &note in notes {
                midi.note_on(channel, note, velocity);
                sounding.push(note);
            }
        }
        Voicing::Silence => release(midi, channel, sounding),
        Voicing::Rest => {}
    }
}

fn release(midi: &mut dyn MidiOut, channel: u8, sounding: &mut Vec<u8>) {
    for note in sounding.drain(..) {
        midi.note_off(channel, note);
    }
    midi.all_notes_off(channel);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
