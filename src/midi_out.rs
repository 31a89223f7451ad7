//! MIDI output over midir.
//!
//! The connection lives on its own thread; callers talk to it through a
//! channel so note dispatch from the audio drain never blocks on the
//! device.

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use midir::{MidiOutput, MidiOutputConnection};
use std::thread::{self, JoinHandle};

/// Commands handled by the MIDI thread.
#[derive(Debug, Clone)]
enum MidiCommand {
    Connect { port_name: String },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    Shutdown,
}

struct MidiOutputInternal {
    connection: Option<MidiOutputConnection>,
    command_rx: Receiver<MidiCommand>,
}

impl MidiOutputInternal {
    fn connect(&mut self, port_name: &str) -> Result<()> {
        let midi_out = MidiOutput::new("Soir")?;
        let ports = midi_out.ports();

        let port = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|name| name.contains(port_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("MIDI port '{}' not found", port_name))?;

        let connection = midi_out
            .connect(port, "soir-out")
            .map_err(|e| anyhow!("{}", e))?;
        self.connection = Some(connection);
        Ok(())
    }

    fn run(&mut self) {
        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                MidiCommand::Connect { port_name } => {
                    if let Err(e) = self.connect(&port_name) {
                        log::error!("MIDI connect error: {}", e);
                    }
                }
                MidiCommand::NoteOn {
                    channel,
                    note,
                    velocity,
                } => {
                    if let Some(conn) = &mut self.connection {
                        let _ = conn.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
                    }
                }
                MidiCommand::NoteOff {
                    channel,
                    note,
                    velocity,
                } => {
                    if let Some(conn) = &mut self.connection {
                        let _ = conn.send(&[0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
                    }
                }
                MidiCommand::Shutdown => {
                    // All Notes Off everywhere before closing the port.
                    if let Some(conn) = &mut self.connection {
                        for ch in 0..16u8 {
                            let _ = conn.send(&[0xB0 | ch, 123, 0]);
                        }
                    }
                    break;
                }
            }
        }
    }
}

/// Thread-safe handle to the MIDI output thread.
pub struct MidiOut {
    command_tx: Sender<MidiCommand>,
    thread: Option<JoinHandle<()>>,
}

impl MidiOut {
    /// Spawn the output thread. No port is connected yet.
    pub fn new() -> Result<Self> {
        let (command_tx, command_rx) = unbounded();

        let thread = thread::spawn(move || {
            let mut internal = MidiOutputInternal {
                connection: None,
                command_rx,
            };
            internal.run();
        });

        Ok(Self {
            command_tx,
            thread: Some(thread),
        })
    }

    /// Names of the available MIDI output ports.
    pub fn list_ports() -> Result<Vec<String>> {
        let midi_out = MidiOutput::new("Soir")?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect())
    }

    /// Connect to the first port whose name contains `port_name`.
    pub fn connect(&self, port_name: &str) {
        let _ = self.command_tx.send(MidiCommand::Connect {
            port_name: port_name.to_string(),
        });
    }

    pub fn note_on(&self, channel: u8, note: u8, velocity: u8) {
        let _ = self.command_tx.send(MidiCommand::NoteOn {
            channel,
            note,
            velocity,
        });
    }

    pub fn note_off(&self, channel: u8, note: u8, velocity: u8) {
        let _ = self.command_tx.send(MidiCommand::NoteOff {
            channel,
            note,
            velocity,
        });
    }
}

impl Drop for MidiOut {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MidiCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
