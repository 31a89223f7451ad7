//! MIDI dispatch towards external synthesizers.
//!
//! Notes are scheduled at the current loop offset and routed to the
//! track configured on the loop. The channel comes from the explicit
//! argument when given, otherwise from the per-loop channel context set
//! with `use_chan`/`with_chan`.

use crate::api::Api;
use crate::error::EngineError;

const MIDI_CHAN_KEY: &str = "midi_chan";

impl Api<'_> {
    fn resolve_chan(&self, chan: Option<u8>) -> Result<u8, EngineError> {
        let lp = self.current_loop().ok_or(EngineError::NotInLoop)?;
        if let Some(chan) = chan {
            return Ok(chan);
        }
        lp.extra
            .get(MIDI_CHAN_KEY)
            .map(|c| *c as u8)
            .ok_or(EngineError::UnknownMidiTrack)
    }

    /// Send a note-on through the current loop's track.
    pub fn midi_note_on(
        &mut self,
        note: u8,
        velocity: u8,
        chan: Option<u8>,
    ) -> Result<(), EngineError> {
        let chan = self.resolve_chan(chan)?;
        let (track, offset) = self.loop_track_offset()?;
        let due = self.state().timeline.beat() + offset;
        self.with_state(|st| {
            st.queue.schedule_at(
                due,
                Box::new(move |_st, host| host.midi_note_on(&track, chan, note, velocity)),
            )
        });
        Ok(())
    }

    /// Send a note-off through the current loop's track.
    pub fn midi_note_off(
        &mut self,
        note: u8,
        velocity: u8,
        chan: Option<u8>,
    ) -> Result<(), EngineError> {
        let chan = self.resolve_chan(chan)?;
        let (track, offset) = self.loop_track_offset()?;
        let due = self.state().timeline.beat() + offset;
        self.with_state(|st| {
            st.queue.schedule_at(
                due,
                Box::new(move |_st, host| host.midi_note_off(&track, chan, note, velocity)),
            )
        });
        Ok(())
    }

    /// Send a note-on now and the matching note-off `duration` beats
    /// later, both relative to the loop offset.
    pub fn midi_note(
        &mut self,
        note: u8,
        duration: f64,
        velocity: u8,
        chan: Option<u8>,
    ) -> Result<(), EngineError> {
        let chan = self.resolve_chan(chan)?;
        let (track, offset) = self.loop_track_offset()?;
        let base = self.state().timeline.beat() + offset;

        let on_track = track.clone();
        self.with_state(|st| {
            st.queue.schedule_at(
                base,
                Box::new(move |_st, host| host.midi_note_on(&on_track, chan, note, velocity)),
            );
            st.queue.schedule_at(
                base + duration,
                Box::new(move |_st, host| host.midi_note_off(&track, chan, note, velocity)),
            );
        });
        Ok(())
    }

    /// Set the MIDI channel for the rest of the current loop run.
    pub fn use_chan(&mut self, chan: u8) -> Result<(), EngineError> {
        let lp = self.current_loop_mut().ok_or(EngineError::NotInLoop)?;
        lp.extra.insert(MIDI_CHAN_KEY.to_string(), chan as i64);
        Ok(())
    }

    /// Run `f` with the MIDI channel set to `chan`, restoring the
    /// previous channel context on exit, error paths included.
    pub fn with_chan<R>(
        &mut self,
        chan: u8,
        f: impl FnOnce(&mut Api<'_>) -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        let previous = {
            let lp = self.current_loop_mut().ok_or(EngineError::NotInLoop)?;
            lp.extra.insert(MIDI_CHAN_KEY.to_string(), chan as i64)
        };

        let result = f(self);

        if let Some(lp) = self.current_loop_mut() {
            match previous {
                Some(prev) => {
                    lp.extra.insert(MIDI_CHAN_KEY.to_string(), prev);
                }
                None => {
                    lp.extra.remove(MIDI_CHAN_KEY);
                }
            }
        }
        result
    }
}
