//! First-run installation: an ordered, halt-on-first-failure sequence.

mod sequencer;

pub use sequencer::InstallationSequencer;
