//! Render a C major scale to a raw mono audio file.
//!
//! Usage: cargo run --example mono -- <soundfont> <output>
//!
//! The output is raw 32-bit float, little endian, 1 channel, 22050 Hz.

use sfsynth::{export, Synthesizer, SynthesizerSettings};

fn main() -> sfsynth::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: mono <soundfont> <output>");
        eprintln!();
        eprintln!("Create a raw mono audio file");
        std::process::exit(1);
    }

    // Create the synthesizer
    let settings = SynthesizerSettings::new(22_050)?;
    let mut synthesizer = Synthesizer::new(&settings);

    // Load the SoundFont file
    if let Err(e) = synthesizer.load_sound_font(&args[1]) {
        eprintln!("Failed to load SoundFont file {}: {}", args[1], e);
        std::process::exit(1);
    }

    // Configure the synthesizer
    synthesizer.set_master_volume(6.0);
    synthesizer.configure_channel(0, 0, 0);

    // Allocate the buffer (for a duration of 4 seconds)
    let size = 4 * settings.sample_rate() as usize;
    let mut buffer = vec![0.0f32; size];

    // Play a scale, each note during 0.4 second
    let notes = [60u8, 62, 64, 65, 67, 69, 71, 72];
    let note_duration = (0.4 * settings.sample_rate() as f32) as usize;

    let mut offset = 0;
    for i in 0..=notes.len() {
        if i > 0 {
            synthesizer.note_off(0, notes[i - 1]);
        }

        if i < notes.len() {
            synthesizer.note_on(0, notes[i], 100);
        }

        synthesizer.render_mono(&mut buffer[offset..offset + note_duration]);
        offset += note_duration;
    }

    // Write the result (importable in Audacity: 32-bit float, little
    // endian, 1 channel, 22050 Hz)
    export::write_raw_f32(&args[2], &buffer)?;

    Ok(())
}
