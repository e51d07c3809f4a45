//! Render a C major scale to a stereo WAV file.
//!
//! Usage: cargo run --example stereo -- <soundfont> <output.wav>

use sfsynth::{export, Synthesizer, SynthesizerSettings};

fn main() -> sfsynth::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: stereo <soundfont> <output.wav>");
        eprintln!();
        eprintln!("Create a stereo WAV file");
        std::process::exit(1);
    }

    // Create the synthesizer
    let settings = SynthesizerSettings::new(44_100)?;
    let mut synthesizer = Synthesizer::new(&settings);

    // Load the SoundFont file
    if let Err(e) = synthesizer.load_sound_font(&args[1]) {
        eprintln!("Failed to load SoundFont file {}: {}", args[1], e);
        std::process::exit(1);
    }

    // Configure the synthesizer
    synthesizer.set_master_volume(6.0);
    synthesizer.configure_channel(0, 0, 0);

    // Allocate the buffers (for a duration of 4 seconds)
    let size = 4 * settings.sample_rate() as usize;
    let mut left = vec![0.0f32; size];
    let mut right = vec![0.0f32; size];

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

        synthesizer.render_stereo(
            &mut left[offset..offset + note_duration],
            &mut right[offset..offset + note_duration],
        );
        offset += note_duration;
    }

    let interleaved = export::interleave(&left, &right);
    export::write_wav(&args[2], &interleaved, settings.sample_rate(), 2)?;

    Ok(())
}
