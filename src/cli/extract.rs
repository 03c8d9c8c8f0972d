use anyhow::{Context, Result};
use indicatif::MultiProgress;

use super::command::ExtractArgs;
use super::progress::{FRAMES_PER_TICK, create_progress_bar};
use crate::input::InputReader;
use crate::sink::WavTrackSink;
use crate::timestamp::time_str;
use dat::process::{extract::Extractor, parse::Parser, segment::Segmenter};

pub fn cmd_extract(args: &ExtractArgs, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Extracting tracks from {}", args.input.display());

    let input = InputReader::new(&args.input)?;
    let total_frames = input
        .frame_count()
        .map(|frames| frames.saturating_sub(args.seek_n_frames));
    let mut reader = input.into_frames(args.seek_n_frames)?;

    let segmenter = Segmenter::new(args.segmenter_config(), WavTrackSink::new(&*args.prefix));
    let mut extractor = Extractor::new(Parser::new(args.parser_config()), segmenter);

    let pb = multi
        .map(|multi| create_progress_bar(multi, total_frames))
        .transpose()?;
    if let Some(ref pb) = pb {
        pb.set_message("extracting");
    }

    let mut pending = 0;
    let result = extractor.run(&mut reader, args.seek_n_frames, |_| {
        pending += 1;
        if pending == FRAMES_PER_TICK {
            if let Some(ref pb) = pb {
                pb.inc(pending);
            }
            pending = 0;
        }
    });

    if let Some(ref pb) = pb {
        pb.inc(pending);
        pb.finish_and_clear();
    }

    let segmenter = extractor.into_segmenter();
    let audio = time_str(segmenter.audio_seconds_read());
    let written = segmenter.sink().written();
    log::info!("{} tracks written, {audio} of audio read", written.len());

    result
        .map(|_| ())
        .with_context(|| format!("Extracting from {}", args.input.display()))
}
